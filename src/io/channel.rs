// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel state and statistics

use serde::{Deserialize, Serialize};

use crate::registers::{uid, Direction};

/// Electrical kind of a channel, published in the channel block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    None,
    Analog,
    Digital,
    Relay,
    Pwm,
}

impl ChannelKind {
    /// Register code of the kind
    pub fn code(self) -> u16 {
        match self {
            ChannelKind::None => 0,
            ChannelKind::Analog => 1,
            ChannelKind::Digital => 2,
            ChannelKind::Relay => 3,
            ChannelKind::Pwm => 4,
        }
    }

    /// Kind read back from a channel block, unknown codes map to `None`
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => ChannelKind::Analog,
            2 => ChannelKind::Digital,
            3 => ChannelKind::Relay,
            4 => ChannelKind::Pwm,
            _ => ChannelKind::None,
        }
    }
}

/// One input or output channel
///
/// Timestamps are uptime milliseconds. Lifetime counters (`pulses`,
/// `high_ms`) only grow, the partial counters are cleared by
/// [`Channel::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub direction: Direction,
    pub kind: ChannelKind,
    pub exists: bool,
    pub uid: u16,
    pub index: usize,
    pub state: bool,
    /// Last sampled voltage in millivolts
    pub voltage: u16,
    /// Time of the last state change
    pub updated_at: u32,
    /// Time of the last partial reset
    pub reset_at: u32,
    pub pulses: u32,
    pub partial_pulses: u32,
    pub high_ms: u32,
    pub partial_high_ms: u32,
}

impl Channel {
    /// Slot without a physical channel behind it
    pub fn vacant(direction: Direction, module: usize, index: usize) -> Self {
        Self {
            direction,
            kind: ChannelKind::None,
            exists: false,
            uid: uid(module, index),
            index,
            state: false,
            voltage: 0,
            updated_at: 0,
            reset_at: 0,
            pulses: 0,
            partial_pulses: 0,
            high_ms: 0,
            partial_high_ms: 0,
        }
    }

    /// Physical channel with zeroed statistics
    pub fn new(direction: Direction, kind: ChannelKind, module: usize, index: usize) -> Self {
        Self {
            kind,
            exists: true,
            ..Self::vacant(direction, module, index)
        }
    }

    /// Count one rising edge on both pulse counters
    pub fn count_pulse(&mut self) {
        self.pulses = self.pulses.wrapping_add(1);
        self.partial_pulses = self.partial_pulses.wrapping_add(1);
    }

    /// Add time spent in the on state to both accumulators
    pub fn accumulate_high(&mut self, elapsed_ms: u32) {
        self.high_ms = self.high_ms.wrapping_add(elapsed_ms);
        self.partial_high_ms = self.partial_high_ms.wrapping_add(elapsed_ms);
    }

    /// Clear the partial counters and stamp the reset
    ///
    /// The update timestamp moves too, so the next synchronisation pass
    /// republishes the block.
    pub fn reset(&mut self, now: u32) {
        self.partial_pulses = 0;
        self.partial_high_ms = 0;
        self.reset_at = now;
        self.updated_at = now;
    }

    /// Channel label used in logs, for instance `I3` or `O0`
    pub fn label(&self) -> String {
        format!("{}{}", self.direction, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_lifetime_counters() {
        let mut channel = Channel::new(Direction::Input, ChannelKind::Digital, 1, 4);
        channel.count_pulse();
        channel.count_pulse();
        channel.accumulate_high(50);

        channel.reset(1234);

        assert_eq!(channel.pulses, 2);
        assert_eq!(channel.partial_pulses, 0);
        assert_eq!(channel.high_ms, 50);
        assert_eq!(channel.partial_high_ms, 0);
        assert_eq!(channel.reset_at, 1234);
        assert_eq!(channel.updated_at, 1234);
    }

    #[test]
    fn test_vacant_slot_keeps_uid() {
        let channel = Channel::vacant(Direction::Output, 2, 7);
        assert!(!channel.exists);
        assert_eq!(channel.uid, 207);
        assert_eq!(channel.label(), "O7");
    }
}
