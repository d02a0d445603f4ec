// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel controller
//!
//! Owns the expansion stack and the hardware handle. The tick task polls
//! it, the register synchronisation drives it through [`ChannelSource`].

use std::path::Path;

use anyhow::Result;
use log::{debug, info};

use super::engine::{Debouncer, PollReport};
use super::hardware::Hardware;
use super::persistence::{IoSnapshot, RestoreReport};
use super::stack::ExpansionStack;
use super::{ChannelSource, IoError};
use crate::config::BoardType;
use crate::registers::Direction;

pub struct IoController {
    stack: ExpansionStack,
    hardware: Box<dyn Hardware>,
    debouncer: Debouncer,
}

impl IoController {
    /// Enumerate the hardware and build the stack
    pub fn new(board: BoardType, mut hardware: Box<dyn Hardware>, poll_ms: u32) -> Self {
        let detected = hardware.detect_expansions();
        let stack = ExpansionStack::build(board, &detected);
        Self {
            stack,
            hardware,
            debouncer: Debouncer::new(poll_ms),
        }
    }

    /// Run one debounce tick
    pub fn poll(&mut self, now: u32) -> PollReport {
        self.debouncer
            .poll(&mut self.stack, self.hardware.as_mut(), now)
    }

    /// Drive an output
    ///
    /// Nothing happens when the output is already in the requested state.
    /// Returns `true` when the state changed.
    pub fn set_output(
        &mut self,
        module: usize,
        index: usize,
        on: bool,
        now: u32,
    ) -> Result<bool, IoError> {
        let current = self
            .stack
            .module(module)
            .ok_or(IoError::UnknownModule(module))?
            .channel(Direction::Output, index)
            .ok_or(IoError::UnknownChannel {
                module,
                direction: Direction::Output,
                index,
            })?
            .state;
        if current == on {
            return Ok(false);
        }

        self.hardware.write_output(module, index, on)?;

        if let Some(channel) = self.stack.channel_mut(module, Direction::Output, index) {
            channel.state = on;
            channel.updated_at = now;
            if on {
                channel.count_pulse();
            }
        }
        info!(
            "Module {} output {} set {}",
            module,
            index,
            if on { "on" } else { "off" }
        );
        Ok(true)
    }

    /// Clear the partial counters of a channel
    pub fn reset_channel(
        &mut self,
        module: usize,
        direction: Direction,
        index: usize,
        now: u32,
    ) -> Result<(), IoError> {
        let channel = self
            .stack
            .channel_mut(module, direction, index)
            .ok_or(IoError::UnknownChannel {
                module,
                direction,
                index,
            })?;
        channel.reset(now);
        info!("Module {} channel {} reset", module, channel.label());
        Ok(())
    }

    /// Clear the partial counters of every existing channel
    pub fn reset_all(&mut self, now: u32) {
        for module in self.stack.modules_mut() {
            for direction in [Direction::Input, Direction::Output] {
                for channel in module.channels_mut(direction).iter_mut().filter(|c| c.exists) {
                    channel.reset(now);
                }
            }
        }
        info!("All channels reset");
    }

    pub fn snapshot(&self) -> IoSnapshot {
        IoSnapshot::capture(&self.stack)
    }

    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.snapshot().save_to_file(path)
    }

    /// Restore saved statistics, a missing file restores nothing
    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<RestoreReport> {
        match IoSnapshot::load_from_file(path)? {
            Some(snapshot) => Ok(self.stack.restore(&snapshot)),
            None => {
                debug!("Starting with fresh IO statistics");
                Ok(RestoreReport::default())
            }
        }
    }
}

impl ChannelSource for IoController {
    fn stack(&self) -> &ExpansionStack {
        &self.stack
    }

    fn drive_output(
        &mut self,
        module: usize,
        index: usize,
        on: bool,
        now: u32,
    ) -> Result<(), IoError> {
        self.set_output(module, index, on, now).map(|_| ())
    }

    fn reset_channel(
        &mut self,
        module: usize,
        direction: Direction,
        index: usize,
        now: u32,
    ) -> Result<(), IoError> {
        IoController::reset_channel(self, module, direction, index, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::hardware::SimulatedHardware;
    use crate::io::ModuleType;
    use tempfile::tempdir;

    fn controller(hardware: &SimulatedHardware) -> IoController {
        IoController::new(BoardType::Rs485, Box::new(hardware.clone()), 50)
    }

    #[test]
    fn test_set_output_counts_rising_edges_only() {
        let hardware = SimulatedHardware::default();
        let mut io = controller(&hardware);

        assert_eq!(io.set_output(0, 2, true, 10), Ok(true));
        assert_eq!(io.set_output(0, 2, true, 20), Ok(false));
        assert_eq!(io.set_output(0, 2, false, 30), Ok(true));

        let channel = io.stack().channel(0, Direction::Output, 2).unwrap();
        assert_eq!(channel.pulses, 1);
        assert_eq!(channel.updated_at, 30);
        assert!(!hardware.output(0, 2));
    }

    #[test]
    fn test_set_output_errors() {
        let hardware = SimulatedHardware::default();
        let mut io = controller(&hardware);

        assert!(matches!(
            io.set_output(0, 4, true, 0),
            Err(IoError::UnknownChannel { index: 4, .. })
        ));
        assert_eq!(io.set_output(3, 0, true, 0), Err(IoError::UnknownModule(3)));

        hardware.inject_fault(0, 0);
        assert!(matches!(
            io.set_output(0, 0, true, 0),
            Err(IoError::Hardware { .. })
        ));
        assert!(!io.stack().channel(0, Direction::Output, 0).unwrap().state);
    }

    #[test]
    fn test_reset_all() {
        let hardware = SimulatedHardware::new(vec![ModuleType::DigitalSolidState]);
        let mut io = controller(&hardware);
        hardware.set_millivolts(1, 5, 20000);
        io.poll(50);
        io.set_output(0, 0, true, 60).unwrap();

        io.reset_all(100);

        for (_, channel) in io.stack().channels(Direction::Input) {
            assert_eq!(channel.partial_pulses, 0);
            assert_eq!(channel.reset_at, 100);
        }
        let input = io.stack().channel(1, Direction::Input, 5).unwrap();
        assert_eq!(input.pulses, 1);
        assert_eq!(io.stack().channel(0, Direction::Output, 0).unwrap().pulses, 1);
    }

    #[test]
    fn test_state_survives_restart() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("io_state.json");
        let hardware = SimulatedHardware::default();

        let mut io = controller(&hardware);
        hardware.set_millivolts(0, 0, 9000);
        io.poll(50);
        io.save_state(&path)?;

        let mut restarted = controller(&hardware);
        let report = restarted.load_state(&path)?;
        assert_eq!(report.channels, 12);
        assert_eq!(
            restarted.stack().channel(0, Direction::Input, 0).unwrap().pulses,
            1
        );
        Ok(())
    }
}
