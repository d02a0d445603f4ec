// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel statistics persistence
//!
//! The statistics of every channel are saved as JSON so that counters
//! survive a reboot. Hardware identity wins over the snapshot: a module
//! whose detected type differs from the saved type keeps its defaults and
//! the discrepancy is reported as a [`HardwareMismatch`].

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::module::{Module, ModuleType};
use super::stack::ExpansionStack;
use crate::registers::Direction;

/// Saved statistics of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub index: usize,
    pub reset_at: u32,
    pub pulses: u32,
    pub partial_pulses: u32,
    pub high_ms: u32,
    pub partial_high_ms: u32,
}

impl From<&Channel> for ChannelSnapshot {
    fn from(channel: &Channel) -> Self {
        Self {
            index: channel.index,
            reset_at: channel.reset_at,
            pulses: channel.pulses,
            partial_pulses: channel.partial_pulses,
            high_ms: channel.high_ms,
            partial_high_ms: channel.partial_high_ms,
        }
    }
}

impl ChannelSnapshot {
    fn apply(&self, channel: &mut Channel) {
        channel.reset_at = self.reset_at;
        channel.pulses = self.pulses;
        channel.partial_pulses = self.partial_pulses;
        channel.high_ms = self.high_ms;
        channel.partial_high_ms = self.partial_high_ms;
    }
}

/// Saved statistics of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub index: usize,
    pub module_type: ModuleType,
    pub inputs: Vec<ChannelSnapshot>,
    pub outputs: Vec<ChannelSnapshot>,
}

impl From<&Module> for ModuleSnapshot {
    fn from(module: &Module) -> Self {
        let save = |direction: Direction| -> Vec<ChannelSnapshot> {
            module
                .channels(direction)
                .iter()
                .filter(|c| c.exists)
                .map(ChannelSnapshot::from)
                .collect()
        };
        Self {
            index: module.index,
            module_type: module.module_type,
            inputs: save(Direction::Input),
            outputs: save(Direction::Output),
        }
    }
}

/// Content of the statistics file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoSnapshot {
    pub saved_at: DateTime<Utc>,
    pub modules: Vec<ModuleSnapshot>,
}

impl IoSnapshot {
    pub fn capture(stack: &ExpansionStack) -> Self {
        Self {
            saved_at: Utc::now(),
            modules: stack.modules().map(ModuleSnapshot::from).collect(),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize IO statistics")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write IO statistics to {:?}", path))?;
        debug!("IO statistics saved to {:?}", path);
        Ok(())
    }

    /// Read a snapshot, `None` when the file does not exist yet
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No IO statistics at {:?}", path);
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read IO statistics from {:?}", path))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse IO statistics from {:?}", path))?;
        Ok(Some(snapshot))
    }
}

/// A saved module that does not match the installed hardware
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareMismatch {
    #[error("module {module} was saved as {saved} but {detected} is installed")]
    TypeChanged {
        module: usize,
        saved: ModuleType,
        detected: ModuleType,
    },

    #[error("module {module} was saved as {saved} but is no longer installed")]
    Missing { module: usize, saved: ModuleType },
}

/// Outcome of [`ExpansionStack::restore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Number of channels whose statistics were restored
    pub channels: usize,
    /// Modules left with default statistics
    pub mismatches: Vec<HardwareMismatch>,
}

impl ExpansionStack {
    /// Apply saved statistics to the modules whose type still matches
    pub fn restore(&mut self, snapshot: &IoSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();

        for saved in &snapshot.modules {
            let Some(module) = self.module_mut(saved.index) else {
                let mismatch = HardwareMismatch::Missing {
                    module: saved.index,
                    saved: saved.module_type,
                };
                warn!("Discarding saved statistics: {}", mismatch);
                report.mismatches.push(mismatch);
                continue;
            };

            if module.module_type != saved.module_type {
                let mismatch = HardwareMismatch::TypeChanged {
                    module: saved.index,
                    saved: saved.module_type,
                    detected: module.module_type,
                };
                warn!("Discarding saved statistics: {}", mismatch);
                report.mismatches.push(mismatch);
                continue;
            }

            for (direction, channels) in [
                (Direction::Input, &saved.inputs),
                (Direction::Output, &saved.outputs),
            ] {
                for channel_snapshot in channels {
                    if let Some(channel) = module.channel_mut(direction, channel_snapshot.index) {
                        channel_snapshot.apply(channel);
                        report.channels += 1;
                    }
                }
            }
        }

        info!(
            "Restored statistics of {} channels saved at {}",
            report.channels, snapshot.saved_at
        );
        report
    }
}
