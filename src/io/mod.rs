// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Input/output channels
//!
//! This module models the channels of the main board and of the plug-in
//! expansions, and keeps them up to date:
//!
//! - [`channel`]: state and statistics of a single channel
//! - [`module`]: module types, per-module driver and channel slots
//! - [`stack`]: the fixed capacity expansion stack
//! - [`engine`]: hysteresis, edge detection and duration accounting
//! - [`hardware`]: pin access and the simulated board
//! - [`persistence`]: JSON snapshot of the statistics
//! - [`controller`]: the owner of all of the above
//!
//! The register synchronisation only sees the channels through
//! [`ChannelSource`].

pub mod channel;
pub mod controller;
pub mod engine;
pub mod hardware;
pub mod module;
pub mod persistence;
pub mod stack;

pub use channel::{Channel, ChannelKind};
pub use controller::IoController;
pub use engine::{Debouncer, PollReport, Thresholds};
pub use hardware::{Hardware, SimulatedHardware};
pub use module::{Module, ModuleDriver, ModuleType};
pub use persistence::{HardwareMismatch, IoSnapshot, RestoreReport};
pub use stack::ExpansionStack;

use crate::registers::Direction;

/// Errors raised by channel operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    #[error("module {0} does not exist")]
    UnknownModule(usize),

    #[error("channel {direction}{index} of module {module} does not exist")]
    UnknownChannel {
        module: usize,
        direction: Direction,
        index: usize,
    },

    #[error("hardware fault on module {module} channel {index}: {reason}")]
    Hardware {
        module: usize,
        index: usize,
        reason: String,
    },
}

/// Channel access used by the register synchronisation
#[cfg_attr(test, mockall::automock)]
pub trait ChannelSource: Send {
    /// Current channel model
    fn stack(&self) -> &ExpansionStack;

    /// Drive an output, a no-op when it already has the requested state
    fn drive_output(&mut self, module: usize, index: usize, on: bool, now: u32)
        -> Result<(), IoError>;

    /// Clear the partial counters of a channel
    fn reset_channel(
        &mut self,
        module: usize,
        direction: Direction,
        index: usize,
        now: u32,
    ) -> Result<(), IoError>;
}
