// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Platform services
//!
//! Watchdog, freeze marker, reboot request and uptime clock.
//!
//! Code that may block for a while (a Modbus client round trip for
//! instance) holds a [`FreezeGuard`]. Freezes nest: the watchdog deadline is
//! extended when the first guard is taken and restored when the last one is
//! dropped.

pub mod host;
pub mod watchdog;

use std::time::Instant;

pub use host::HostPlatform;
pub use watchdog::Watchdog;

/// Services provided by the board
pub trait Platform: Send + Sync {
    /// Enter a long operation
    fn freeze(&self);

    /// Leave a long operation
    fn unfreeze(&self);

    /// `true` while at least one freeze is active
    fn is_frozen(&self) -> bool;

    fn ping_watchdog(&self);

    /// Request a reboot
    fn reboot(&self);
}

/// Keeps the platform frozen until dropped
pub struct FreezeGuard<'a> {
    platform: &'a dyn Platform,
}

impl<'a> FreezeGuard<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        platform.freeze();
        Self { platform }
    }
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        self.platform.unfreeze();
    }
}

/// Milliseconds since start
///
/// The counter is 32 bits wide like the timestamps of the register map
/// and wraps after about 49 days.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    start: Instant,
}

impl Default for Uptime {
    fn default() -> Self {
        Self::new()
    }
}

impl Uptime {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn millis(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}
