// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Platform implementation for a host process
//!
//! A reboot cannot restart the machine here: it raises a flag and wakes
//! whoever waits in [`HostPlatform::wait_for_reboot`], which is the main
//! loop. The main loop then tears down the daemon and builds a new one from
//! the persisted configuration.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::Notify;

use super::{Platform, Uptime, Watchdog};
use crate::config::PlatformConfig;

#[derive(Debug)]
pub struct HostPlatform {
    freezes: AtomicU32,
    reboot_requested: AtomicBool,
    reboot: Notify,
    watchdog: Mutex<Watchdog>,
    uptime: Uptime,
}

impl HostPlatform {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            freezes: AtomicU32::new(0),
            reboot_requested: AtomicBool::new(false),
            reboot: Notify::new(),
            watchdog: Mutex::new(Watchdog::new(
                Duration::from_millis(config.watchdog_timeout_ms),
                Duration::from_millis(config.freeze_timeout_ms),
            )),
            uptime: Uptime::new(),
        }
    }

    fn watchdog(&self) -> MutexGuard<'_, Watchdog> {
        self.watchdog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn uptime(&self) -> &Uptime {
        &self.uptime
    }

    /// Number of active freezes
    pub fn freeze_depth(&self) -> u32 {
        self.freezes.load(Ordering::SeqCst)
    }

    pub fn is_reboot_requested(&self) -> bool {
        self.reboot_requested.load(Ordering::SeqCst)
    }

    /// Request a reboot when the watchdog deadline passed
    ///
    /// ### Returns
    ///
    /// `true` if the watchdog expired
    pub fn check_watchdog(&self) -> bool {
        let expired = {
            let watchdog = self.watchdog();
            if watchdog.is_expired() {
                error!(
                    "Watchdog expired, no ping for more than {:?}",
                    watchdog.timeout()
                );
                true
            } else {
                false
            }
        };
        if expired {
            self.reboot();
        }
        expired
    }

    /// Wait until a reboot is requested
    pub async fn wait_for_reboot(&self) {
        while !self.is_reboot_requested() {
            self.reboot.notified().await;
        }
    }
}

impl Platform for HostPlatform {
    fn freeze(&self) {
        if self.freezes.fetch_add(1, Ordering::SeqCst) == 0 {
            debug!("Freeze: watchdog deadline extended");
            self.watchdog().extend();
        }
    }

    fn unfreeze(&self) {
        let previous = self
            .freezes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            debug!("Unfreeze: watchdog deadline restored");
            self.watchdog().release();
        }
    }

    fn is_frozen(&self) -> bool {
        self.freeze_depth() > 0
    }

    fn ping_watchdog(&self) {
        self.watchdog().ping();
    }

    fn reboot(&self) {
        if !self.reboot_requested.swap(true, Ordering::SeqCst) {
            info!("Reboot requested");
        }
        self.reboot.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FreezeGuard;

    #[test]
    fn test_nested_freezes() {
        let platform = HostPlatform::new(&PlatformConfig::default());
        assert!(!platform.is_frozen());
        {
            let _outer = FreezeGuard::new(&platform);
            {
                let _inner = FreezeGuard::new(&platform);
                assert_eq!(platform.freeze_depth(), 2);
            }
            assert!(platform.is_frozen());
        }
        assert!(!platform.is_frozen());

        platform.unfreeze();
        assert_eq!(platform.freeze_depth(), 0);
    }

    #[test]
    fn test_watchdog_expiry_requests_reboot() {
        let config = PlatformConfig {
            watchdog_timeout_ms: 0,
            ..PlatformConfig::default()
        };
        let platform = HostPlatform::new(&config);
        std::thread::sleep(Duration::from_millis(5));

        assert!(platform.check_watchdog());
        assert!(platform.is_reboot_requested());
    }

    #[tokio::test]
    async fn test_wait_for_reboot() {
        let platform = std::sync::Arc::new(HostPlatform::new(&PlatformConfig::default()));
        let waiter = {
            let platform = platform.clone();
            tokio::spawn(async move { platform.wait_for_reboot().await })
        };
        platform.reboot();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("reboot not observed")
            .expect("waiter panicked");
    }
}
