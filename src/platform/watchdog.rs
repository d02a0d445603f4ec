// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Software watchdog

use std::time::{Duration, Instant};

/// Deadline tracker
///
/// The tick task pings the watchdog every iteration. While a long
/// operation is in progress the deadline is stretched to the freeze
/// timeout.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    freeze_timeout: Duration,
    last_ping: Instant,
    extended: bool,
}

impl Watchdog {
    pub fn new(timeout: Duration, freeze_timeout: Duration) -> Self {
        Self {
            timeout,
            freeze_timeout,
            last_ping: Instant::now(),
            extended: false,
        }
    }

    pub fn ping(&mut self) {
        self.ping_at(Instant::now());
    }

    pub fn ping_at(&mut self, now: Instant) {
        self.last_ping = now;
    }

    /// Switch to the freeze timeout
    pub fn extend(&mut self) {
        self.extended = true;
    }

    /// Back to the normal timeout, counted from now
    pub fn release(&mut self) {
        self.extended = false;
        self.ping();
    }

    /// Deadline currently applied
    pub fn timeout(&self) -> Duration {
        if self.extended {
            self.freeze_timeout
        } else {
            self.timeout
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_ping) > self.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_and_extension() {
        let start = Instant::now();
        let mut watchdog = Watchdog::new(Duration::from_secs(31), Duration::from_secs(60));
        watchdog.ping_at(start);

        assert!(!watchdog.is_expired_at(start + Duration::from_secs(30)));
        assert!(watchdog.is_expired_at(start + Duration::from_secs(32)));

        watchdog.extend();
        assert_eq!(watchdog.timeout(), Duration::from_secs(60));
        assert!(!watchdog.is_expired_at(start + Duration::from_secs(45)));
        assert!(watchdog.is_expired_at(start + Duration::from_secs(61)));
    }
}
