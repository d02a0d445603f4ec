// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Firmware identity published in the firmware zone

use std::fmt;

/// Firmware version taken from the crate version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub revision: u16,
}

impl FirmwareVersion {
    /// Version of this build
    pub fn current() -> Self {
        Self {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            revision: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        }
    }

    /// Packed version used to compare update images
    pub fn ota(&self) -> u32 {
        u32::from(self.major) * 10000 + u32::from(self.minor) * 100 + u32::from(self.revision)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}
