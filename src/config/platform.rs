// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Board and watchdog configuration

use serde::{Deserialize, Serialize};

/// Main board variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardType {
    /// No RS-485 transceiver
    Lite,
    Rs485,
    Wifi,
}

impl BoardType {
    /// Display name published in the module metadata of module 0
    pub fn name(self) -> &'static str {
        match self {
            BoardType::Lite => "Arduino OPTA Lite -- AFX00003",
            BoardType::Rs485 => "Arduino OPTA RS485 - AFX00001",
            BoardType::Wifi => "Arduino OPTA Wifi -- AFX00002",
        }
    }

    /// `true` when the board carries an RS-485 transceiver
    pub fn has_rs485(self) -> bool {
        !matches!(self, BoardType::Lite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub board: BoardType,

    /// Watchdog deadline between two pings in milliseconds
    pub watchdog_timeout_ms: u64,

    /// Deadline applied while a long operation holds the freeze marker
    pub freeze_timeout_ms: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            board: BoardType::Rs485,
            watchdog_timeout_ms: 31_000,
            freeze_timeout_ms: 60_000,
        }
    }
}
