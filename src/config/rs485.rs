// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RS-485 serial link configuration
//!
//! The serial link is shared between the Modbus RTU roles and the raw
//! RS-485 bridge. Framing is fixed to 8 data bits, even parity, 1 stop bit.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::utils::set_flag;

/// Highest baud rate accepted (exclusive)
pub const MAX_BAUDRATE: u32 = 921_600;

/// Usage of the serial link outside of Modbus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rs485Mode {
    None,
    Receiver,
    Sender,
}

impl Rs485Mode {
    /// Register code of the mode
    pub fn code(self) -> u16 {
        match self {
            Rs485Mode::None => 0,
            Rs485Mode::Receiver => 1,
            Rs485Mode::Sender => 2,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Rs485Mode::None),
            1 => Some(Rs485Mode::Receiver),
            2 => Some(Rs485Mode::Sender),
            _ => None,
        }
    }
}

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rs485Config {
    pub mode: Rs485Mode,

    /// Line speed in bauds, shared with the Modbus RTU roles
    pub baudrate: u32,

    /// Forward received frames to the MQTT broker
    pub to_mqtt: bool,

    /// Serial device the link is attached to on the host
    pub serial_port: String,
}

impl Default for Rs485Config {
    fn default() -> Self {
        Self {
            mode: Rs485Mode::None,
            baudrate: 9600,
            to_mqtt: false,
            serial_port: "/dev/ttyUSB0".to_string(),
        }
    }
}

impl Rs485Config {
    /// Set the link mode from its register code
    pub fn set_mode(&mut self, code: u16) -> bool {
        let Some(mode) = Rs485Mode::from_code(code) else {
            warn!("Refusing RS485 type {}: unknown mode", code);
            return false;
        };
        if mode == self.mode {
            return false;
        }
        info!("Set RS485 type to: {}", code);
        self.mode = mode;
        true
    }

    /// Set the baud rate, refusing 0 and rates from [`MAX_BAUDRATE`]
    pub fn set_baudrate(&mut self, value: u32) -> bool {
        if value == 0 || value >= MAX_BAUDRATE {
            warn!("Refusing RS485 baudrate {}", value);
            return false;
        }
        if value == self.baudrate {
            return false;
        }
        info!("Set RS485 baudrate to: {}", value);
        self.baudrate = value;
        true
    }

    pub fn set_to_mqtt(&mut self, value: bool) -> bool {
        set_flag(&mut self.to_mqtt, value, "RS485 to MQTT")
    }
}
