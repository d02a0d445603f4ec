// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device identity configuration
//!
//! This module defines the identity and credentials of the gateway. The
//! device password also protects configuration commits received over Modbus.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::utils::{set_bounded_string, set_secret};

/// Highest device id accepted, 255 is reserved
pub const MAX_DEVICE_ID: u16 = 254;

/// Largest absolute time offset in hours
pub const MAX_TIME_OFFSET: i32 = 23;

/// Identity and credentials of the gateway.
///
/// # Example
///
/// ```
/// use rust_iogateway::config::DeviceConfig;
///
/// let mut device = DeviceConfig::default();
/// assert!(device.set_id(12));
/// assert!(!device.set_id(300));
/// assert_eq!(device.id, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device id, also used as the Modbus unit id in the RTU server role
    pub id: u8,

    /// Administrator user name
    pub user: String,

    /// Administrator password, required to commit a configuration over Modbus
    pub password: String,

    /// Offset from UTC in hours
    pub time_offset: i8,

    /// NTP server used to set the clock
    pub time_server: String,

    /// Firmware update URL, not exposed in the register map
    pub update_url: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: 0,
            user: "admin".to_string(),
            password: "admin".to_string(),
            time_offset: 0,
            time_server: "pool.ntp.org".to_string(),
            update_url: String::new(),
        }
    }
}

impl DeviceConfig {
    /// Set the device id, refusing values above [`MAX_DEVICE_ID`]
    ///
    /// ### Returns
    ///
    /// `true` if the stored value changed
    pub fn set_id(&mut self, value: u16) -> bool {
        if value > MAX_DEVICE_ID {
            warn!("Refusing device id {}: outside 0-{}", value, MAX_DEVICE_ID);
            return false;
        }
        if u16::from(self.id) == value {
            return false;
        }
        info!("Set device id to: {}", value);
        self.id = value as u8;
        true
    }

    /// Set the time offset, refusing offsets of a day or more
    pub fn set_time_offset(&mut self, value: i32) -> bool {
        if value.abs() > MAX_TIME_OFFSET {
            warn!("Refusing time offset {}h: outside ±{}h", value, MAX_TIME_OFFSET);
            return false;
        }
        if i32::from(self.time_offset) == value {
            return false;
        }
        info!("Set time offset to: {}", value);
        self.time_offset = value as i8;
        true
    }

    pub fn set_user(&mut self, value: &str) -> bool {
        set_bounded_string(&mut self.user, value, "device user")
    }

    pub fn set_password(&mut self, value: &str) -> bool {
        set_secret(&mut self.password, value, "device password")
    }

    pub fn set_time_server(&mut self, value: &str) -> bool {
        if self.time_server == value {
            return false;
        }
        info!("Set time server to: {}", value);
        self.time_server = value.to_string();
        true
    }
}
