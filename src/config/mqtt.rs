// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! MQTT broker configuration
//!
//! The message transport itself lives outside the gateway core. The settings
//! are kept here so they can be published and committed through Modbus.

use std::net::Ipv4Addr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::utils::{set_bounded_string, set_ipv4, set_secret};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address, `0.0.0.0` disables publication
    pub ip: Ipv4Addr,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Topic prefix
    pub base: String,
    /// Publication interval in seconds, 0 publishes on change only
    pub interval: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            port: 1883,
            user: String::new(),
            password: String::new(),
            base: "optalinker".to_string(),
            interval: 0,
        }
    }
}

impl MqttConfig {
    pub fn set_ip(&mut self, value: Ipv4Addr) -> bool {
        set_ipv4(&mut self.ip, value, "MQTT ip")
    }

    pub fn set_port(&mut self, value: u16) -> bool {
        if value == 0 {
            warn!("Refusing MQTT port 0");
            return false;
        }
        if value == self.port {
            return false;
        }
        info!("Set MQTT port to: {}", value);
        self.port = value;
        true
    }

    pub fn set_user(&mut self, value: &str) -> bool {
        set_bounded_string(&mut self.user, value, "MQTT user")
    }

    pub fn set_password(&mut self, value: &str) -> bool {
        set_secret(&mut self.password, value, "MQTT password")
    }

    pub fn set_base(&mut self, value: &str) -> bool {
        set_bounded_string(&mut self.base, value, "MQTT base")
    }

    pub fn set_interval(&mut self, value: u32) -> bool {
        if value == self.interval {
            return false;
        }
        info!("Set MQTT interval to: {}", value);
        self.interval = value;
        true
    }
}
