// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Network interface configuration
//!
//! Bringing the link up is handled outside the gateway core; these settings
//! are only stored, published in the register map and accepted back through
//! a configuration commit.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::utils::{set_bounded_string, set_flag, set_ipv4, set_secret};

/// Network interface settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Static address, ignored when DHCP is enabled
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns: Ipv4Addr,
    pub dhcp: bool,
    /// Use the wireless interface instead of ethernet
    pub wifi: bool,
    pub ssid: String,
    pub password: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::new(192, 168, 1, 231),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            subnet: Ipv4Addr::new(255, 255, 255, 0),
            dns: Ipv4Addr::new(4, 4, 4, 4),
            dhcp: false,
            wifi: false,
            ssid: String::new(),
            password: String::new(),
        }
    }
}

impl NetworkConfig {
    pub fn set_ip(&mut self, value: Ipv4Addr) -> bool {
        set_ipv4(&mut self.ip, value, "network ip")
    }

    pub fn set_gateway(&mut self, value: Ipv4Addr) -> bool {
        set_ipv4(&mut self.gateway, value, "network gateway")
    }

    pub fn set_subnet(&mut self, value: Ipv4Addr) -> bool {
        set_ipv4(&mut self.subnet, value, "network subnet")
    }

    pub fn set_dns(&mut self, value: Ipv4Addr) -> bool {
        set_ipv4(&mut self.dns, value, "network dns")
    }

    pub fn set_dhcp(&mut self, value: bool) -> bool {
        set_flag(&mut self.dhcp, value, "network dhcp")
    }

    pub fn set_wifi(&mut self, value: bool) -> bool {
        set_flag(&mut self.wifi, value, "network wifi")
    }

    pub fn set_ssid(&mut self, value: &str) -> bool {
        set_bounded_string(&mut self.ssid, value, "network ssid")
    }

    pub fn set_password(&mut self, value: &str) -> bool {
        set_secret(&mut self.password, value, "network password")
    }
}
