// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus configuration
//!
//! This module defines the structures for selecting and configuring the
//! Modbus role of the gateway. Exactly one role is active at a time:
//!
//! | Code | Role | Transport |
//! |------|------|-----------|
//! | 0 | none | - |
//! | 1 | rtu-server | RS-485, answers as unit `device.id` |
//! | 2 | tcp-server | TCP, listens on `bind_address:port` |
//! | 3 | rtu-client | RS-485, queries unit `peer_id` |
//! | 4 | tcp-client | TCP, queries `ip:port` unit `peer_id` |

use std::fmt;
use std::net::Ipv4Addr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::utils::set_ipv4;

/// Active Modbus role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModbusRole {
    None,
    RtuServer,
    TcpServer,
    RtuClient,
    TcpClient,
}

impl ModbusRole {
    /// Register code of the role
    pub fn code(self) -> u16 {
        match self {
            ModbusRole::None => 0,
            ModbusRole::RtuServer => 1,
            ModbusRole::TcpServer => 2,
            ModbusRole::RtuClient => 3,
            ModbusRole::TcpClient => 4,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(ModbusRole::None),
            1 => Some(ModbusRole::RtuServer),
            2 => Some(ModbusRole::TcpServer),
            3 => Some(ModbusRole::RtuClient),
            4 => Some(ModbusRole::TcpClient),
            _ => None,
        }
    }

    /// `true` for the roles that hold the register map locally
    pub fn is_server(self) -> bool {
        matches!(self, ModbusRole::RtuServer | ModbusRole::TcpServer)
    }

    pub fn is_client(self) -> bool {
        matches!(self, ModbusRole::RtuClient | ModbusRole::TcpClient)
    }

    /// `true` for the roles that use the RS-485 link
    pub fn is_serial(self) -> bool {
        matches!(self, ModbusRole::RtuServer | ModbusRole::RtuClient)
    }
}

impl fmt::Display for ModbusRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModbusRole::None => "none",
            ModbusRole::RtuServer => "rtu-server",
            ModbusRole::TcpServer => "tcp-server",
            ModbusRole::RtuClient => "rtu-client",
            ModbusRole::TcpClient => "tcp-client",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ModbusRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ModbusRole::None),
            "rtu-server" => Ok(ModbusRole::RtuServer),
            "tcp-server" => Ok(ModbusRole::TcpServer),
            "rtu-client" => Ok(ModbusRole::RtuClient),
            "tcp-client" => Ok(ModbusRole::TcpClient),
            other => Err(format!("unknown modbus role: {}", other)),
        }
    }
}

/// Configuration for the Modbus component.
///
/// # Example
///
/// ```
/// use rust_iogateway::config::{ModbusConfig, ModbusRole};
///
/// let modbus_config = ModbusConfig {
///     role: ModbusRole::TcpServer,
///     port: 1502,
///     ..ModbusConfig::default()
/// };
/// assert!(modbus_config.role.is_server());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// The active role
    pub role: ModbusRole,

    /// Peer address in the TCP client role. `0.0.0.0` leaves the client
    /// unconfigured.
    pub ip: Ipv4Addr,

    /// Listening port (TCP server) or peer port (TCP client)
    pub port: u16,

    /// Host address the TCP server binds to
    pub bind_address: String,

    /// Unit id queried in the client roles
    pub peer_id: u8,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            role: ModbusRole::None,
            ip: Ipv4Addr::UNSPECIFIED,
            port: 502,
            bind_address: "0.0.0.0".to_string(),
            peer_id: 1,
        }
    }
}

impl ModbusConfig {
    /// Set the role from its register code
    pub fn set_role(&mut self, code: u16) -> bool {
        let Some(role) = ModbusRole::from_code(code) else {
            warn!("Refusing modbus type {}: unknown role", code);
            return false;
        };
        if role == self.role {
            return false;
        }
        info!("Set modbus type to: {}", role);
        self.role = role;
        true
    }

    pub fn set_ip(&mut self, value: Ipv4Addr) -> bool {
        set_ipv4(&mut self.ip, value, "modbus ip")
    }

    /// Set the port, refusing 0
    pub fn set_port(&mut self, value: u16) -> bool {
        if value == 0 {
            warn!("Refusing modbus port 0");
            return false;
        }
        if value == self.port {
            return false;
        }
        info!("Set modbus port to: {}", value);
        self.port = value;
        true
    }
}
