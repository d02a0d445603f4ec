// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Role selection at startup
//!
//! The configured role is resolved once into a [`RoleBinding`]. A role that
//! cannot be set up (no RS-485 transceiver, unusable peer address, port
//! already in use, serial device missing) is logged and replaced by the
//! `none` role so that the rest of the gateway keeps running.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::net::TcpListener;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::client::ClientAdapter;
use super::role::RoleAdapter;
use super::server::LocalRegisters;
use crate::config::{Config, ModbusRole};
use crate::platform::Platform;
use crate::registers::RegisterBank;

/// Open an RS-485 line with 8 data bits, even parity and one stop bit
pub fn open_serial(port: &str, baudrate: u32) -> tokio_serial::Result<SerialStream> {
    tokio_serial::new(port, baudrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::Even)
        .stop_bits(StopBits::One)
        .open_native_async()
}

/// Where a server role answers its peers
#[derive(Debug)]
pub enum ServerEndpoint {
    Tcp(TcpListener),
    Rtu { serial: SerialStream, unit_id: u8 },
}

/// The active role, ready to be driven
pub enum RoleBinding {
    Disabled,
    Server {
        adapter: Arc<LocalRegisters>,
        endpoint: ServerEndpoint,
    },
    Client(Arc<ClientAdapter>),
}

impl RoleBinding {
    pub fn role(&self) -> ModbusRole {
        match self {
            RoleBinding::Disabled => ModbusRole::None,
            RoleBinding::Server { adapter, .. } => adapter.role(),
            RoleBinding::Client(adapter) => adapter.role(),
        }
    }

    /// Register access of the role, `None` when disabled
    pub fn adapter(&self) -> Option<Arc<dyn RoleAdapter>> {
        match self {
            RoleBinding::Disabled => None,
            RoleBinding::Server { adapter, .. } => Some(adapter.clone()),
            RoleBinding::Client(adapter) => Some(adapter.clone()),
        }
    }

    /// Set up the configured role, falling back to `none` on failure
    pub async fn setup(config: &Config, platform: Arc<dyn Platform>) -> Self {
        let role = config.modbus.role;
        match Self::try_setup(config, platform).await {
            Ok(binding) => {
                info!("Modbus role: {}", binding.role());
                binding
            }
            Err(e) => {
                warn!("Modbus {} setup failed, falling back to none: {:#}", role, e);
                RoleBinding::Disabled
            }
        }
    }

    async fn try_setup(config: &Config, platform: Arc<dyn Platform>) -> Result<Self> {
        let role = config.modbus.role;
        if role.is_serial() && !config.platform.board.has_rs485() {
            anyhow::bail!("{} has no RS485 transceiver", config.platform.board.name());
        }

        let serial_port = config.rs485.serial_port.as_str();
        let baudrate = config.rs485.baudrate;

        match role {
            ModbusRole::None => Ok(RoleBinding::Disabled),
            ModbusRole::TcpServer => {
                let addr = format!("{}:{}", config.modbus.bind_address, config.modbus.port);
                let listener = TcpListener::bind(&addr)
                    .await
                    .with_context(|| format!("Failed to bind Modbus server on {}", addr))?;
                Ok(RoleBinding::Server {
                    adapter: Arc::new(LocalRegisters::new(role, Arc::new(RegisterBank::new()))),
                    endpoint: ServerEndpoint::Tcp(listener),
                })
            }
            ModbusRole::RtuServer => {
                let serial = open_serial(serial_port, baudrate)
                    .with_context(|| format!("Failed to open {}", serial_port))?;
                Ok(RoleBinding::Server {
                    adapter: Arc::new(LocalRegisters::new(role, Arc::new(RegisterBank::new()))),
                    endpoint: ServerEndpoint::Rtu {
                        serial,
                        unit_id: config.device.id,
                    },
                })
            }
            ModbusRole::TcpClient => {
                if config.modbus.ip.is_unspecified() {
                    anyhow::bail!("no peer address configured");
                }
                let addr = SocketAddr::from((config.modbus.ip, config.modbus.port));
                Ok(RoleBinding::Client(Arc::new(ClientAdapter::tcp(
                    addr,
                    config.modbus.peer_id,
                    platform,
                ))))
            }
            ModbusRole::RtuClient => {
                let adapter =
                    ClientAdapter::open_rtu(serial_port, baudrate, config.modbus.peer_id, platform)?;
                Ok(RoleBinding::Client(Arc::new(adapter)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoardType, PlatformConfig};
    use crate::platform::HostPlatform;

    fn platform() -> Arc<dyn Platform> {
        Arc::new(HostPlatform::new(&PlatformConfig::default()))
    }

    #[tokio::test]
    async fn test_tcp_client_without_peer_falls_back() {
        let mut config = Config::default();
        config.modbus.role = ModbusRole::TcpClient;

        let binding = RoleBinding::setup(&config, platform()).await;
        assert_eq!(binding.role(), ModbusRole::None);
        assert!(binding.adapter().is_none());
    }

    #[tokio::test]
    async fn test_serial_role_needs_rs485_board() {
        let mut config = Config::default();
        config.modbus.role = ModbusRole::RtuServer;
        config.platform.board = BoardType::Lite;

        let binding = RoleBinding::setup(&config, platform()).await;
        assert!(matches!(binding, RoleBinding::Disabled));
    }

    #[tokio::test]
    async fn test_tcp_server_binds() {
        let mut config = Config::default();
        config.modbus.role = ModbusRole::TcpServer;
        config.modbus.bind_address = "127.0.0.1".to_string();
        config.modbus.port = 0;

        let binding = RoleBinding::setup(&config, platform()).await;
        assert_eq!(binding.role(), ModbusRole::TcpServer);
        assert!(matches!(
            binding,
            RoleBinding::Server {
                endpoint: ServerEndpoint::Tcp(_),
                ..
            }
        ));
    }
}
