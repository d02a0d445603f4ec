// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Client roles
//!
//! Every call is a single round trip with a bounded wait and no retry:
//!
//! - TCP: connect, exchange, disconnect. No session is kept open between
//!   calls.
//! - RTU: the serial line stays attached and requests are addressed to the
//!   configured peer id. A timed out request drops the line, which is
//!   reopened on the next call so that a late answer cannot be read as the
//!   reply to another request.
//!
//! Calls are serialised on the transport and bracketed by a platform freeze
//! so that a slow peer does not trip the watchdog.

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use super::role::{RoleAdapter, TransportError};
use super::setup::open_serial;
use crate::config::ModbusRole;
use crate::platform::{FreezeGuard, Platform};
use crate::registers::RegisterKind;

/// Answer deadline on the serial line
pub const RTU_TIMEOUT: Duration = Duration::from_millis(1000);

/// Connect and answer deadline over TCP
pub const TCP_TIMEOUT: Duration = Duration::from_millis(5000);

enum Exchange<'a> {
    ReadRegisters(RegisterKind, u16, u16),
    WriteRegisters(u16, &'a [u16]),
    ReadCoil(u16),
    WriteCoil(u16, bool),
    ReadDiscreteInput(u16),
}

enum Reply {
    Registers(Vec<u16>),
    Bits(Vec<bool>),
    Done,
}

impl Reply {
    fn into_registers(self) -> Result<Vec<u16>, TransportError> {
        match self {
            Reply::Registers(values) => Ok(values),
            _ => Err(TransportError::Protocol("unexpected reply".to_string())),
        }
    }

    fn into_bit(self) -> Result<bool, TransportError> {
        match self {
            Reply::Bits(bits) => bits
                .first()
                .copied()
                .ok_or_else(|| TransportError::Protocol("empty bit reply".to_string())),
            _ => Err(TransportError::Protocol("unexpected reply".to_string())),
        }
    }
}

async fn perform(ctx: &mut Context, exchange: Exchange<'_>) -> Result<Reply, TransportError> {
    let res = match exchange {
        Exchange::ReadRegisters(RegisterKind::Holding, addr, cnt) => ctx
            .read_holding_registers(addr, cnt)
            .await
            .map(|r| r.map(Reply::Registers)),
        Exchange::ReadRegisters(RegisterKind::Input, addr, cnt) => ctx
            .read_input_registers(addr, cnt)
            .await
            .map(|r| r.map(Reply::Registers)),
        Exchange::WriteRegisters(addr, values) => ctx
            .write_multiple_registers(addr, values)
            .await
            .map(|r| r.map(|()| Reply::Done)),
        Exchange::ReadCoil(addr) => ctx.read_coils(addr, 1).await.map(|r| r.map(Reply::Bits)),
        Exchange::WriteCoil(addr, value) => ctx
            .write_single_coil(addr, value)
            .await
            .map(|r| r.map(|()| Reply::Done)),
        Exchange::ReadDiscreteInput(addr) => ctx
            .read_discrete_inputs(addr, 1)
            .await
            .map(|r| r.map(Reply::Bits)),
    };

    match res {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(code)) => Err(TransportError::Exception(code)),
        Err(err) => Err(TransportError::Protocol(err.to_string())),
    }
}

type Reopen = Box<dyn Fn() -> Result<Context, TransportError> + Send + Sync>;

/// Serial line of the RTU client
struct RtuLink {
    ctx: Option<Context>,
    reopen: Option<Reopen>,
}

impl RtuLink {
    fn context(&mut self) -> Result<&mut Context, TransportError> {
        if self.ctx.is_none() {
            let reopen = self.reopen.as_ref().ok_or_else(|| {
                TransportError::Connect("serial line dropped after a timeout".to_string())
            })?;
            self.ctx = Some(reopen()?);
            debug!("Serial line reopened");
        }
        self.ctx
            .as_mut()
            .ok_or_else(|| TransportError::Connect("serial line unavailable".to_string()))
    }
}

enum Transport {
    Tcp {
        addr: SocketAddr,
        unit: Slave,
        lock: Mutex<()>,
    },
    Rtu {
        link: Mutex<RtuLink>,
    },
}

/// Role adapter of the client roles
pub struct ClientAdapter {
    role: ModbusRole,
    transport: Transport,
    timeout: Duration,
    platform: Arc<dyn Platform>,
}

impl ClientAdapter {
    /// TCP client of the gateway at `addr`
    pub fn tcp(addr: SocketAddr, unit_id: u8, platform: Arc<dyn Platform>) -> Self {
        Self {
            role: ModbusRole::TcpClient,
            transport: Transport::Tcp {
                addr,
                unit: Slave(unit_id),
                lock: Mutex::new(()),
            },
            timeout: TCP_TIMEOUT,
            platform,
        }
    }

    /// RTU client over an already open byte stream
    ///
    /// The stream cannot be reopened: calls after a timeout fail.
    pub fn rtu<T>(transport: T, peer_id: u8, platform: Arc<dyn Platform>) -> Self
    where
        T: AsyncRead + AsyncWrite + Debug + Unpin + Send + 'static,
    {
        Self::with_link(
            RtuLink {
                ctx: Some(rtu::attach_slave(transport, Slave(peer_id))),
                reopen: None,
            },
            platform,
        )
    }

    /// RTU client on the byte stream returned by `open`, called again to
    /// reattach after a timeout
    pub fn rtu_reopening<T, F>(
        open: F,
        peer_id: u8,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, TransportError>
    where
        T: AsyncRead + AsyncWrite + Debug + Unpin + Send + 'static,
        F: Fn() -> Result<T, TransportError> + Send + Sync + 'static,
    {
        let reopen: Reopen =
            Box::new(move || open().map(|stream| rtu::attach_slave(stream, Slave(peer_id))));
        let ctx = reopen()?;
        Ok(Self::with_link(
            RtuLink {
                ctx: Some(ctx),
                reopen: Some(reopen),
            },
            platform,
        ))
    }

    fn with_link(link: RtuLink, platform: Arc<dyn Platform>) -> Self {
        Self {
            role: ModbusRole::RtuClient,
            transport: Transport::Rtu {
                link: Mutex::new(link),
            },
            timeout: RTU_TIMEOUT,
            platform,
        }
    }

    /// RTU client on a serial port
    pub fn open_rtu(
        port: &str,
        baudrate: u32,
        peer_id: u8,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, TransportError> {
        let port = port.to_string();
        Self::rtu_reopening(
            move || {
                open_serial(&port, baudrate)
                    .map_err(|e| TransportError::Connect(format!("{}: {}", port, e)))
            },
            peer_id,
            platform,
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call(&self, exchange: Exchange<'_>) -> Result<Reply, TransportError> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let res = match &self.transport {
            Transport::Tcp { addr, unit, lock } => {
                let _transport = lock.lock().await;
                let _freeze = FreezeGuard::new(self.platform.as_ref());
                let round_trip = async {
                    let mut ctx = tcp::connect_slave(*addr, *unit)
                        .await
                        .map_err(|e| TransportError::Connect(format!("{}: {}", addr, e)))?;
                    let reply = perform(&mut ctx, exchange).await;
                    if let Err(e) = ctx.disconnect().await {
                        debug!("Disconnect from {} failed: {}", addr, e);
                    }
                    reply
                };
                tokio::time::timeout(self.timeout, round_trip)
                    .await
                    .unwrap_or(Err(TransportError::Timeout(timeout_ms)))
            }
            Transport::Rtu { link } => {
                let mut link = link.lock().await;
                let _freeze = FreezeGuard::new(self.platform.as_ref());
                let exchanged = match link.context() {
                    Ok(ctx) => tokio::time::timeout(self.timeout, perform(ctx, exchange)).await,
                    Err(e) => Ok(Err(e)),
                };
                exchanged.unwrap_or_else(|_| {
                    link.ctx = None;
                    Err(TransportError::Timeout(timeout_ms))
                })
            }
        };

        if let Err(e) = &res {
            warn!("Modbus {} request failed: {}", self.role, e);
        }
        res
    }

    fn unsupported(&self, operation: &'static str) -> TransportError {
        TransportError::Unsupported {
            role: self.role,
            operation,
        }
    }
}

#[async_trait]
impl RoleAdapter for ClientAdapter {
    fn role(&self) -> ModbusRole {
        self.role
    }

    async fn read_registers(
        &self,
        kind: RegisterKind,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.call(Exchange::ReadRegisters(kind, start, count))
            .await?
            .into_registers()
    }

    async fn write_registers(
        &self,
        kind: RegisterKind,
        start: u16,
        values: &[u16],
    ) -> Result<(), TransportError> {
        if kind == RegisterKind::Input {
            return Err(self.unsupported("write input registers"));
        }
        self.call(Exchange::WriteRegisters(start, values))
            .await
            .map(|_| ())
    }

    async fn read_coil(&self, uid: u16) -> Result<bool, TransportError> {
        self.call(Exchange::ReadCoil(uid)).await?.into_bit()
    }

    async fn write_coil(&self, uid: u16, value: bool) -> Result<(), TransportError> {
        self.call(Exchange::WriteCoil(uid, value)).await.map(|_| ())
    }

    async fn read_discrete_input(&self, uid: u16) -> Result<bool, TransportError> {
        self.call(Exchange::ReadDiscreteInput(uid)).await?.into_bit()
    }

    async fn write_discrete_input(&self, _uid: u16, _value: bool) -> Result<(), TransportError> {
        Err(self.unsupported("write discrete inputs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;
    use crate::platform::HostPlatform;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_rtu_timeout_yields_failure() {
        let platform = Arc::new(HostPlatform::new(&PlatformConfig::default()));
        let (local, _peer) = tokio::io::duplex(256);
        let adapter = ClientAdapter::rtu(local, 5, platform.clone())
            .with_timeout(Duration::from_millis(50));

        let res = adapter
            .read_registers(RegisterKind::Holding, 10000, 1)
            .await;

        assert_eq!(res, Err(TransportError::Timeout(50)));
        assert!(!platform.is_frozen());

        // The stream cannot be reattached
        assert!(matches!(
            adapter.read_coil(101).await,
            Err(TransportError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_rtu_line_reopened_after_timeout() {
        let platform = Arc::new(HostPlatform::new(&PlatformConfig::default()));
        let opened = Arc::new(AtomicUsize::new(0));
        let peers = Arc::new(StdMutex::new(Vec::new()));

        let adapter = {
            let opened = opened.clone();
            let peers = peers.clone();
            ClientAdapter::rtu_reopening(
                move || {
                    opened.fetch_add(1, Ordering::SeqCst);
                    let (local, peer) = tokio::io::duplex(256);
                    peers.lock().unwrap().push(peer);
                    Ok(local)
                },
                5,
                platform,
            )
            .unwrap()
            .with_timeout(Duration::from_millis(50))
        };
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        let res = adapter.read_registers(RegisterKind::Holding, 10000, 1).await;
        assert_eq!(res, Err(TransportError::Timeout(50)));
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        let res = adapter.read_coil(101).await;
        assert_eq!(res, Err(TransportError::Timeout(50)));
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_cannot_write_discrete_inputs() {
        let platform = Arc::new(HostPlatform::new(&PlatformConfig::default()));
        let adapter = ClientAdapter::tcp("127.0.0.1:1".parse().unwrap(), 1, platform);
        assert!(matches!(
            adapter.write_discrete_input(0, true).await,
            Err(TransportError::Unsupported { .. })
        ));
        assert!(matches!(
            adapter.write_registers(RegisterKind::Input, 10000, &[1]).await,
            Err(TransportError::Unsupported { .. })
        ));
    }
}
