// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Server roles
//!
//! The gateway keeps its registers in a [`RegisterBank`]. The synchronisation
//! writes to it through [`LocalRegisters`], while [`serve_tcp`] or
//! [`serve_rtu`] answer the peers from the same bank.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, Sleep};
use tokio_modbus::server::tcp::Server;
use tokio_serial::SerialStream;

use super::role::{RoleAdapter, TransportError};
use super::service::{RegisterService, SerialRegisterService};
use crate::config::ModbusRole;
use crate::registers::{RegisterBank, RegisterKind};

/// A TCP peer that stays silent this long is disconnected
pub const TCP_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Role adapter of the server roles
#[derive(Debug, Clone)]
pub struct LocalRegisters {
    role: ModbusRole,
    bank: Arc<RegisterBank>,
}

impl LocalRegisters {
    pub fn new(role: ModbusRole, bank: Arc<RegisterBank>) -> Self {
        Self { role, bank }
    }

    pub fn bank(&self) -> &Arc<RegisterBank> {
        &self.bank
    }
}

#[async_trait]
impl RoleAdapter for LocalRegisters {
    fn role(&self) -> ModbusRole {
        self.role
    }

    async fn read_registers(
        &self,
        kind: RegisterKind,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        Ok(self.bank.read(kind, start, count)?)
    }

    async fn write_registers(
        &self,
        kind: RegisterKind,
        start: u16,
        values: &[u16],
    ) -> Result<(), TransportError> {
        Ok(self.bank.write(kind, start, values)?)
    }

    async fn write_mirrored(&self, start: u16, values: &[u16]) -> Result<(), TransportError> {
        Ok(self.bank.write_mirrored(start, values)?)
    }

    async fn read_coil(&self, uid: u16) -> Result<bool, TransportError> {
        Ok(self.bank.read_coils(uid, 1)?[0])
    }

    async fn write_coil(&self, uid: u16, value: bool) -> Result<(), TransportError> {
        Ok(self.bank.write_coils(uid, &[value])?)
    }

    async fn replace_coil(
        &self,
        uid: u16,
        expected: bool,
        value: bool,
    ) -> Result<bool, TransportError> {
        Ok(self.bank.replace_coil_if(uid, expected, value)?)
    }

    async fn take_register(&self, kind: RegisterKind, address: u16) -> Result<u16, TransportError> {
        Ok(self.bank.take(kind, address)?)
    }

    async fn read_discrete_input(&self, uid: u16) -> Result<bool, TransportError> {
        Ok(self.bank.read_discrete_inputs(uid, 1)?[0])
    }

    async fn write_discrete_input(&self, uid: u16, value: bool) -> Result<(), TransportError> {
        Ok(self.bank.write_discrete_inputs(uid, &[value])?)
    }
}

/// Byte stream that fails with `TimedOut` after a period without traffic
#[derive(Debug)]
pub struct IdleTimeout<S> {
    inner: S,
    timeout: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl<S> IdleTimeout<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            deadline: Box::pin(tokio::time::sleep(timeout)),
        }
    }

    fn touch(&mut self) {
        let next = Instant::now() + self.timeout;
        self.deadline.as_mut().reset(next);
    }

    fn poll_idle(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        self.deadline
            .as_mut()
            .poll(cx)
            .map(|()| io::Error::new(io::ErrorKind::TimedOut, "Modbus peer idle for too long"))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for IdleTimeout<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.touch();
                Poll::Ready(result)
            }
            Poll::Pending => this.poll_idle(cx).map(Err),
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IdleTimeout<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_write(cx, buf);
        if res.is_ready() {
            this.touch();
        }
        res
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Answer Modbus TCP peers on `listener` until the task is aborted
pub async fn serve_tcp(
    listener: TcpListener,
    bank: Arc<RegisterBank>,
    idle_timeout: Duration,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Modbus TCP server listening on {}", addr);
    }
    let server = Server::new(listener);

    let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
        let service = RegisterService::new(bank.clone());
        async move {
            info!("Modbus peer {} connected", socket_addr);
            Ok::<_, io::Error>(Some((service, IdleTimeout::new(stream, idle_timeout))))
        }
    };

    let on_process_error = |err: io::Error| {
        if err.kind() == io::ErrorKind::TimedOut {
            warn!("Kicking idle Modbus peer: {err}");
        } else {
            error!("Modbus server error: {err}");
        }
    };

    server.serve(&on_connected, on_process_error).await?;
    debug!("Modbus TCP server terminated");
    Ok(())
}

/// Answer Modbus RTU requests for `unit_id` on an open serial line until
/// the task is aborted
pub async fn serve_rtu(serial: SerialStream, unit_id: u8, bank: Arc<RegisterBank>) -> io::Result<()> {
    info!("Modbus RTU server answering as unit {}", unit_id);

    let server = tokio_modbus::server::rtu::Server::new(serial);
    let service = SerialRegisterService::new(unit_id, bank);
    if let Err(err) = server.serve_forever(service).await {
        error!("Modbus RTU server error: {err}");
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::layout::POINTER_TABLE;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_local_registers_mirror() -> Result<(), TransportError> {
        let adapter = LocalRegisters::new(ModbusRole::TcpServer, Arc::new(RegisterBank::new()));
        adapter.write_mirrored(POINTER_TABLE, &[1, 2, 3]).await?;
        assert_eq!(
            adapter
                .read_registers(RegisterKind::Input, POINTER_TABLE, 3)
                .await?,
            vec![1, 2, 3]
        );
        assert_eq!(
            adapter
                .read_registers(RegisterKind::Holding, POINTER_TABLE, 3)
                .await?,
            vec![1, 2, 3]
        );

        adapter.write_coil(101, true).await?;
        assert!(adapter.read_coil(101).await?);
        assert!(!adapter.read_discrete_input(101).await?);
        assert!(adapter.read_coil(800).await.is_err());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_times_out() {
        let (client, server) = tokio::io::duplex(64);
        let mut idle = IdleTimeout::new(server, TCP_IDLE_TIMEOUT);
        let mut client = client;

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        idle.read_exact(&mut buf).await.unwrap();

        let err = idle.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
