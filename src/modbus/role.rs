// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Uniform access to the registers of the active Modbus role
//!
//! Server roles read and write their local [`RegisterBank`](crate::registers::RegisterBank),
//! client roles perform one round trip to the peer per call. Both expose
//! the same surface so that the synchronisation code does not care which
//! role is active.

use async_trait::async_trait;
use tokio_modbus::ExceptionCode;

use crate::config::ModbusRole;
use crate::registers::{BankError, RegisterKind};

/// Failure of a register access
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("cannot connect to the Modbus peer: {0}")]
    Connect(String),

    #[error("Modbus peer did not answer within {0} ms")]
    Timeout(u64),

    #[error("Modbus peer answered with exception {0:?}")]
    Exception(ExceptionCode),

    #[error("Modbus protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Address(#[from] BankError),

    #[error("the {role} role cannot {operation}")]
    Unsupported {
        role: ModbusRole,
        operation: &'static str,
    },
}

/// Register, coil and discrete input access of the active role
///
/// Coils and discrete inputs are addressed by channel uid.
#[async_trait]
pub trait RoleAdapter: Send + Sync {
    fn role(&self) -> ModbusRole;

    async fn read_registers(
        &self,
        kind: RegisterKind,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    async fn write_registers(
        &self,
        kind: RegisterKind,
        start: u16,
        values: &[u16],
    ) -> Result<(), TransportError>;

    /// Publish values in both register tables
    ///
    /// A peer only has a writable holding table, which is what client roles
    /// write by default.
    async fn write_mirrored(&self, start: u16, values: &[u16]) -> Result<(), TransportError> {
        self.write_registers(RegisterKind::Holding, start, values)
            .await
    }

    async fn read_coil(&self, uid: u16) -> Result<bool, TransportError>;

    async fn write_coil(&self, uid: u16, value: bool) -> Result<(), TransportError>;

    /// Set a coil to `value` unless it no longer holds `expected`
    ///
    /// Returns whether the coil was written. Remote roles cannot lock the
    /// peer, the default reads then writes.
    async fn replace_coil(
        &self,
        uid: u16,
        expected: bool,
        value: bool,
    ) -> Result<bool, TransportError> {
        if self.read_coil(uid).await? != expected {
            return Ok(false);
        }
        self.write_coil(uid, value).await?;
        Ok(true)
    }

    /// Read a register and zero it, returns the value read
    async fn take_register(&self, kind: RegisterKind, address: u16) -> Result<u16, TransportError> {
        let value = self
            .read_registers(kind, address, 1)
            .await?
            .first()
            .copied()
            .unwrap_or(0);
        if value != 0 {
            self.write_registers(kind, address, &[0]).await?;
        }
        Ok(value)
    }

    async fn read_discrete_input(&self, uid: u16) -> Result<bool, TransportError>;

    async fn write_discrete_input(&self, uid: u16, value: bool) -> Result<(), TransportError>;
}
