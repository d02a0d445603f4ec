// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Local register storage for the server roles
//!
//! The bank keeps four tables:
//!
//! - input registers (read only for peers) covering the whole register map
//! - holding registers (read/write for peers) covering the same addresses
//! - coils, one per output channel uid
//! - discrete inputs, one per input channel uid
//!
//! The gateway publishes values with [`RegisterBank::write_mirrored`], which
//! writes the input and holding tables identically so that either Modbus
//! read function observes the same data. Peers can only alter the holding
//! table and the coils.
//!
//! The bank is shared between the tick task and the Modbus server task, so
//! all tables sit behind a single mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::layout::{BIT_COUNT, POINTER_TABLE, REGISTER_COUNT};

/// The two register tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// Read-only mirror (function code 0x04)
    Input,
    /// Writable mirror (function codes 0x03, 0x06, 0x10)
    Holding,
}

/// Errors raised when an access falls outside the bank
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankError {
    #[error("register range {start}+{count} is outside the register map")]
    RegisterOutOfRange { start: u16, count: u16 },

    #[error("bit range {start}+{count} is outside the {limit} addressable bits")]
    BitOutOfRange { start: u16, count: u16, limit: u16 },
}

#[derive(Debug)]
struct Tables {
    input: Vec<u16>,
    holding: Vec<u16>,
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
}

impl Tables {
    fn registers(&self, kind: RegisterKind) -> &Vec<u16> {
        match kind {
            RegisterKind::Input => &self.input,
            RegisterKind::Holding => &self.holding,
        }
    }

    fn registers_mut(&mut self, kind: RegisterKind) -> &mut Vec<u16> {
        match kind {
            RegisterKind::Input => &mut self.input,
            RegisterKind::Holding => &mut self.holding,
        }
    }
}

/// Register storage answering Modbus requests in the server roles
#[derive(Debug)]
pub struct RegisterBank {
    base: u16,
    tables: Mutex<Tables>,
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBank {
    /// Create a zeroed bank covering the whole register map
    pub fn new() -> Self {
        Self::with_range(POINTER_TABLE, REGISTER_COUNT, BIT_COUNT)
    }

    /// Create a zeroed bank covering `count` registers from `base` and
    /// `bits` coils/discrete inputs from address 0
    pub fn with_range(base: u16, count: u16, bits: u16) -> Self {
        Self {
            base,
            tables: Mutex::new(Tables {
                input: vec![0; count as usize],
                holding: vec![0; count as usize],
                coils: vec![false; bits as usize],
                discrete_inputs: vec![false; bits as usize],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register_range(
        &self,
        len: usize,
        start: u16,
        count: u16,
    ) -> Result<std::ops::Range<usize>, BankError> {
        let error = BankError::RegisterOutOfRange { start, count };
        let first = start.checked_sub(self.base).ok_or(error)? as usize;
        let end = first + count as usize;
        if end > len {
            return Err(error);
        }
        Ok(first..end)
    }

    fn register_count(start: u16, len: usize) -> Result<u16, BankError> {
        u16::try_from(len).map_err(|_| BankError::RegisterOutOfRange {
            start,
            count: u16::MAX,
        })
    }

    fn bit_count(tables_len: usize, start: u16, len: usize) -> Result<u16, BankError> {
        u16::try_from(len).map_err(|_| BankError::BitOutOfRange {
            start,
            count: u16::MAX,
            limit: tables_len as u16,
        })
    }

    fn bit_range(len: usize, start: u16, count: u16) -> Result<std::ops::Range<usize>, BankError> {
        let end = start as usize + count as usize;
        if end > len {
            return Err(BankError::BitOutOfRange {
                start,
                count,
                limit: len as u16,
            });
        }
        Ok(start as usize..end)
    }

    /// Read `count` registers starting at `start`
    pub fn read(&self, kind: RegisterKind, start: u16, count: u16) -> Result<Vec<u16>, BankError> {
        let tables = self.lock();
        let registers = tables.registers(kind);
        let range = self.register_range(registers.len(), start, count)?;
        Ok(registers[range].to_vec())
    }

    /// Write registers of a single table starting at `start`
    pub fn write(&self, kind: RegisterKind, start: u16, values: &[u16]) -> Result<(), BankError> {
        let mut tables = self.lock();
        let registers = tables.registers_mut(kind);
        let count = Self::register_count(start, values.len())?;
        let range = self.register_range(registers.len(), start, count)?;
        registers[range].copy_from_slice(values);
        Ok(())
    }

    /// Write the same values to the input and holding tables
    pub fn write_mirrored(&self, start: u16, values: &[u16]) -> Result<(), BankError> {
        let mut tables = self.lock();
        let count = Self::register_count(start, values.len())?;
        let range = self.register_range(tables.input.len(), start, count)?;
        tables.input[range.clone()].copy_from_slice(values);
        tables.holding[range].copy_from_slice(values);
        Ok(())
    }

    /// Read a register and zero it in the same critical section
    ///
    /// A value written by a peer after the call stays in place for the next
    /// one.
    pub fn take(&self, kind: RegisterKind, address: u16) -> Result<u16, BankError> {
        let mut tables = self.lock();
        let registers = tables.registers_mut(kind);
        let range = self.register_range(registers.len(), address, 1)?;
        Ok(std::mem::take(&mut registers[range.start]))
    }

    /// Raw register value, `None` when the address is outside the map
    pub fn get(&self, kind: RegisterKind, address: u16) -> Option<u16> {
        self.read(kind, address, 1).ok().map(|cells| cells[0])
    }

    /// Set a raw register value, returns `false` when the address is
    /// outside the map
    pub fn set(&self, kind: RegisterKind, address: u16, value: u16) -> bool {
        self.write(kind, address, &[value]).is_ok()
    }

    pub fn read_coils(&self, start: u16, count: u16) -> Result<Vec<bool>, BankError> {
        let tables = self.lock();
        let range = Self::bit_range(tables.coils.len(), start, count)?;
        Ok(tables.coils[range].to_vec())
    }

    pub fn write_coils(&self, start: u16, values: &[bool]) -> Result<(), BankError> {
        let mut tables = self.lock();
        let count = Self::bit_count(tables.coils.len(), start, values.len())?;
        let range = Self::bit_range(tables.coils.len(), start, count)?;
        tables.coils[range].copy_from_slice(values);
        Ok(())
    }

    /// Set coil `address` to `value` only while it still holds `expected`
    ///
    /// Returns `false`, leaving the coil untouched, when a peer changed it.
    pub fn replace_coil_if(
        &self,
        address: u16,
        expected: bool,
        value: bool,
    ) -> Result<bool, BankError> {
        let mut tables = self.lock();
        let range = Self::bit_range(tables.coils.len(), address, 1)?;
        let coil = &mut tables.coils[range.start];
        if *coil != expected {
            return Ok(false);
        }
        *coil = value;
        Ok(true)
    }

    pub fn read_discrete_inputs(&self, start: u16, count: u16) -> Result<Vec<bool>, BankError> {
        let tables = self.lock();
        let range = Self::bit_range(tables.discrete_inputs.len(), start, count)?;
        Ok(tables.discrete_inputs[range].to_vec())
    }

    pub fn write_discrete_inputs(&self, start: u16, values: &[bool]) -> Result<(), BankError> {
        let mut tables = self.lock();
        let count = Self::bit_count(tables.discrete_inputs.len(), start, values.len())?;
        let range = Self::bit_range(tables.discrete_inputs.len(), start, count)?;
        tables.discrete_inputs[range].copy_from_slice(values);
        Ok(())
    }
}
