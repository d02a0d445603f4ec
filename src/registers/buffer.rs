// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Typed access to a run of register cells
//!
//! A [`CellBuffer`] holds the cells of one zone (or one block) together with
//! the address of its first cell. Values are placed and read at zone
//! offsets using the codec, so a whole zone can be assembled locally and
//! written with a single register request, or read once and decoded field by
//! field.

use std::net::Ipv4Addr;

use super::codec::{self, CodecError};

/// A contiguous run of register cells starting at `base`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellBuffer {
    base: u16,
    cells: Vec<u16>,
}

impl CellBuffer {
    /// Create a zeroed buffer of `length` cells
    pub fn new(base: u16, length: u16) -> Self {
        Self {
            base,
            cells: vec![0; length as usize],
        }
    }

    /// Wrap cells read from a register bank or a peer
    pub fn from_cells(base: u16, cells: Vec<u16>) -> Self {
        Self { base, cells }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u16> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn slot(&mut self, offset: u16, values: &[u16]) -> Result<(), CodecError> {
        let start = offset as usize;
        let end = start + values.len();
        if end > self.cells.len() {
            return Err(CodecError::ShortRun {
                expected: end,
                actual: self.cells.len(),
            });
        }
        self.cells[start..end].copy_from_slice(values);
        Ok(())
    }

    fn tail(&self, offset: u16) -> &[u16] {
        self.cells.get(offset as usize..).unwrap_or(&[])
    }

    pub fn put_u16(&mut self, offset: u16, value: u16) -> Result<(), CodecError> {
        self.slot(offset, &codec::encode_u16(value))
    }

    pub fn put_bool(&mut self, offset: u16, value: bool) -> Result<(), CodecError> {
        self.put_u16(offset, u16::from(value))
    }

    pub fn put_u32(&mut self, offset: u16, value: u32) -> Result<(), CodecError> {
        self.slot(offset, &codec::encode_u32(value))
    }

    pub fn put_signed(&mut self, offset: u16, value: i16) -> Result<(), CodecError> {
        self.slot(offset, &codec::encode_signed(value))
    }

    /// Place a string slot. On error the buffer is left untouched.
    pub fn put_str(&mut self, offset: u16, value: &str) -> Result<(), CodecError> {
        let encoded = codec::encode_str(value)?;
        self.slot(offset, &encoded)
    }

    pub fn put_ipv4(&mut self, offset: u16, value: Ipv4Addr) -> Result<(), CodecError> {
        self.slot(offset, &codec::encode_ipv4(value))
    }

    pub fn u16_at(&self, offset: u16) -> Result<u16, CodecError> {
        codec::decode_u16(self.tail(offset))
    }

    pub fn bool_at(&self, offset: u16) -> Result<bool, CodecError> {
        Ok(self.u16_at(offset)? != 0)
    }

    pub fn u32_at(&self, offset: u16) -> Result<u32, CodecError> {
        codec::decode_u32(self.tail(offset))
    }

    pub fn signed_at(&self, offset: u16) -> Result<i32, CodecError> {
        codec::decode_signed(self.tail(offset))
    }

    pub fn str_at(&self, offset: u16) -> Result<String, CodecError> {
        codec::decode_str(self.tail(offset))
    }

    pub fn ipv4_at(&self, offset: u16) -> Result<Ipv4Addr, CodecError> {
        codec::decode_ipv4(self.tail(offset))
    }
}
