// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Wire encodings for the gateway register map
//!
//! Every value published in the register map is stored as a run of 16-bit
//! cells using one of five encodings. The encodings are part of the external
//! contract and must stay bit-exact across releases.
//!
//! | Type | Value | Cells | Layout |
//! |------|-------|-------|--------|
//! | T1 | `u16` | 1 | value |
//! | T2 | `u32` | 2 | high half, low half |
//! | T3 | signed | 2 | sign flag (1 = negative), magnitude |
//! | T4 | string ≤ 48 chars | 50 | length, one cell per char, zero padding |
//! | T5 | IPv4 | 4 | one octet per cell |
//!
//! The functions here are pure: they never touch a register bank and never
//! range-check numeric values. Callers validate ranges before encoding.

use std::net::Ipv4Addr;

/// Maximum number of characters a T4 string can carry
pub const MAX_STRING_LENGTH: usize = 48;

/// Number of cells reserved for a T4 string slot (length cell, characters,
/// terminating cell)
pub const STRING_CELLS: u16 = MAX_STRING_LENGTH as u16 + 2;

/// Sign flag value marking a negative T3 value
pub const SIGN_NEGATIVE: u16 = 1;

/// Sign flag value marking a zero or positive T3 value
pub const SIGN_POSITIVE: u16 = 0;

/// Errors raised while encoding or decoding register cells
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A string exceeds the T4 capacity
    #[error("string of {length} characters exceeds the {max} character register capacity")]
    StringTooLong { length: usize, max: usize },

    /// A character does not fit in a single 16-bit cell
    #[error("character {0:?} cannot be stored in a single register cell")]
    UnencodableChar(char),

    /// Fewer cells were supplied than the encoding needs
    #[error("expected at least {expected} register cells, got {actual}")]
    ShortRun { expected: usize, actual: usize },

    /// A T4 length cell announces more characters than the encoding allows
    #[error("string length cell announces {0} characters")]
    BadLength(u16),
}

/// The five wire encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    T1,
    T2,
    T3,
    T4,
    T5,
}

impl WireType {
    /// Number of cells a value of this type occupies
    pub fn cells(self) -> u16 {
        match self {
            WireType::T1 => 1,
            WireType::T2 => 2,
            WireType::T3 => 2,
            WireType::T4 => STRING_CELLS,
            WireType::T5 => 4,
        }
    }
}

fn require(cells: &[u16], expected: usize) -> Result<(), CodecError> {
    if cells.len() < expected {
        return Err(CodecError::ShortRun {
            expected,
            actual: cells.len(),
        });
    }
    Ok(())
}

/// Encode a T1 value
pub fn encode_u16(value: u16) -> [u16; 1] {
    [value]
}

/// Decode a T1 value
pub fn decode_u16(cells: &[u16]) -> Result<u16, CodecError> {
    require(cells, 1)?;
    Ok(cells[0])
}

/// Encode a T2 value, high half first
pub fn encode_u32(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, (value & 0xFFFF) as u16]
}

/// Decode a T2 value
pub fn decode_u32(cells: &[u16]) -> Result<u32, CodecError> {
    require(cells, 2)?;
    Ok((u32::from(cells[0]) << 16) | u32::from(cells[1]))
}

/// Encode a T3 value as sign flag and magnitude
///
/// Every `i16` is representable, including `i16::MIN` whose magnitude
/// (32768) still fits the unsigned magnitude cell.
pub fn encode_signed(value: i16) -> [u16; 2] {
    let sign = if value < 0 {
        SIGN_NEGATIVE
    } else {
        SIGN_POSITIVE
    };
    [sign, value.unsigned_abs()]
}

/// Decode a T3 value
///
/// The magnitude cell can carry up to 65535, so the decoded value is
/// widened to `i32`. Any non-zero sign flag is read as negative.
pub fn decode_signed(cells: &[u16]) -> Result<i32, CodecError> {
    require(cells, 2)?;
    let magnitude = i32::from(cells[1]);
    if cells[0] != SIGN_POSITIVE {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

/// Encode a T4 string into a full, zero padded slot
///
/// Strings longer than [`MAX_STRING_LENGTH`] characters are rejected before
/// any cell is produced, so a caller that only writes on success never
/// leaves a partially updated slot behind.
pub fn encode_str(value: &str) -> Result<Vec<u16>, CodecError> {
    let length = value.chars().count();
    if length > MAX_STRING_LENGTH {
        return Err(CodecError::StringTooLong {
            length,
            max: MAX_STRING_LENGTH,
        });
    }

    let mut cells = Vec::with_capacity(STRING_CELLS as usize);
    cells.push(length as u16);
    for c in value.chars() {
        let code = u32::from(c);
        if code > u32::from(u16::MAX) {
            return Err(CodecError::UnencodableChar(c));
        }
        cells.push(code as u16);
    }
    cells.resize(STRING_CELLS as usize, 0);
    Ok(cells)
}

/// Decode a T4 string
///
/// Only the announced number of character cells is read; trailing padding
/// is ignored. Cells that are not valid scalar values decode to U+FFFD.
pub fn decode_str(cells: &[u16]) -> Result<String, CodecError> {
    require(cells, 1)?;
    let length = cells[0];
    if usize::from(length) > MAX_STRING_LENGTH {
        return Err(CodecError::BadLength(length));
    }
    let length = usize::from(length);
    require(cells, length + 1)?;

    Ok(cells[1..=length]
        .iter()
        .map(|&cell| char::from_u32(u32::from(cell)).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}

/// Encode a T5 address, one octet per cell
pub fn encode_ipv4(address: Ipv4Addr) -> [u16; 4] {
    address.octets().map(u16::from)
}

/// Decode a T5 address
///
/// Only the low byte of each cell is significant.
pub fn decode_ipv4(cells: &[u16]) -> Result<Ipv4Addr, CodecError> {
    require(cells, 4)?;
    Ok(Ipv4Addr::new(
        (cells[0] & 0xFF) as u8,
        (cells[1] & 0xFF) as u8,
        (cells[2] & 0xFF) as u8,
        (cells[3] & 0xFF) as u8,
    ))
}
