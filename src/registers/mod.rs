// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register map of the gateway
//!
//! - [`codec`]: the five wire encodings (T1 to T5)
//! - [`layout`]: zone bases, offsets and the pointer table
//! - [`buffer`]: typed field access over a run of cells
//! - [`bank`]: local storage used by the server roles

pub mod bank;
pub mod buffer;
pub mod codec;
pub mod layout;

pub use bank::{BankError, RegisterBank, RegisterKind};
pub use buffer::CellBuffer;
pub use codec::{CodecError, WireType, MAX_STRING_LENGTH};
pub use layout::{uid, Direction, ZoneTable};
