// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust IO gateway library
//!
//! A modular IO gateway: a main board and up to seven plug-in modules expose
//! debounced inputs and driven outputs, with pulse and on-time statistics,
//! through a fixed Modbus register map. The gateway serves that map over
//! Modbus TCP or RTU, or reads another gateway's map as a client.

pub mod build_info;
pub mod config;
pub mod daemon;
pub mod io;
pub mod modbus;
pub mod platform;
pub mod registers;
pub mod sync;
