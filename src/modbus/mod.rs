// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus roles
//!
//! The gateway runs exactly one of four roles, selected once at startup:
//!
//! | Role | Transport | Registers |
//! |------|-----------|-----------|
//! | `rtu-server` | RS-485 | local [`RegisterBank`](crate::registers::RegisterBank) |
//! | `tcp-server` | TCP | local bank |
//! | `rtu-client` | RS-485 | remote peer, addressed by id |
//! | `tcp-client` | TCP | remote peer, one connection per call |
//!
//! Every role is reached through [`RoleAdapter`], so the synchronisation
//! code does not branch on the role.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_iogateway::config::{Config, PlatformConfig};
//! use rust_iogateway::modbus::RoleBinding;
//! use rust_iogateway::platform::HostPlatform;
//!
//! # async fn run() {
//! let config = Config::default();
//! let platform = Arc::new(HostPlatform::new(&PlatformConfig::default()));
//! let binding = RoleBinding::setup(&config, platform).await;
//! if let Some(adapter) = binding.adapter() {
//!     println!("Active role: {}", adapter.role());
//! }
//! # }
//! ```

pub mod client;
pub mod role;
pub mod server;
pub mod service;
pub mod setup;

pub use client::{ClientAdapter, RTU_TIMEOUT, TCP_TIMEOUT};
pub use role::{RoleAdapter, TransportError};
pub use server::{serve_rtu, serve_tcp, IdleTimeout, LocalRegisters, TCP_IDLE_TIMEOUT};
pub use service::{RegisterService, SerialRegisterService};
pub use setup::{open_serial, RoleBinding, ServerEndpoint};
