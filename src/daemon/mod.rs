// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon wires the gateway together and runs its background tasks:
//! channel polling with the register synchronisation, the Modbus server of
//! the server roles, and the watchdog and persistence maintenance.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_iogateway::config::{ConfigStore, FileConfigStore};
//! use rust_iogateway::daemon::launch_daemon::Daemon;
//! use rust_iogateway::io::SimulatedHardware;
//! use rust_iogateway::platform::HostPlatform;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let store = FileConfigStore::open("config.yaml")?;
//!     let config = store.config().clone();
//!     let platform = Arc::new(HostPlatform::new(&config.platform));
//!     let hardware = SimulatedHardware::new(config.io.expansions.clone());
//!
//!     let mut daemon = Daemon::new(platform.clone());
//!     daemon.launch(Box::new(store), Box::new(hardware)).await?;
//!
//!     tokio::select! {
//!         _ = tokio::signal::ctrl_c() => {}
//!         _ = platform.wait_for_reboot() => {}
//!     }
//!
//!     daemon.save_io_state().await?;
//!     daemon.shutdown();
//!     daemon.join().await?;
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;

pub use launch_daemon::Daemon;
