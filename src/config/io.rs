// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel polling and persistence configuration

use serde::{Deserialize, Serialize};

use crate::io::ModuleType;

/// Settings of the channel poll loop and of the statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Delay between two poll ticks in milliseconds
    pub poll_interval_ms: u64,

    /// File holding the persisted channel statistics
    pub state_file: String,

    /// Delay between two statistics snapshots in seconds
    pub persist_interval_s: u64,

    /// Plug-in modules attached to the simulated hardware, in slot order
    #[serde(default)]
    pub expansions: Vec<ModuleType>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            state_file: "io_state.json".to_string(),
            persist_interval_s: 60,
            expansions: Vec::new(),
        }
    }
}
