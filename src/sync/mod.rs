// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register synchronisation
//!
//! Keeps the register map of a server role consistent with the channel
//! model and the configuration, one pass per tick:
//!
//! 1. pointer table, firmware zone and module metadata on the first pass;
//! 2. configuration zones on the first pass and whenever the configuration
//!    changed, credentials written out empty;
//! 3. every input, then every output: pending commands from the peer are
//!    applied (coil changes, partial resets), the channel block is rewritten
//!    when the channel changed since the previous pass started, and the state
//!    is mirrored into the discrete input or coil;
//! 4. a pending configuration commit, see [`commit`].
//!
//! Client roles do not run passes. [`remote::RemoteGateway`] reads and
//! commands a remote gateway zone by zone instead.

pub mod commit;
pub mod remote;
pub mod zones;

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::build_info::FirmwareVersion;
use crate::config::{Config, ConfigStore};
use crate::io::{Channel, ChannelSource, ExpansionStack, IoError};
use crate::modbus::{RoleAdapter, TransportError};
use crate::platform::Platform;
use crate::registers::layout::channel;
use crate::registers::{CellBuffer, CodecError, Direction, RegisterKind, ZoneTable};

pub use commit::{CommitOutcome, CommitState, ConfigApplyProtocol, ValidationError};
pub use remote::{RemoteError, RemoteGateway};
pub use zones::ConfigImage;

/// Largest register count of a single read request
pub const MAX_READ_REGISTERS: u16 = 125;

/// Largest register count of a single write request
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Read `length` cells from `base`, split into protocol sized requests
pub async fn read_zone(
    adapter: &dyn RoleAdapter,
    kind: RegisterKind,
    base: u16,
    length: u16,
) -> Result<CellBuffer, TransportError> {
    let mut cells = Vec::with_capacity(length as usize);
    let mut offset = 0;
    while offset < length {
        let count = (length - offset).min(MAX_READ_REGISTERS);
        cells.extend(adapter.read_registers(kind, base + offset, count).await?);
        offset += count;
    }
    Ok(CellBuffer::from_cells(base, cells))
}

/// Write a cell run, split into protocol sized requests
///
/// `mirrored` publishes the cells in both register tables.
pub async fn write_zone(
    adapter: &dyn RoleAdapter,
    zone: &CellBuffer,
    mirrored: bool,
) -> Result<(), TransportError> {
    for (i, chunk) in zone.cells().chunks(MAX_WRITE_REGISTERS as usize).enumerate() {
        let start = zone.base() + (i * MAX_WRITE_REGISTERS as usize) as u16;
        if mirrored {
            adapter.write_mirrored(start, chunk).await?;
        } else {
            adapter
                .write_registers(RegisterKind::Holding, start, chunk)
                .await?;
        }
    }
    Ok(())
}

/// Failure while synchronising one channel
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// What a pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Identity and configuration zones written
    pub zones_pushed: usize,
    /// Module and channel blocks written
    pub blocks_pushed: usize,
    /// Outputs driven from a coil written by the peer
    pub outputs_driven: usize,
    /// Partial resets requested by the peer
    pub resets: usize,
    /// Failed steps, the pass went on with the next one
    pub errors: usize,
    pub commit: Option<CommitOutcome>,
}

/// Per-tick synchronisation of a server role
#[derive(Debug)]
pub struct RegisterSync {
    zones: ZoneTable,
    firmware: FirmwareVersion,
    /// Start of the previous pass, `None` before the first one
    last_sync: Option<u32>,
    pushed_config: Option<Config>,
    /// Coil values written by the previous pass, by uid
    mirrored_coils: HashMap<u16, bool>,
    commit: ConfigApplyProtocol,
}

impl Default for RegisterSync {
    fn default() -> Self {
        Self::new(ZoneTable::current(), FirmwareVersion::current())
    }
}

impl RegisterSync {
    pub fn new(zones: ZoneTable, firmware: FirmwareVersion) -> Self {
        Self {
            zones,
            firmware,
            last_sync: None,
            pushed_config: None,
            mirrored_coils: HashMap::new(),
            commit: ConfigApplyProtocol::new(zones),
        }
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub fn last_sync(&self) -> Option<u32> {
        self.last_sync
    }

    pub fn commit_state(&self) -> CommitState {
        self.commit.state()
    }

    /// Run one synchronisation pass at uptime `now`
    pub async fn tick(
        &mut self,
        adapter: &dyn RoleAdapter,
        io: &mut dyn ChannelSource,
        store: &mut dyn ConfigStore,
        platform: &dyn Platform,
        now: u32,
    ) -> TickReport {
        let mut report = TickReport::default();
        if !adapter.role().is_server() {
            debug!("No synchronisation pass in the {} role", adapter.role());
            return report;
        }

        let first_pass = self.last_sync.is_none();
        if first_pass {
            let stack = io.stack().clone();
            self.push_identity(adapter, &stack, &mut report).await;
        }
        if self.pushed_config.as_ref() != Some(store.config()) {
            let config = store.config().clone();
            self.push_config(adapter, &config, &mut report).await;
        }

        for direction in [Direction::Input, Direction::Output] {
            let channels: Vec<(usize, Channel)> = io
                .stack()
                .channels(direction)
                .map(|(module, ch)| (module, *ch))
                .collect();
            for (module, ch) in channels {
                if let Err(e) = self
                    .sync_channel(adapter, io, module, ch, first_pass, now, &mut report)
                    .await
                {
                    warn!("Module {} channel {} not synchronised: {}", module, ch.label(), e);
                    report.errors += 1;
                }
            }
        }

        if let Some(outcome) = self.commit.check(adapter, store, platform).await {
            if !matches!(outcome, CommitOutcome::Applied { .. }) {
                // Discard whatever the peer wrote into the configuration zones
                let config = store.config().clone();
                self.push_config(adapter, &config, &mut report).await;
            }
            report.commit = Some(outcome);
        }

        self.last_sync = Some(now);
        report
    }

    async fn push_identity(
        &mut self,
        adapter: &dyn RoleAdapter,
        stack: &ExpansionStack,
        report: &mut TickReport,
    ) {
        let mut blocks = vec![zones::pointer_table(&self.zones)];
        match zones::firmware_zone(&self.zones, self.firmware) {
            Ok(zone) => blocks.push(zone),
            Err(e) => warn!("Cannot encode the firmware zone: {}", e),
        }
        for module in stack.slots() {
            match zones::module_block(&self.zones, module) {
                Ok(block) => blocks.push(block),
                Err(e) => warn!("Cannot encode module {}: {}", module.index, e),
            }
        }

        for block in &blocks {
            match write_zone(adapter, block, true).await {
                Ok(()) => report.zones_pushed += 1,
                Err(e) => {
                    warn!("Cannot publish cells at {}: {}", block.base(), e);
                    report.errors += 1;
                }
            }
        }
        info!("Published firmware {} and {} modules", self.firmware, stack.count());
    }

    async fn push_config(
        &mut self,
        adapter: &dyn RoleAdapter,
        config: &Config,
        report: &mut TickReport,
    ) {
        let buffers = match ConfigImage::from_config(config)
            .without_secrets()
            .encode(&self.zones)
        {
            Ok(buffers) => buffers,
            Err(e) => {
                warn!("Cannot encode the configuration: {}", e);
                report.errors += 1;
                return;
            }
        };

        let mut complete = true;
        for zone in &buffers {
            match write_zone(adapter, zone, true).await {
                Ok(()) => report.zones_pushed += 1,
                Err(e) => {
                    warn!("Cannot publish the configuration zone at {}: {}", zone.base(), e);
                    report.errors += 1;
                    complete = false;
                }
            }
        }
        self.pushed_config = complete.then(|| config.clone());
    }

    #[allow(clippy::too_many_arguments)]
    async fn sync_channel(
        &mut self,
        adapter: &dyn RoleAdapter,
        io: &mut dyn ChannelSource,
        module: usize,
        ch: Channel,
        first_pass: bool,
        now: u32,
        report: &mut TickReport,
    ) -> Result<(), SyncError> {
        let direction = ch.direction;

        // Coil value the peer left, compared against when publishing
        let mut observed = None;
        if direction == Direction::Output {
            let coil = adapter.read_coil(ch.uid).await?;
            if let Some(&mirrored) = self.mirrored_coils.get(&ch.uid) {
                if coil != mirrored {
                    debug!("Coil {} written by the peer: {}", ch.uid, coil);
                    match io.drive_output(module, ch.index, coil, now) {
                        Ok(()) => report.outputs_driven += 1,
                        Err(e) => {
                            warn!("Cannot drive module {} output {}: {}", module, ch.index, e);
                            report.errors += 1;
                        }
                    }
                }
            }
            observed = Some(coil);
        }

        let block_base = self.zones.channel_block(direction, module, ch.index);
        let reset_cell = block_base + channel::PARTIAL_RESET;
        if adapter
            .take_register(RegisterKind::Holding, reset_cell)
            .await?
            != 0
        {
            io.reset_channel(module, direction, ch.index, now)?;
            report.resets += 1;
        }

        let current = io
            .stack()
            .channel(module, direction, ch.index)
            .copied()
            .unwrap_or(ch);

        let changed = self
            .last_sync
            .map_or(true, |last| current.updated_at >= last);
        if first_pass || changed {
            let block = zones::channel_block(&self.zones, module, &current)?;
            write_zone(adapter, &block, true).await?;
            report.blocks_pushed += 1;
        }

        match direction {
            Direction::Input => {
                adapter
                    .write_discrete_input(current.uid, current.state)
                    .await?
            }
            Direction::Output => {
                let expected = observed.unwrap_or(current.state);
                let mirrored = if adapter
                    .replace_coil(current.uid, expected, current.state)
                    .await?
                {
                    current.state
                } else {
                    // The peer wrote the coil during this pass, the next one
                    // sees it differ and drives the output
                    debug!("Coil {} changed by the peer during the pass", current.uid);
                    expected
                };
                self.mirrored_coils.insert(current.uid, mirrored);
            }
        }
        Ok(())
    }
}
