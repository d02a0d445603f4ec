// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration commit
//!
//! A peer changes the configuration by writing the configuration zones of
//! the holding table, the device password into the commit password slot of
//! the firmware zone, and finally 1 into the commit cell. The next pass
//! picks the request up:
//!
//! 1. the commit cell and the password slot are cleared;
//! 2. the password is compared with the device password;
//! 3. on a match every zone is decoded, applied field by field, persisted,
//!    and a reboot is requested.
//!
//! A rejected or failed commit leaves the configuration as it was. After a
//! successful commit the protocol stays in [`CommitState::Committing`] and
//! ignores further requests until the reboot.

use log::{error, info, warn};

use super::read_zone;
use super::zones::{config_zone_spans, ConfigImage, COMMIT_PASSWORD_CELLS};
use crate::config::ConfigStore;
use crate::modbus::{RoleAdapter, TransportError};
use crate::platform::Platform;
use crate::registers::layout::firmware;
use crate::registers::{CodecError, RegisterKind, ZoneTable};

/// Reasons for refusing a commit
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("commit password does not match the device password")]
    PasswordMismatch,

    #[error("malformed commit: {0}")]
    Malformed(#[from] CodecError),

    #[error("commit could not be read: {0}")]
    Unreadable(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitState {
    #[default]
    Idle,
    Committing,
}

/// Result of a handled commit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Configuration applied and persisted, reboot requested
    Applied { changed: usize },
    /// Nothing changed
    Rejected(ValidationError),
    /// Persisting failed, the previous configuration was restored
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ConfigApplyProtocol {
    zones: ZoneTable,
    state: CommitState,
}

impl ConfigApplyProtocol {
    pub fn new(zones: ZoneTable) -> Self {
        Self {
            zones,
            state: CommitState::Idle,
        }
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    fn commit_cell(&self) -> u16 {
        self.zones.firmware + firmware::COMMIT
    }

    fn password_slot(&self) -> u16 {
        self.zones.firmware + firmware::COMMIT_PASSWORD
    }

    /// Handle a pending commit request
    ///
    /// ### Returns
    ///
    /// `None` when no commit was requested
    pub async fn check(
        &mut self,
        adapter: &dyn RoleAdapter,
        store: &mut dyn ConfigStore,
        platform: &dyn Platform,
    ) -> Option<CommitOutcome> {
        if self.state == CommitState::Committing {
            return None;
        }

        let requested = match adapter
            .read_registers(RegisterKind::Holding, self.commit_cell(), 1)
            .await
        {
            Ok(cells) => cells.first().copied().unwrap_or(0) != 0,
            Err(e) => {
                error!("Cannot read the commit cell: {}", e);
                return None;
            }
        };
        if !requested {
            return None;
        }

        info!("Configuration commit requested");
        let outcome = match self.commit(adapter, store, platform).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Configuration commit rejected: {}", e);
                CommitOutcome::Rejected(e)
            }
        };
        Some(outcome)
    }

    async fn commit(
        &mut self,
        adapter: &dyn RoleAdapter,
        store: &mut dyn ConfigStore,
        platform: &dyn Platform,
    ) -> Result<CommitOutcome, ValidationError> {
        let submitted = read_zone(
            adapter,
            RegisterKind::Holding,
            self.password_slot(),
            COMMIT_PASSWORD_CELLS,
        )
        .await?;
        self.clear_request(adapter).await?;

        let password = submitted.str_at(0)?;
        if password != store.config().device.password {
            return Err(ValidationError::PasswordMismatch);
        }

        let mut buffers = Vec::new();
        for (base, length) in config_zone_spans(&self.zones) {
            buffers.push(read_zone(adapter, RegisterKind::Holding, base, length).await?);
        }
        let image = ConfigImage::decode(&buffers)?;

        let previous = store.config().clone();
        let changed = image.apply(store.config_mut());
        if let Err(e) = store.persist() {
            error!("Failed to persist the committed configuration: {:#}", e);
            *store.config_mut() = previous;
            return Ok(CommitOutcome::Failed(e.to_string()));
        }

        info!("Configuration committed ({} fields changed), rebooting", changed);
        self.state = CommitState::Committing;
        platform.reboot();
        Ok(CommitOutcome::Applied { changed })
    }

    async fn clear_request(&self, adapter: &dyn RoleAdapter) -> Result<(), TransportError> {
        adapter
            .write_registers(RegisterKind::Holding, self.commit_cell(), &[0])
            .await?;
        let blank = [0u16; COMMIT_PASSWORD_CELLS as usize];
        adapter
            .write_registers(RegisterKind::Holding, self.password_slot(), &blank)
            .await
    }
}
