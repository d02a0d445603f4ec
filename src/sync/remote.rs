// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Remote gateway access for the client roles
//!
//! A client does not mirror the whole register map. It reads the pointer
//! table once to locate the zones of the peer, whatever its revision, and
//! then reads or commands single zones and channels on demand.

use std::sync::Arc;

use log::{debug, info};

use super::zones::{self, ConfigImage, ModuleInfo, CHANNEL_PUBLISHED, COMMIT_PASSWORD_CELLS};
use super::{read_zone, write_zone};
use crate::build_info::FirmwareVersion;
use crate::io::Channel;
use crate::modbus::{RoleAdapter, TransportError};
use crate::registers::layout::{channel, firmware, module, pointer, MAX_MODULES, POINTER_TABLE};
use crate::registers::{uid, CellBuffer, CodecError, Direction, RegisterKind, ZoneTable};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid register content: {0}")]
    Codec(#[from] CodecError),

    #[error("the peer published an invalid pointer table")]
    InvalidPointerTable,

    #[error("module {0} is outside the register map")]
    UnknownModule(usize),
}

/// A gateway reached through a client role adapter
pub struct RemoteGateway {
    adapter: Arc<dyn RoleAdapter>,
    zones: Option<ZoneTable>,
}

impl RemoteGateway {
    pub fn new(adapter: Arc<dyn RoleAdapter>) -> Self {
        Self {
            adapter,
            zones: None,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn RoleAdapter> {
        &self.adapter
    }

    /// Read the pointer table of the peer
    ///
    /// The result is cached, use [`RemoteGateway::forget`] after the peer
    /// was updated.
    pub async fn discover(&mut self) -> Result<ZoneTable, RemoteError> {
        if let Some(zones) = self.zones {
            return Ok(zones);
        }
        let cells = self
            .adapter
            .read_registers(RegisterKind::Input, POINTER_TABLE, pointer::LENGTH)
            .await?;
        let zones = ZoneTable::from_pointer_table(&cells).ok_or(RemoteError::InvalidPointerTable)?;
        if zones.channel_stride < channel::PARTIAL_RESET + 1 || zones.module_stride < module::LENGTH {
            return Err(RemoteError::InvalidPointerTable);
        }
        debug!("Peer zones: {:?}", zones);
        self.zones = Some(zones);
        Ok(zones)
    }

    pub fn forget(&mut self) {
        self.zones = None;
    }

    /// Firmware version and packed OTA version of the peer
    pub async fn firmware(&mut self) -> Result<(FirmwareVersion, u32), RemoteError> {
        let zones = self.discover().await?;
        let zone = read_zone(
            self.adapter.as_ref(),
            RegisterKind::Input,
            zones.firmware,
            firmware::LENGTH,
        )
        .await?;
        Ok(zones::decode_firmware(&zone)?)
    }

    /// Published configuration of the peer, credentials read back empty
    pub async fn config(&mut self) -> Result<ConfigImage, RemoteError> {
        let zones = self.discover().await?;
        let mut buffers = Vec::new();
        for (base, length) in zones::config_zone_spans(&zones) {
            buffers.push(read_zone(self.adapter.as_ref(), RegisterKind::Input, base, length).await?);
        }
        Ok(ConfigImage::decode(&buffers)?)
    }

    pub async fn module(&mut self, index: usize) -> Result<ModuleInfo, RemoteError> {
        if index >= MAX_MODULES {
            return Err(RemoteError::UnknownModule(index));
        }
        let zones = self.discover().await?;
        let block = read_zone(
            self.adapter.as_ref(),
            RegisterKind::Input,
            zones.module_block(index),
            module::LENGTH,
        )
        .await?;
        Ok(zones::decode_module(&block)?)
    }

    /// Channel block of the peer
    pub async fn channel(
        &mut self,
        direction: Direction,
        module: usize,
        index: usize,
    ) -> Result<Channel, RemoteError> {
        if module >= MAX_MODULES || index >= direction.slots() {
            return Err(RemoteError::UnknownModule(module));
        }
        let zones = self.discover().await?;
        let block = read_zone(
            self.adapter.as_ref(),
            RegisterKind::Input,
            zones.channel_block(direction, module, index),
            CHANNEL_PUBLISHED,
        )
        .await?;
        Ok(zones::decode_channel(direction, &block)?)
    }

    /// Live state of a channel, read from its coil or discrete input
    pub async fn state(&self, direction: Direction, module: usize, index: usize) -> Result<bool, RemoteError> {
        let uid = uid(module, index);
        let state = match direction {
            Direction::Input => self.adapter.read_discrete_input(uid).await?,
            Direction::Output => self.adapter.read_coil(uid).await?,
        };
        Ok(state)
    }

    /// Command an output of the peer
    pub async fn set_output(&self, module: usize, index: usize, on: bool) -> Result<(), RemoteError> {
        info!("Commanding peer module {} output {}: {}", module, index, on);
        Ok(self.adapter.write_coil(uid(module, index), on).await?)
    }

    /// Ask the peer to clear the partial counters of a channel
    pub async fn reset_channel(
        &mut self,
        direction: Direction,
        module: usize,
        index: usize,
    ) -> Result<(), RemoteError> {
        let zones = self.discover().await?;
        let cell = zones.channel_block(direction, module, index) + channel::PARTIAL_RESET;
        Ok(self
            .adapter
            .write_registers(RegisterKind::Holding, cell, &[1])
            .await?)
    }

    /// Submit a configuration and commit it with the device password
    ///
    /// Empty credentials in `image` keep the values stored on the peer.
    pub async fn commit_config(&mut self, image: &ConfigImage, password: &str) -> Result<(), RemoteError> {
        let zones = self.discover().await?;
        for zone in image.encode(&zones)? {
            write_zone(self.adapter.as_ref(), &zone, false).await?;
        }

        let mut slot = CellBuffer::new(zones.firmware + firmware::COMMIT_PASSWORD, COMMIT_PASSWORD_CELLS);
        slot.put_str(0, password)?;
        write_zone(self.adapter.as_ref(), &slot, false).await?;

        info!("Committing configuration on the peer");
        self.adapter
            .write_registers(RegisterKind::Holding, zones.firmware + firmware::COMMIT, &[1])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoardType, Config, ConfigStore, ModbusRole, PlatformConfig};
    use crate::io::{ExpansionStack, MockChannelSource, ModuleType};
    use crate::modbus::LocalRegisters;
    use crate::platform::HostPlatform;
    use crate::registers::RegisterBank;
    use crate::sync::{CommitOutcome, RegisterSync};

    struct MemoryStore {
        config: Config,
        persisted: usize,
    }

    impl ConfigStore for MemoryStore {
        fn config(&self) -> &Config {
            &self.config
        }

        fn config_mut(&mut self) -> &mut Config {
            &mut self.config
        }

        fn persist(&mut self) -> anyhow::Result<()> {
            self.persisted += 1;
            Ok(())
        }
    }

    /// A server pass over a shared bank, then a client view of the same bank
    async fn published() -> (Arc<RegisterBank>, RegisterSync, MemoryStore, MockChannelSource) {
        let bank = Arc::new(RegisterBank::new());
        let server = LocalRegisters::new(ModbusRole::TcpServer, bank.clone());
        let mut store = MemoryStore {
            config: Config::default(),
            persisted: 0,
        };
        let platform = HostPlatform::new(&PlatformConfig::default());
        let mut io = MockChannelSource::new();
        let mut stack = ExpansionStack::build(BoardType::Rs485, &[ModuleType::DigitalSolidState]);
        stack.channel_mut(1, Direction::Output, 2).unwrap().pulses = 7;
        io.expect_stack().return_const(stack);

        let mut sync = RegisterSync::default();
        sync.tick(&server, &mut io, &mut store, &platform, 0).await;
        (bank, sync, store, io)
    }

    fn client(bank: &Arc<RegisterBank>) -> RemoteGateway {
        RemoteGateway::new(Arc::new(LocalRegisters::new(ModbusRole::TcpClient, bank.clone())))
    }

    #[tokio::test]
    async fn test_pull_by_address() {
        let (bank, _, _, _) = published().await;
        let mut remote = client(&bank);

        assert_eq!(remote.discover().await, Ok(ZoneTable::current()));
        assert_eq!(remote.firmware().await.unwrap().0, FirmwareVersion::current());
        assert_eq!(remote.module(1).await.unwrap().type_code, ModuleType::DigitalSolidState.code());
        assert!(!remote.module(2).await.unwrap().exists);

        let ch = remote.channel(Direction::Output, 1, 2).await.unwrap();
        assert_eq!(ch.pulses, 7);
        assert_eq!(ch.uid, 102);

        let config = remote.config().await.unwrap();
        assert_eq!(config.user, "");
        assert_eq!(config.password, "");
    }

    #[tokio::test]
    async fn test_invalid_pointer_table() {
        let bank = Arc::new(RegisterBank::new());
        let mut remote = client(&bank);
        assert_eq!(remote.discover().await, Err(RemoteError::InvalidPointerTable));
        assert_eq!(remote.module(8).await, Err(RemoteError::UnknownModule(8)));
    }

    #[tokio::test]
    async fn test_commit_through_the_register_map() {
        let (bank, mut sync, mut store, mut io) = published().await;
        let server = LocalRegisters::new(ModbusRole::TcpServer, bank.clone());
        let platform = HostPlatform::new(&PlatformConfig::default());
        let mut remote = client(&bank);

        let mut image = remote.config().await.unwrap();
        image.mqtt_base = "plant-c".to_string();
        remote.commit_config(&image, "admin").await.unwrap();

        let report = sync.tick(&server, &mut io, &mut store, &platform, 50).await;
        assert_eq!(report.commit, Some(CommitOutcome::Applied { changed: 1 }));
        assert_eq!(store.config.mqtt.base, "plant-c");
        assert_eq!(store.config.device.password, "admin");
        assert_eq!(store.persisted, 1);
        assert!(platform.is_reboot_requested());
    }
}
