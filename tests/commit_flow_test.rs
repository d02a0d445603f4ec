// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration commit over Modbus TCP, persisted to a YAML file

use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;
use tokio::net::TcpListener;

use rust_iogateway::config::{BoardType, ConfigStore, FileConfigStore, ModbusRole, PlatformConfig};
use rust_iogateway::io::{IoController, SimulatedHardware};
use rust_iogateway::modbus::{serve_tcp, ClientAdapter, LocalRegisters, TCP_IDLE_TIMEOUT};
use rust_iogateway::platform::HostPlatform;
use rust_iogateway::registers::{RegisterBank, RegisterKind, ZoneTable};
use rust_iogateway::sync::zones::config_zone_spans;
use rust_iogateway::sync::{
    read_zone, CommitOutcome, ConfigImage, RegisterSync, RemoteGateway, ValidationError,
};

#[tokio::test]
async fn test_commit_is_persisted_and_reboots() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("config.yaml");
    let mut store = FileConfigStore::open(&path)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let bank = Arc::new(RegisterBank::new());
    let server = tokio::spawn(serve_tcp(listener, bank.clone(), TCP_IDLE_TIMEOUT));

    let platform = Arc::new(HostPlatform::new(&PlatformConfig::default()));
    let local = LocalRegisters::new(ModbusRole::TcpServer, bank);
    let mut io = IoController::new(BoardType::Rs485, Box::new(SimulatedHardware::default()), 50);
    let mut sync = RegisterSync::default();
    sync.tick(&local, &mut io, &mut store, platform.as_ref(), 0).await;

    let client_platform = Arc::new(HostPlatform::new(&PlatformConfig::default()));
    let mut remote = RemoteGateway::new(Arc::new(ClientAdapter::tcp(addr, 1, client_platform)));

    // A wrong password changes nothing
    let mut image = remote.config().await?;
    image.mqtt_base = "plant-b".to_string();
    image.modbus_port = 1502;
    remote.commit_config(&image, "not-the-password").await?;
    let report = sync.tick(&local, &mut io, &mut store, platform.as_ref(), 50).await;
    assert_eq!(
        report.commit,
        Some(CommitOutcome::Rejected(ValidationError::PasswordMismatch))
    );
    assert_eq!(store.config().mqtt.base, "optalinker");
    assert!(!platform.is_reboot_requested());

    // The rejected values were wiped from the holding table
    let mut holding = Vec::new();
    for (base, length) in config_zone_spans(&ZoneTable::current()) {
        holding.push(read_zone(&local, RegisterKind::Holding, base, length).await?);
    }
    let pending = ConfigImage::decode(&holding)?;
    assert_eq!(pending.mqtt_base, "optalinker");
    assert_eq!(pending.modbus_port, 502);

    remote.commit_config(&image, "admin").await?;
    let report = sync.tick(&local, &mut io, &mut store, platform.as_ref(), 100).await;
    assert_eq!(report.commit, Some(CommitOutcome::Applied { changed: 2 }));
    assert!(platform.is_reboot_requested());

    let reloaded = FileConfigStore::open(&path)?;
    assert_eq!(reloaded.config().mqtt.base, "plant-b");
    assert_eq!(reloaded.config().modbus.port, 1502);
    assert_eq!(reloaded.config().device.password, "admin");
    assert_eq!(reloaded.config().modbus.role, ModbusRole::None);

    // Further requests wait for the reboot
    remote.commit_config(&image, "admin").await?;
    let report = sync.tick(&local, &mut io, &mut store, platform.as_ref(), 150).await;
    assert_eq!(report.commit, None);

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_fields_are_refused_individually() -> Result<()> {
    let dir = tempdir()?;
    let mut store = FileConfigStore::open(dir.path().join("config.yaml"))?;

    let bank = Arc::new(RegisterBank::new());
    let platform = HostPlatform::new(&PlatformConfig::default());
    let local = LocalRegisters::new(ModbusRole::TcpServer, bank.clone());
    let mut io = IoController::new(BoardType::Rs485, Box::new(SimulatedHardware::default()), 50);
    let mut sync = RegisterSync::default();
    sync.tick(&local, &mut io, &mut store, &platform, 0).await;

    let mut remote = RemoteGateway::new(Arc::new(LocalRegisters::new(ModbusRole::TcpClient, bank)));
    let mut image = remote.config().await?;
    image.device_id = 300;
    image.modbus_role = 9;
    image.time_offset = -5;
    remote.commit_config(&image, "admin").await?;

    let report = sync.tick(&local, &mut io, &mut store, &platform, 50).await;
    assert_eq!(report.commit, Some(CommitOutcome::Applied { changed: 1 }));
    assert_eq!(store.config().device.id, 0);
    assert_eq!(store.config().modbus.role, ModbusRole::None);
    assert_eq!(store.config().device.time_offset, -5);
    Ok(())
}
