// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the Modbus TCP server
//!
//! These tests start a server on an ephemeral port, publish the register map
//! of a simulated board with a synchronisation pass, and talk to the server
//! with a plain Modbus client: pointer table, discrete inputs, coil commands
//! and out-of-range requests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use rust_iogateway::config::{BoardType, Config, FileConfigStore, ModbusRole, PlatformConfig};
use rust_iogateway::io::{IoController, SimulatedHardware};
use rust_iogateway::modbus::{serve_tcp, ClientAdapter, LocalRegisters, TCP_IDLE_TIMEOUT};
use rust_iogateway::platform::HostPlatform;
use rust_iogateway::registers::layout::{pointer, POINTER_TABLE, REGISTER_END};
use rust_iogateway::registers::{Direction, RegisterBank, ZoneTable};
use rust_iogateway::sync::{RegisterSync, RemoteGateway};

struct Gateway {
    addr: SocketAddr,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    local: LocalRegisters,
    io: IoController,
    hardware: SimulatedHardware,
    store: FileConfigStore,
    platform: Arc<HostPlatform>,
    sync: RegisterSync,
    now: u32,
    _dir: tempfile::TempDir,
}

impl Gateway {
    async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let bank = Arc::new(RegisterBank::new());
        let server = tokio::spawn(serve_tcp(listener, bank.clone(), TCP_IDLE_TIMEOUT));

        let dir = tempfile::tempdir()?;
        let hardware = SimulatedHardware::default();
        let mut gateway = Self {
            addr,
            server,
            local: LocalRegisters::new(ModbusRole::TcpServer, bank),
            io: IoController::new(BoardType::Rs485, Box::new(hardware.clone()), 50),
            hardware,
            store: FileConfigStore::new(dir.path().join("config.yaml"), Config::default()),
            platform: Arc::new(HostPlatform::new(&PlatformConfig::default())),
            sync: RegisterSync::default(),
            now: 0,
            _dir: dir,
        };
        gateway.tick().await;
        Ok(gateway)
    }

    async fn tick(&mut self) {
        self.now += 50;
        self.io.poll(self.now);
        self.sync
            .tick(
                &self.local,
                &mut self.io,
                &mut self.store,
                self.platform.as_ref(),
                self.now,
            )
            .await;
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[tokio::test]
async fn test_read_pointer_table() -> Result<()> {
    let gateway = Gateway::start().await?;
    let mut ctx = tcp::connect(gateway.addr).await?;

    let data = ctx
        .read_input_registers(POINTER_TABLE, pointer::LENGTH)
        .await??;
    assert_eq!(data.len(), usize::from(pointer::LENGTH));
    assert_eq!(ZoneTable::from_pointer_table(&data), Some(ZoneTable::current()));

    // Holding mirror of the published zones
    let holding = ctx
        .read_holding_registers(POINTER_TABLE, pointer::LENGTH)
        .await??;
    assert_eq!(holding, data);
    Ok(())
}

#[tokio::test]
async fn test_input_transition_is_published() -> Result<()> {
    let mut gateway = Gateway::start().await?;
    gateway.hardware.set_millivolts(0, 3, 2000);
    gateway.tick().await;
    gateway.hardware.set_millivolts(0, 3, 9000);
    gateway.tick().await;

    let mut ctx = tcp::connect(gateway.addr).await?;
    let states = ctx.read_discrete_inputs(0, 8).await??;
    assert_eq!(states, vec![false, false, false, true, false, false, false, false]);

    let platform = gateway.platform.clone();
    let client = ClientAdapter::tcp(gateway.addr, 1, platform);
    let mut remote = RemoteGateway::new(Arc::new(client));
    let channel = remote.channel(Direction::Input, 0, 3).await?;
    assert!(channel.state);
    assert_eq!(channel.voltage, 9000);
    assert_eq!(channel.pulses, 1);
    assert_eq!(channel.partial_pulses, 1);
    Ok(())
}

#[tokio::test]
async fn test_coil_write_drives_output() -> Result<()> {
    let mut gateway = Gateway::start().await?;
    let mut ctx = tcp::connect(gateway.addr).await?;

    ctx.write_single_coil(2, true).await??;
    gateway.tick().await;
    assert!(gateway.hardware.output(0, 2));

    // The published state follows the output
    let coils = ctx.read_coils(0, 4).await??;
    assert_eq!(coils, vec![false, false, true, false]);

    ctx.write_single_coil(2, false).await??;
    gateway.tick().await;
    assert!(!gateway.hardware.output(0, 2));
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_is_an_exception() -> Result<()> {
    let gateway = Gateway::start().await?;
    let mut ctx = tcp::connect(gateway.addr).await?;

    let response = ctx.read_input_registers(REGISTER_END, 1).await?;
    assert_eq!(response, Err(ExceptionCode::IllegalDataAddress));

    let response = ctx.read_holding_registers(POINTER_TABLE - 1, 2).await?;
    assert_eq!(response, Err(ExceptionCode::IllegalDataAddress));

    // The connection survives exceptions
    let data = ctx.read_input_registers(POINTER_TABLE, 1).await??;
    assert_eq!(data.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_clients() -> Result<()> {
    let gateway = Gateway::start().await?;
    let mut first = tcp::connect(gateway.addr).await?;
    let mut second = tcp::connect(gateway.addr).await?;

    first.write_single_register(POINTER_TABLE + 100, 7).await??;
    time::sleep(Duration::from_millis(10)).await;
    let seen = second.read_holding_registers(POINTER_TABLE + 100, 1).await??;
    assert_eq!(seen, vec![7]);
    Ok(())
}
