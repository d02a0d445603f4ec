// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use std::fs;
use std::net::Ipv4Addr;
use std::sync::Once;
use tempfile::tempdir;

use rust_iogateway::config::{utils, BoardType, Config, ModbusRole};
use rust_iogateway::io::ModuleType;

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_config_load_and_save() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = Config::default();
    config.device.set_id(12);
    config.modbus.role = ModbusRole::TcpClient;
    config.modbus.ip = Ipv4Addr::new(192, 168, 1, 40);
    config.modbus.peer_id = 3;
    config.mqtt.set_base("plant-a");
    config.io.expansions = vec![ModuleType::DigitalRelay, ModuleType::Analog];
    config.platform.board = BoardType::Lite;
    config.save_to_file(&config_path)?;

    let loaded = Config::from_file(&config_path)?;
    assert_eq!(loaded, config);

    // A missing file is created with defaults
    let missing = temp_dir.path().join("missing.yaml");
    let default_config = Config::from_file(&missing)?;
    assert!(missing.exists());
    assert_eq!(default_config, Config::default());
    Ok(())
}

#[test]
fn test_partial_file_uses_section_defaults() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    let mut only_io = Config::default();
    only_io.io.poll_interval_ms = 20;
    let yaml = format!("io:\n{}", indent(&serde_yml::to_string(&only_io.io)?));
    fs::write(&config_path, yaml)?;

    let loaded = Config::from_file(&config_path)?;
    assert_eq!(loaded.io.poll_interval_ms, 20);
    assert_eq!(loaded.modbus, Config::default().modbus);
    Ok(())
}

fn indent(text: &str) -> String {
    text.lines().map(|l| format!("  {}\n", l)).collect()
}

#[test]
fn test_schema_violation_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = Config::default();
    config.modbus.port = 0;
    config.save_to_file(&config_path)?;

    assert!(Config::from_file(&config_path).is_err());
    let sample_path = config_path.with_extension("sample.yaml");
    assert!(sample_path.exists(), "Sample config file was not created");
    assert_eq!(Config::from_file(&sample_path)?, Config::default());
    Ok(())
}

#[test]
fn test_invalid_yaml_structure_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        "modbus:\n  role: tcp-server\n  port: \"not-a-port\"\n",
    )?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}

#[test]
fn test_specific_rules() {
    setup();
    let mut config = Config::default();
    assert!(utils::validate_specific_rules(&config).is_ok());

    config.device.password = "x".repeat(49);
    assert!(utils::validate_specific_rules(&config).is_err());

    let mut config = Config::default();
    config.modbus.bind_address = "not-an-address".to_string();
    assert!(utils::validate_specific_rules(&config).is_err());

    // Role conflicts only warn, the role is disabled at startup
    let mut config = Config::default();
    config.modbus.role = ModbusRole::RtuServer;
    config.platform.board = BoardType::Lite;
    assert!(utils::validate_specific_rules(&config).is_ok());
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();
    config.apply_args(
        Some(ModbusRole::TcpServer),
        Some("127.0.0.1".to_string()),
        Some(1502),
        Some(7),
        Some("/dev/ttyUSB1".to_string()),
        Some(19200),
        Some(0),
    );

    assert_eq!(config.modbus.role, ModbusRole::TcpServer);
    assert_eq!(config.modbus.bind_address, "127.0.0.1");
    assert_eq!(config.modbus.port, 1502);
    assert_eq!(config.device.id, 7);
    assert_eq!(config.rs485.serial_port, "/dev/ttyUSB1");
    assert_eq!(config.rs485.baudrate, 19200);
    assert_eq!(config.io.poll_interval_ms, 1);

    // Unset overrides keep the file values
    let before = config.clone();
    config.apply_args(None, None, None, None, None, None, None);
    assert_eq!(config, before);
}
