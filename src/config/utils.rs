// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation, schema management and the field setter
//! helpers shared by the configuration sections.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::Config;
use crate::config::device::{MAX_DEVICE_ID, MAX_TIME_OFFSET};
use crate::config::rs485::MAX_BAUDRATE;
use crate::registers::layout::MAX_MODULES;
use crate::registers::MAX_STRING_LENGTH;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// ### Example
///
/// ```bash
/// ./rust_iogateway --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
///
/// ### Arguments
///
/// * `addr` - The address string to validate
///
/// ### Returns
///
/// `true` if the address is valid, `false` otherwise
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// ### Validation Rules
///
/// - **String capacity**: every string published in the register map fits a
///   48 character slot
/// - **Ranges**: device id, time offset, baud rate, ports, poll interval
/// - **Bind address**: the TCP server bind address must parse as an IP
///
/// A serial role on a board without RS-485 transceiver, or a TCP client
/// without a peer address, only triggers a warning: the role falls back to
/// `none` at startup.
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let bounded = [
        ("device.user", &config.device.user),
        ("device.password", &config.device.password),
        ("network.ssid", &config.network.ssid),
        ("network.password", &config.network.password),
        ("mqtt.user", &config.mqtt.user),
        ("mqtt.password", &config.mqtt.password),
        ("mqtt.base", &config.mqtt.base),
    ];
    for (name, value) in bounded {
        let length = value.chars().count();
        if length > MAX_STRING_LENGTH {
            anyhow::bail!(
                "{} is {} characters long, the limit is {}",
                name,
                length,
                MAX_STRING_LENGTH
            );
        }
    }

    if u16::from(config.device.id) > MAX_DEVICE_ID {
        anyhow::bail!("Invalid device id: {}", config.device.id);
    }

    if i32::from(config.device.time_offset).abs() > MAX_TIME_OFFSET {
        anyhow::bail!("Invalid time offset: {}", config.device.time_offset);
    }

    if config.rs485.baudrate == 0 || config.rs485.baudrate >= MAX_BAUDRATE {
        anyhow::bail!("Invalid RS485 baudrate: {}", config.rs485.baudrate);
    }

    if config.modbus.port == 0 {
        anyhow::bail!("Invalid modbus port: {}", config.modbus.port);
    }

    if config.mqtt.port == 0 {
        anyhow::bail!("Invalid MQTT port: {}", config.mqtt.port);
    }

    if config.io.poll_interval_ms == 0 {
        anyhow::bail!("The poll interval must be at least 1 ms");
    }

    if !is_valid_ip_address(&config.modbus.bind_address) {
        anyhow::bail!(
            "Invalid modbus bind address: {}",
            config.modbus.bind_address
        );
    }

    if config.modbus.role.is_serial() && !config.platform.board.has_rs485() {
        warn!(
            "Modbus role {} requires an RS485 capable board, the role will be disabled",
            config.modbus.role
        );
    }

    if config.modbus.role == super::ModbusRole::TcpClient && config.modbus.ip.is_unspecified() {
        warn!("Modbus TCP client has no peer address, the role will be disabled");
    }

    if config.io.expansions.len() >= MAX_MODULES {
        warn!(
            "{} expansions configured, only {} fit in the expansion stack",
            config.io.expansions.len(),
            MAX_MODULES - 1
        );
    }

    Ok(())
}

/// Store a string field if it fits a register slot and differs from the
/// current value.
///
/// ### Returns
///
/// `true` if the stored value changed
pub(crate) fn set_bounded_string(field: &mut String, value: &str, label: &str) -> bool {
    if value.chars().count() > MAX_STRING_LENGTH {
        warn!(
            "Refusing {}: longer than {} characters",
            label, MAX_STRING_LENGTH
        );
        return false;
    }
    if field == value {
        return false;
    }
    info!("Set {} to: {}", label, value);
    *field = value.to_string();
    true
}

/// Same as [`set_bounded_string`] without logging the value
pub(crate) fn set_secret(field: &mut String, value: &str, label: &str) -> bool {
    if value.chars().count() > MAX_STRING_LENGTH {
        warn!(
            "Refusing {}: longer than {} characters",
            label, MAX_STRING_LENGTH
        );
        return false;
    }
    if field == value {
        return false;
    }
    info!("Set {}", label);
    *field = value.to_string();
    true
}

pub(crate) fn set_ipv4(field: &mut Ipv4Addr, value: Ipv4Addr, label: &str) -> bool {
    if *field == value {
        return false;
    }
    info!("Set {} to: {}", label, value);
    *field = value;
    true
}

pub(crate) fn set_flag(field: &mut bool, value: bool, label: &str) -> bool {
    if *field == value {
        return false;
    }
    info!(
        "Set {} to: {}",
        label,
        if value { "Enable" } else { "Disable" }
    );
    *field = value;
    true
}

/// Interpret a register cell as a flag, only 0 and 1 are accepted
pub fn flag_from_register(value: u16, label: &str) -> Option<bool> {
    match value {
        0 => Some(false),
        1 => Some(true),
        other => {
            warn!("Refusing {} value {}: expected 0 or 1", label, other);
            None
        }
    }
}
