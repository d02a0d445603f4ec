// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the IO gateway
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the gateway. The configuration is backed by a
//! YAML file and validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! The configuration is organized as a nested structure with sections:
//! - `device`: identity and administrator credentials
//! - `network`: interface addressing
//! - `rs485`: serial link shared with the Modbus RTU roles
//! - `modbus`: active Modbus role and its endpoint
//! - `mqtt`: broker settings
//! - `io`: channel polling and statistics persistence
//! - `platform`: board variant and watchdog
//!
//! Most of these fields are also published in the Modbus register map and
//! can be changed remotely through a configuration commit.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_iogateway::config::{Config, ModbusRole};
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(ModbusRole::TcpServer), // Modbus role
//!     Some("0.0.0.0".to_string()), // Modbus bind address
//!     Some(1502),                  // Modbus port
//!     None,                        // Device id
//!     None,                        // Serial port
//!     None,                        // Baud rate
//!     Some(50),                    // Poll interval
//! );
//!
//! println!("Modbus role: {}", config.modbus.role);
//! ```

pub mod device;
pub mod io;
pub mod modbus;
pub mod mqtt;
pub mod network;
pub mod platform;
pub mod rs485;
pub mod store;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use device::DeviceConfig;
pub use io::IoConfig;
pub use modbus::{ModbusConfig, ModbusRole};
pub use mqtt::MqttConfig;
pub use network::NetworkConfig;
pub use platform::{BoardType, PlatformConfig};
pub use rs485::{Rs485Config, Rs485Mode};
pub use store::{ConfigStore, FileConfigStore};
pub use utils::{is_valid_ip_address, output_config_schema};

/// Root configuration structure for the gateway.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, allowing for minimal configuration when custom
/// settings are not required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Identity and administrator credentials
    #[serde(default)]
    pub device: DeviceConfig,

    /// Network interface addressing
    #[serde(default)]
    pub network: NetworkConfig,

    /// RS-485 serial link
    #[serde(default)]
    pub rs485: Rs485Config,

    /// Modbus role and endpoint
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// MQTT broker
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Channel polling and statistics persistence
    #[serde(default)]
    pub io: IoConfig,

    /// Board variant and watchdog
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. An existing file is
    /// validated against the embedded JSON schema, deserialized, then checked
    /// with [`utils::validate_specific_rules`]. Any failure writes a
    /// `*.sample.yaml` file with default values next to the original.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only explicitly provided values override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `modbus_role` - Modbus role to activate
    /// * `modbus_address` - Bind address of the TCP server role
    /// * `modbus_port` - Port of the TCP roles
    /// * `device_id` - Device id, also the RTU server unit id
    /// * `serial_port` - Host serial device of the RS-485 link
    /// * `baudrate` - RS-485 line speed
    /// * `poll_interval_ms` - Channel poll interval
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        modbus_role: Option<ModbusRole>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        device_id: Option<u8>,
        serial_port: Option<String>,
        baudrate: Option<u32>,
        poll_interval_ms: Option<u64>,
    ) {
        if let Some(role) = modbus_role {
            debug!("Overriding modbus role from command line: {}", role);
            self.modbus.role = role;
        }

        if let Some(address) = modbus_address {
            debug!("Overriding modbus address from command line: {}", address);
            self.modbus.bind_address = address;
        }

        if let Some(port) = modbus_port {
            debug!("Overriding modbus port from command line: {}", port);
            self.modbus.port = port;
        }

        if let Some(id) = device_id {
            debug!("Overriding device id from command line: {}", id);
            self.device.set_id(u16::from(id));
        }

        if let Some(port) = serial_port {
            debug!("Overriding serial port from command line: {}", port);
            self.rs485.serial_port = port;
        }

        if let Some(baudrate) = baudrate {
            debug!("Overriding RS485 baudrate from command line: {}", baudrate);
            self.rs485.set_baudrate(baudrate);
        }

        if let Some(interval) = poll_interval_ms {
            debug!("Overriding poll interval from command line: {}", interval);
            self.io.poll_interval_ms = interval.max(1);
        }
    }
}
