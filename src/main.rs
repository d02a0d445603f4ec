// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the IO gateway daemon
use anyhow::Result;
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

use rust_iogateway::build_info;
use rust_iogateway::config::{self, Config, ConfigStore, FileConfigStore, ModbusRole};
use rust_iogateway::daemon::Daemon;
use rust_iogateway::io::SimulatedHardware;
use rust_iogateway::platform::HostPlatform;

/// Modular IO gateway publishing its channels over Modbus
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Validate a configuration file and exit
    #[arg(long, value_name = "PATH")]
    validate_config: Option<PathBuf>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Modbus role (none, rtu-server, tcp-server, rtu-client, tcp-client)
    #[arg(long)]
    modbus_type: Option<ModbusRole>,

    /// Bind address of the Modbus TCP server
    #[arg(long)]
    modbus_address: Option<String>,

    /// Port of the Modbus TCP roles
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Device id, also the Modbus RTU unit id
    #[arg(long)]
    device_id: Option<u8>,

    /// Serial device of the RS-485 link
    #[arg(long)]
    serial_port: Option<String>,

    /// RS-485 baud rate
    #[arg(long)]
    baudrate: Option<u32>,

    /// Channel poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    poll_interval: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Disable logging
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Off
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    fn apply_to(&self, config: &mut Config) {
        config.apply_args(
            self.modbus_type,
            self.modbus_address.clone(),
            self.modbus_port,
            self.device_id,
            self.serial_port.clone(),
            self.baudrate,
            self.poll_interval,
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(args.log_level())
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(path) = &args.validate_config {
        Config::from_file(path)?;
        println!("Configuration file {} is valid", path.display());
        return Ok(());
    }

    info!(
        "Starting IO gateway {}",
        build_info::FirmwareVersion::current()
    );

    // Each iteration is one boot, a committed configuration restarts here
    loop {
        let mut store = FileConfigStore::open(&args.config)?;
        args.apply_to(store.config_mut());
        let config = store.config().clone();

        let platform = Arc::new(HostPlatform::new(&config.platform));
        let hardware = SimulatedHardware::new(config.io.expansions.clone());

        let mut daemon = Daemon::new(platform.clone());
        daemon.launch(Box::new(store), Box::new(hardware)).await?;
        info!("Gateway running with Modbus role {}", daemon.role());

        let reboot = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received");
                false
            }
            _ = platform.wait_for_reboot() => true,
        };

        if let Err(e) = daemon.save_io_state().await {
            error!("Failed to save IO statistics: {:#}", e);
        }
        daemon.shutdown();
        daemon.join().await?;

        if !reboot {
            break;
        }
        info!("Rebooting");
    }

    info!("IO gateway stopped");
    Ok(())
}
