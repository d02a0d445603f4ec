// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use rust_iogateway::config::PlatformConfig;
use rust_iogateway::modbus::{ClientAdapter, RoleAdapter};
use rust_iogateway::platform::{HostPlatform, Platform};
use rust_iogateway::registers::layout::MAX_MODULES;
use rust_iogateway::registers::Direction;
use rust_iogateway::sync::RemoteGateway;

/// Modbus client reading the register map of a remote IO gateway
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Gateway address
    #[clap(long, default_value = "127.0.0.1")]
    address: IpAddr,

    /// Gateway port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Unit id of the gateway
    #[clap(long, default_value = "1")]
    unit: u8,

    /// Reach the gateway on this serial port instead of TCP
    #[clap(long)]
    serial: Option<String>,

    /// Serial baud rate
    #[clap(long, default_value = "115200")]
    baudrate: u32,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the firmware, configuration, modules and channels
    Show,

    /// Switch an output on or off
    SetOutput {
        module: usize,
        index: usize,
        #[clap(action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Clear the partial counters of a channel
    Reset {
        module: usize,
        index: usize,
        /// Reset an output instead of an input
        #[clap(long)]
        output: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let platform: Arc<dyn Platform> = Arc::new(HostPlatform::new(&PlatformConfig::default()));
    let adapter: Arc<dyn RoleAdapter> = match &args.serial {
        Some(port) => {
            println!("Connecting to unit {} on {}", args.unit, port);
            Arc::new(
                ClientAdapter::open_rtu(port, args.baudrate, args.unit, platform)
                    .with_context(|| format!("Cannot open {}", port))?,
            )
        }
        None => {
            let addr = SocketAddr::new(args.address, args.port);
            println!("Connecting to Modbus server at {}", addr);
            Arc::new(ClientAdapter::tcp(addr, args.unit, platform))
        }
    };
    let mut remote = RemoteGateway::new(adapter);

    match args.command.unwrap_or(Command::Show) {
        Command::Show => show(&mut remote).await?,
        Command::SetOutput { module, index, on } => {
            remote.set_output(module, index, on).await?;
            let state = remote.state(Direction::Output, module, index).await?;
            println!("Output {} of module {} is now {}", index, module, on_off(state));
        }
        Command::Reset {
            module,
            index,
            output,
        } => {
            let direction = if output {
                Direction::Output
            } else {
                Direction::Input
            };
            remote.reset_channel(direction, module, index).await?;
            println!("Reset requested for {:?} {} of module {}", direction, index, module);
        }
    }

    Ok(())
}

async fn show(remote: &mut RemoteGateway) -> Result<()> {
    let zones = remote.discover().await.context("Cannot read the pointer table")?;
    println!("Zones: {:?}", zones);

    let (version, ota) = remote.firmware().await?;
    println!("Firmware {} (ota {})", version, ota);

    let config = remote.config().await?;
    println!("Device id {}, time offset {} min", config.device_id, config.time_offset);
    println!(
        "Network: ip {}, gateway {}, subnet {}, dns {}",
        config.ip, config.gateway, config.subnet, config.dns
    );
    println!(
        "Modbus role {}, peer {}:{}",
        config.modbus_role, config.modbus_ip, config.modbus_port
    );
    println!(
        "MQTT {}:{} every {} s, base {:?}",
        config.mqtt_ip, config.mqtt_port, config.mqtt_interval, config.mqtt_base
    );

    for index in 0..MAX_MODULES {
        let module = remote.module(index).await?;
        if !module.exists {
            continue;
        }
        println!("Module {}: {} (type {})", index, module.name, module.type_code);

        for direction in [Direction::Input, Direction::Output] {
            for ch in 0..direction.slots() {
                let channel = remote.channel(direction, index, ch).await?;
                if !channel.exists {
                    continue;
                }
                println!(
                    "  {:>5} {:?}: {} {} mV, pulses {} ({} partial), high {} ms ({} partial)",
                    channel.uid,
                    channel.kind,
                    on_off(channel.state),
                    channel.voltage,
                    channel.pulses,
                    channel.partial_pulses,
                    channel.high_ms,
                    channel.partial_high_ms
                );
            }
        }
    }
    Ok(())
}

fn on_off(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}
