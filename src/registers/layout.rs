// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register address layout
//!
//! The gateway publishes a single flat namespace of 16-bit cells starting at
//! [`POINTER_TABLE`]. The namespace is split into zones:
//!
//! | Zone | Base | Length |
//! |------|------|--------|
//! | Pointer table | 10000 | 20 |
//! | Firmware | 10020 | 60 |
//! | Device | 10080 | 110 |
//! | Network | 10190 | 120 |
//! | RS-485 | 10310 | 10 |
//! | Modbus | 10320 | 10 |
//! | MQTT | 10330 | 160 |
//! | Module metadata | 10490 | 8 × 55 |
//! | Inputs | 10930 | 8 × 16 × 20 |
//! | Outputs | 13490 | 8 × 8 × 20 |
//!
//! Only the pointer table is frozen. Every other base is published in the
//! pointer table so that a peer can locate the zones at runtime, see
//! [`ZoneTable::from_pointer_table`].
//!
//! Coils (outputs) and discrete inputs (inputs) are not part of the flat
//! namespace: they are addressed directly by channel uid.

/// Maximum number of modules, main board included
pub const MAX_MODULES: usize = 8;

/// Maximum number of inputs on a module
pub const MAX_INPUTS: usize = 16;

/// Maximum number of outputs on a module
pub const MAX_OUTPUTS: usize = 8;

/// Module number multiplier used to build channel uids
pub const UID_MODULE_FACTOR: u16 = 100;

/// Number of coils and discrete inputs exposed, addressed by uid
pub const BIT_COUNT: u16 = MAX_MODULES as u16 * UID_MODULE_FACTOR;

/// Base of the pointer table. Must never change.
pub const POINTER_TABLE: u16 = 10000;

/// Cells reserved for one module metadata block
pub const MODULE_STRIDE: u16 = 55;

/// Cells reserved for one channel register block
pub const CHANNEL_STRIDE: u16 = 20;

pub const FIRMWARE_BASE: u16 = 10020;
pub const DEVICE_BASE: u16 = 10080;
pub const NETWORK_BASE: u16 = 10190;
pub const RS485_BASE: u16 = 10310;
pub const MODBUS_BASE: u16 = 10320;
pub const MQTT_BASE: u16 = 10330;
pub const MODULE_BASE: u16 = 10490;
pub const INPUT_BASE: u16 = MODULE_BASE + MAX_MODULES as u16 * MODULE_STRIDE;
pub const OUTPUT_BASE: u16 =
    INPUT_BASE + (MAX_MODULES * MAX_INPUTS) as u16 * CHANNEL_STRIDE;

/// First address past the register map
pub const REGISTER_END: u16 = OUTPUT_BASE + (MAX_MODULES * MAX_OUTPUTS) as u16 * CHANNEL_STRIDE;

/// Total number of cells in the register map
pub const REGISTER_COUNT: u16 = REGISTER_END - POINTER_TABLE;

/// Pointer table offsets
pub mod pointer {
    pub const MODULE_STRIDE: u16 = 0;
    pub const CHANNEL_STRIDE: u16 = 1;
    pub const FIRMWARE: u16 = 2;
    pub const MODULE: u16 = 3;
    pub const INPUT: u16 = 4;
    pub const OUTPUT: u16 = 5;
    pub const DEVICE: u16 = 6;
    pub const NETWORK: u16 = 7;
    pub const RS485: u16 = 8;
    pub const MODBUS: u16 = 9;
    pub const MQTT: u16 = 10;

    /// Number of cells used in the pointer table
    pub const LENGTH: u16 = 11;
}

/// Firmware zone offsets
pub mod firmware {
    pub const MAJOR: u16 = 0;
    pub const MINOR: u16 = 1;
    pub const REVISION: u16 = 2;
    /// Set to 1 by a peer to commit the submitted configuration
    pub const COMMIT: u16 = 3;
    /// Device password submitted with a commit (T4)
    pub const COMMIT_PASSWORD: u16 = 4;
    /// Packed firmware version (T2)
    pub const OTA_VERSION: u16 = 54;
    pub const LENGTH: u16 = 56;
}

/// Device zone offsets
pub mod device {
    pub const ID: u16 = 0;
    /// Time offset in hours (T3)
    pub const TIME_OFFSET: u16 = 1;
    pub const USER: u16 = 3;
    pub const PASSWORD: u16 = 53;
    pub const LENGTH: u16 = 103;
}

/// Network zone offsets
pub mod network {
    pub const IP: u16 = 0;
    pub const GATEWAY: u16 = 4;
    pub const SUBNET: u16 = 8;
    pub const DNS: u16 = 12;
    pub const DHCP: u16 = 16;
    pub const WIFI: u16 = 17;
    pub const SSID: u16 = 18;
    pub const PASSWORD: u16 = 68;
    pub const LENGTH: u16 = 118;
}

/// RS-485 zone offsets
pub mod rs485 {
    pub const MODE: u16 = 0;
    /// Baud rate (T2)
    pub const BAUDRATE: u16 = 1;
    pub const TO_MQTT: u16 = 3;
    pub const LENGTH: u16 = 4;
}

/// Modbus zone offsets
pub mod modbus {
    pub const ROLE: u16 = 0;
    pub const IP: u16 = 1;
    pub const PORT: u16 = 5;
    pub const LENGTH: u16 = 6;
}

/// MQTT zone offsets
pub mod mqtt {
    pub const IP: u16 = 0;
    pub const PORT: u16 = 4;
    /// Publication interval (T2)
    pub const INTERVAL: u16 = 5;
    pub const USER: u16 = 7;
    pub const PASSWORD: u16 = 57;
    pub const BASE: u16 = 107;
    pub const LENGTH: u16 = 157;
}

/// Module metadata block offsets
pub mod module {
    pub const EXISTS: u16 = 0;
    pub const INDEX: u16 = 1;
    pub const TYPE: u16 = 2;
    pub const NAME: u16 = 3;
    pub const LENGTH: u16 = 53;
}

/// Channel register block offsets
///
/// Offsets 0 to 5 are T1, 6 to 17 are T2 pairs and 18 is the partial reset
/// command, only meaningful in the holding mirror.
pub mod channel {
    pub const EXISTS: u16 = 0;
    pub const UID: u16 = 1;
    pub const INDEX: u16 = 2;
    pub const KIND: u16 = 3;
    pub const STATE: u16 = 4;
    pub const VOLTAGE: u16 = 5;
    pub const UPDATED_AT: u16 = 6;
    pub const RESET_AT: u16 = 8;
    pub const PULSES: u16 = 10;
    pub const PARTIAL_PULSES: u16 = 12;
    pub const HIGH: u16 = 14;
    pub const PARTIAL_HIGH: u16 = 16;
    pub const PARTIAL_RESET: u16 = 18;
    pub const LENGTH: u16 = 19;
}

/// Channel direction as seen by the register map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Number of channel slots a module reserves for this direction
    pub fn slots(self) -> usize {
        match self {
            Direction::Input => MAX_INPUTS,
            Direction::Output => MAX_OUTPUTS,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "I"),
            Direction::Output => write!(f, "O"),
        }
    }
}

/// Compute the uid of a channel
///
/// `uid = module * 100 + index`, which stays unique for up to eight modules
/// of sixteen channels and doubles as the coil/discrete input address.
pub fn uid(module: usize, index: usize) -> u16 {
    module as u16 * UID_MODULE_FACTOR + index as u16
}

/// Zone bases as published in the pointer table
///
/// The gateway always serves [`ZoneTable::current`]. A client talking to a
/// gateway of another revision reads the pointer table first and builds the
/// table with [`ZoneTable::from_pointer_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTable {
    pub module_stride: u16,
    pub channel_stride: u16,
    pub firmware: u16,
    pub module: u16,
    pub input: u16,
    pub output: u16,
    pub device: u16,
    pub network: u16,
    pub rs485: u16,
    pub modbus: u16,
    pub mqtt: u16,
}

impl Default for ZoneTable {
    fn default() -> Self {
        Self::current()
    }
}

impl ZoneTable {
    /// The layout served by this firmware revision
    pub const fn current() -> Self {
        Self {
            module_stride: MODULE_STRIDE,
            channel_stride: CHANNEL_STRIDE,
            firmware: FIRMWARE_BASE,
            module: MODULE_BASE,
            input: INPUT_BASE,
            output: OUTPUT_BASE,
            device: DEVICE_BASE,
            network: NETWORK_BASE,
            rs485: RS485_BASE,
            modbus: MODBUS_BASE,
            mqtt: MQTT_BASE,
        }
    }

    /// Build a table from the cells of a pointer table read at
    /// [`POINTER_TABLE`]
    ///
    /// Returns `None` when fewer than [`pointer::LENGTH`] cells are given.
    pub fn from_pointer_table(cells: &[u16]) -> Option<Self> {
        if cells.len() < pointer::LENGTH as usize {
            return None;
        }
        Some(Self {
            module_stride: cells[pointer::MODULE_STRIDE as usize],
            channel_stride: cells[pointer::CHANNEL_STRIDE as usize],
            firmware: cells[pointer::FIRMWARE as usize],
            module: cells[pointer::MODULE as usize],
            input: cells[pointer::INPUT as usize],
            output: cells[pointer::OUTPUT as usize],
            device: cells[pointer::DEVICE as usize],
            network: cells[pointer::NETWORK as usize],
            rs485: cells[pointer::RS485 as usize],
            modbus: cells[pointer::MODBUS as usize],
            mqtt: cells[pointer::MQTT as usize],
        })
    }

    /// Encode the table as pointer table cells
    pub fn to_pointer_table(&self) -> Vec<u16> {
        let mut cells = vec![0; pointer::LENGTH as usize];
        cells[pointer::MODULE_STRIDE as usize] = self.module_stride;
        cells[pointer::CHANNEL_STRIDE as usize] = self.channel_stride;
        cells[pointer::FIRMWARE as usize] = self.firmware;
        cells[pointer::MODULE as usize] = self.module;
        cells[pointer::INPUT as usize] = self.input;
        cells[pointer::OUTPUT as usize] = self.output;
        cells[pointer::DEVICE as usize] = self.device;
        cells[pointer::NETWORK as usize] = self.network;
        cells[pointer::RS485 as usize] = self.rs485;
        cells[pointer::MODBUS as usize] = self.modbus;
        cells[pointer::MQTT as usize] = self.mqtt;
        cells
    }

    /// Address of a module metadata block
    pub fn module_block(&self, module: usize) -> u16 {
        self.module + module as u16 * self.module_stride
    }

    /// Address of a channel register block
    pub fn channel_block(&self, direction: Direction, module: usize, index: usize) -> u16 {
        let (base, slots) = match direction {
            Direction::Input => (self.input, MAX_INPUTS),
            Direction::Output => (self.output, MAX_OUTPUTS),
        };
        base + ((module * slots + index) as u16) * self.channel_stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pointer_table_is_frozen() {
        assert_eq!(POINTER_TABLE, 10000);
        assert_eq!(pointer::FIRMWARE, 2);
        assert_eq!(pointer::MQTT, 10);
    }

    #[test]
    fn test_zones_do_not_overlap() {
        assert!(POINTER_TABLE + pointer::LENGTH <= FIRMWARE_BASE);
        assert!(FIRMWARE_BASE + firmware::LENGTH <= DEVICE_BASE);
        assert!(DEVICE_BASE + device::LENGTH <= NETWORK_BASE);
        assert!(NETWORK_BASE + network::LENGTH <= RS485_BASE);
        assert!(RS485_BASE + rs485::LENGTH <= MODBUS_BASE);
        assert!(MODBUS_BASE + modbus::LENGTH <= MQTT_BASE);
        assert!(MQTT_BASE + mqtt::LENGTH <= MODULE_BASE);
        assert!(module::LENGTH <= MODULE_STRIDE);
        assert!(channel::LENGTH <= CHANNEL_STRIDE);
        assert_eq!(INPUT_BASE, 10930);
        assert_eq!(OUTPUT_BASE, 13490);
        assert_eq!(REGISTER_END, 14770);
    }

    #[test]
    fn test_uid_is_injective() {
        let mut seen = HashSet::new();
        for module in 0..MAX_MODULES {
            for index in 0..MAX_INPUTS {
                assert!(seen.insert(uid(module, index)));
                assert!(uid(module, index) < BIT_COUNT);
            }
        }
        assert_eq!(uid(3, 7), 307);
    }

    #[test]
    fn test_channel_blocks_are_disjoint() {
        let zones = ZoneTable::current();
        let mut starts = HashSet::new();
        for module in 0..MAX_MODULES {
            for index in 0..MAX_INPUTS {
                let start = zones.channel_block(Direction::Input, module, index);
                assert!(start + CHANNEL_STRIDE <= OUTPUT_BASE);
                assert!(starts.insert(start));
            }
            for index in 0..MAX_OUTPUTS {
                let start = zones.channel_block(Direction::Output, module, index);
                assert!(start + CHANNEL_STRIDE <= REGISTER_END);
                assert!(starts.insert(start));
            }
        }
    }

    #[test]
    fn test_pointer_table_round_trip() {
        let zones = ZoneTable::current();
        let cells = zones.to_pointer_table();
        assert_eq!(ZoneTable::from_pointer_table(&cells), Some(zones));
        assert_eq!(ZoneTable::from_pointer_table(&cells[..5]), None);
    }
}
