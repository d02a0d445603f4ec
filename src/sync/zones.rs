// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Zone images
//!
//! Conversion between the object model (configuration, modules, channels)
//! and the cell runs of the register map. Everything here is pure: reading
//! and writing the cells is left to the caller.

use std::net::Ipv4Addr;

use log::warn;

use crate::build_info::FirmwareVersion;
use crate::config::utils::flag_from_register;
use crate::config::Config;
use crate::io::{Channel, ChannelKind, Module};
use crate::registers::codec::STRING_CELLS;
use crate::registers::layout::{channel, device, firmware, modbus, module, mqtt, network, rs485};
use crate::registers::{CellBuffer, CodecError, Direction, ZoneTable};

/// Cells of a channel block written by the gateway
///
/// The partial reset cell that follows belongs to the peer.
pub const CHANNEL_PUBLISHED: u16 = channel::PARTIAL_RESET;

/// Pointer table cells
pub fn pointer_table(zones: &ZoneTable) -> CellBuffer {
    CellBuffer::from_cells(
        crate::registers::layout::POINTER_TABLE,
        zones.to_pointer_table(),
    )
}

/// Firmware zone with a cleared commit flag and an empty commit password
pub fn firmware_zone(zones: &ZoneTable, version: FirmwareVersion) -> Result<CellBuffer, CodecError> {
    let mut zone = CellBuffer::new(zones.firmware, firmware::LENGTH);
    zone.put_u16(firmware::MAJOR, version.major)?;
    zone.put_u16(firmware::MINOR, version.minor)?;
    zone.put_u16(firmware::REVISION, version.revision)?;
    zone.put_u16(firmware::COMMIT, 0)?;
    zone.put_str(firmware::COMMIT_PASSWORD, "")?;
    zone.put_u32(firmware::OTA_VERSION, version.ota())?;
    Ok(zone)
}

/// Firmware identity as read back from a firmware zone
pub fn decode_firmware(zone: &CellBuffer) -> Result<(FirmwareVersion, u32), CodecError> {
    let version = FirmwareVersion {
        major: zone.u16_at(firmware::MAJOR)?,
        minor: zone.u16_at(firmware::MINOR)?,
        revision: zone.u16_at(firmware::REVISION)?,
    };
    Ok((version, zone.u32_at(firmware::OTA_VERSION)?))
}

/// Module metadata block
pub fn module_block(zones: &ZoneTable, slot: &Module) -> Result<CellBuffer, CodecError> {
    let mut block = CellBuffer::new(zones.module_block(slot.index), module::LENGTH);
    block.put_bool(module::EXISTS, slot.exists)?;
    block.put_u16(module::INDEX, slot.index as u16)?;
    block.put_u16(module::TYPE, slot.module_type.code())?;
    block.put_str(module::NAME, &slot.name)?;
    Ok(block)
}

/// Module metadata as read back from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub exists: bool,
    pub index: u16,
    pub type_code: u16,
    pub name: String,
}

pub fn decode_module(block: &CellBuffer) -> Result<ModuleInfo, CodecError> {
    Ok(ModuleInfo {
        exists: block.bool_at(module::EXISTS)?,
        index: block.u16_at(module::INDEX)?,
        type_code: block.u16_at(module::TYPE)?,
        name: block.str_at(module::NAME)?,
    })
}

/// Published part of a channel block
pub fn channel_block(zones: &ZoneTable, module: usize, ch: &Channel) -> Result<CellBuffer, CodecError> {
    let mut block = CellBuffer::new(
        zones.channel_block(ch.direction, module, ch.index),
        CHANNEL_PUBLISHED,
    );
    block.put_bool(channel::EXISTS, ch.exists)?;
    block.put_u16(channel::UID, ch.uid)?;
    block.put_u16(channel::INDEX, ch.index as u16)?;
    block.put_u16(channel::KIND, ch.kind.code())?;
    block.put_bool(channel::STATE, ch.state)?;
    block.put_u16(channel::VOLTAGE, ch.voltage)?;
    block.put_u32(channel::UPDATED_AT, ch.updated_at)?;
    block.put_u32(channel::RESET_AT, ch.reset_at)?;
    block.put_u32(channel::PULSES, ch.pulses)?;
    block.put_u32(channel::PARTIAL_PULSES, ch.partial_pulses)?;
    block.put_u32(channel::HIGH, ch.high_ms)?;
    block.put_u32(channel::PARTIAL_HIGH, ch.partial_high_ms)?;
    Ok(block)
}

/// Rebuild a channel from a block read from a peer
pub fn decode_channel(direction: Direction, block: &CellBuffer) -> Result<Channel, CodecError> {
    Ok(Channel {
        direction,
        kind: ChannelKind::from_code(block.u16_at(channel::KIND)?),
        exists: block.bool_at(channel::EXISTS)?,
        uid: block.u16_at(channel::UID)?,
        index: block.u16_at(channel::INDEX)? as usize,
        state: block.bool_at(channel::STATE)?,
        voltage: block.u16_at(channel::VOLTAGE)?,
        updated_at: block.u32_at(channel::UPDATED_AT)?,
        reset_at: block.u32_at(channel::RESET_AT)?,
        pulses: block.u32_at(channel::PULSES)?,
        partial_pulses: block.u32_at(channel::PARTIAL_PULSES)?,
        high_ms: block.u32_at(channel::HIGH)?,
        partial_high_ms: block.u32_at(channel::PARTIAL_HIGH)?,
    })
}

/// Base and length of the five configuration zones, in push order
pub fn config_zone_spans(zones: &ZoneTable) -> [(u16, u16); 5] {
    [
        (zones.device, device::LENGTH),
        (zones.network, network::LENGTH),
        (zones.rs485, rs485::LENGTH),
        (zones.modbus, modbus::LENGTH),
        (zones.mqtt, mqtt::LENGTH),
    ]
}

/// Wire view of every configuration field exposed in the register map
///
/// Numeric fields keep the wire width so that out-of-range submissions
/// reach the setters, which refuse them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigImage {
    pub device_id: u16,
    pub time_offset: i32,
    pub user: String,
    pub password: String,

    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns: Ipv4Addr,
    pub dhcp: u16,
    pub wifi: u16,
    pub ssid: String,
    pub wifi_password: String,

    pub rs485_mode: u16,
    pub baudrate: u32,
    pub to_mqtt: u16,

    pub modbus_role: u16,
    pub modbus_ip: Ipv4Addr,
    pub modbus_port: u16,

    pub mqtt_ip: Ipv4Addr,
    pub mqtt_port: u16,
    pub mqtt_interval: u32,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub mqtt_base: String,
}

impl ConfigImage {
    pub fn from_config(config: &Config) -> Self {
        Self {
            device_id: u16::from(config.device.id),
            time_offset: i32::from(config.device.time_offset),
            user: config.device.user.clone(),
            password: config.device.password.clone(),

            ip: config.network.ip,
            gateway: config.network.gateway,
            subnet: config.network.subnet,
            dns: config.network.dns,
            dhcp: u16::from(config.network.dhcp),
            wifi: u16::from(config.network.wifi),
            ssid: config.network.ssid.clone(),
            wifi_password: config.network.password.clone(),

            rs485_mode: config.rs485.mode.code(),
            baudrate: config.rs485.baudrate,
            to_mqtt: u16::from(config.rs485.to_mqtt),

            modbus_role: config.modbus.role.code(),
            modbus_ip: config.modbus.ip,
            modbus_port: config.modbus.port,

            mqtt_ip: config.mqtt.ip,
            mqtt_port: config.mqtt.port,
            mqtt_interval: config.mqtt.interval,
            mqtt_user: config.mqtt.user.clone(),
            mqtt_password: config.mqtt.password.clone(),
            mqtt_base: config.mqtt.base.clone(),
        }
    }

    /// Same image with every credential blanked, user names included
    pub fn without_secrets(mut self) -> Self {
        self.user.clear();
        self.password.clear();
        self.mqtt_user.clear();
        self.wifi_password.clear();
        self.mqtt_password.clear();
        self
    }

    /// Encode the five configuration zones, in the order of
    /// [`config_zone_spans`]
    pub fn encode(&self, zones: &ZoneTable) -> Result<Vec<CellBuffer>, CodecError> {
        let [dev, net, serial, local, messaging] = config_zone_spans(zones);

        let mut d = CellBuffer::new(dev.0, dev.1);
        d.put_u16(device::ID, self.device_id)?;
        d.put_signed(device::TIME_OFFSET, clamp_i16(self.time_offset))?;
        d.put_str(device::USER, &self.user)?;
        d.put_str(device::PASSWORD, &self.password)?;

        let mut n = CellBuffer::new(net.0, net.1);
        n.put_ipv4(network::IP, self.ip)?;
        n.put_ipv4(network::GATEWAY, self.gateway)?;
        n.put_ipv4(network::SUBNET, self.subnet)?;
        n.put_ipv4(network::DNS, self.dns)?;
        n.put_u16(network::DHCP, self.dhcp)?;
        n.put_u16(network::WIFI, self.wifi)?;
        n.put_str(network::SSID, &self.ssid)?;
        n.put_str(network::PASSWORD, &self.wifi_password)?;

        let mut s = CellBuffer::new(serial.0, serial.1);
        s.put_u16(rs485::MODE, self.rs485_mode)?;
        s.put_u32(rs485::BAUDRATE, self.baudrate)?;
        s.put_u16(rs485::TO_MQTT, self.to_mqtt)?;

        let mut l = CellBuffer::new(local.0, local.1);
        l.put_u16(modbus::ROLE, self.modbus_role)?;
        l.put_ipv4(modbus::IP, self.modbus_ip)?;
        l.put_u16(modbus::PORT, self.modbus_port)?;

        let mut m = CellBuffer::new(messaging.0, messaging.1);
        m.put_ipv4(mqtt::IP, self.mqtt_ip)?;
        m.put_u16(mqtt::PORT, self.mqtt_port)?;
        m.put_u32(mqtt::INTERVAL, self.mqtt_interval)?;
        m.put_str(mqtt::USER, &self.mqtt_user)?;
        m.put_str(mqtt::PASSWORD, &self.mqtt_password)?;
        m.put_str(mqtt::BASE, &self.mqtt_base)?;

        Ok(vec![d, n, s, l, m])
    }

    /// Decode the five configuration zones, given in the order of
    /// [`config_zone_spans`]
    pub fn decode(buffers: &[CellBuffer]) -> Result<Self, CodecError> {
        let [d, n, s, l, m] = buffers else {
            return Err(CodecError::ShortRun {
                expected: 5,
                actual: buffers.len(),
            });
        };
        Ok(Self {
            device_id: d.u16_at(device::ID)?,
            time_offset: d.signed_at(device::TIME_OFFSET)?,
            user: d.str_at(device::USER)?,
            password: d.str_at(device::PASSWORD)?,

            ip: n.ipv4_at(network::IP)?,
            gateway: n.ipv4_at(network::GATEWAY)?,
            subnet: n.ipv4_at(network::SUBNET)?,
            dns: n.ipv4_at(network::DNS)?,
            dhcp: n.u16_at(network::DHCP)?,
            wifi: n.u16_at(network::WIFI)?,
            ssid: n.str_at(network::SSID)?,
            wifi_password: n.str_at(network::PASSWORD)?,

            rs485_mode: s.u16_at(rs485::MODE)?,
            baudrate: s.u32_at(rs485::BAUDRATE)?,
            to_mqtt: s.u16_at(rs485::TO_MQTT)?,

            modbus_role: l.u16_at(modbus::ROLE)?,
            modbus_ip: l.ipv4_at(modbus::IP)?,
            modbus_port: l.u16_at(modbus::PORT)?,

            mqtt_ip: m.ipv4_at(mqtt::IP)?,
            mqtt_port: m.u16_at(mqtt::PORT)?,
            mqtt_interval: m.u32_at(mqtt::INTERVAL)?,
            mqtt_user: m.str_at(mqtt::USER)?,
            mqtt_password: m.str_at(mqtt::PASSWORD)?,
            mqtt_base: m.str_at(mqtt::BASE)?,
        })
    }

    /// Apply the image field by field through the section setters
    ///
    /// Strings shorter than two characters are placeholders and keep the
    /// stored value. A value the setter refuses keeps the stored value too.
    ///
    /// ### Returns
    ///
    /// The number of fields that changed
    pub fn apply(&self, config: &mut Config) -> usize {
        let mut changes = vec![
            config.device.set_id(self.device_id),
            config.device.set_time_offset(self.time_offset),
            config.network.set_ip(self.ip),
            config.network.set_gateway(self.gateway),
            config.network.set_subnet(self.subnet),
            config.network.set_dns(self.dns),
            config.rs485.set_mode(self.rs485_mode),
            config.rs485.set_baudrate(self.baudrate),
            config.modbus.set_role(self.modbus_role),
            config.modbus.set_ip(self.modbus_ip),
            config.modbus.set_port(self.modbus_port),
            config.mqtt.set_ip(self.mqtt_ip),
            config.mqtt.set_port(self.mqtt_port),
            config.mqtt.set_interval(self.mqtt_interval),
        ];

        if let Some(dhcp) = flag_from_register(self.dhcp, "DHCP") {
            changes.push(config.network.set_dhcp(dhcp));
        }
        if let Some(wifi) = flag_from_register(self.wifi, "WiFi") {
            changes.push(config.network.set_wifi(wifi));
        }
        if let Some(to_mqtt) = flag_from_register(self.to_mqtt, "RS485 to MQTT") {
            changes.push(config.rs485.set_to_mqtt(to_mqtt));
        }

        if let Some(v) = submitted(&self.user) {
            changes.push(config.device.set_user(v));
        }
        if let Some(v) = submitted(&self.password) {
            changes.push(config.device.set_password(v));
        }
        if let Some(v) = submitted(&self.ssid) {
            changes.push(config.network.set_ssid(v));
        }
        if let Some(v) = submitted(&self.wifi_password) {
            changes.push(config.network.set_password(v));
        }
        if let Some(v) = submitted(&self.mqtt_user) {
            changes.push(config.mqtt.set_user(v));
        }
        if let Some(v) = submitted(&self.mqtt_password) {
            changes.push(config.mqtt.set_password(v));
        }
        if let Some(v) = submitted(&self.mqtt_base) {
            changes.push(config.mqtt.set_base(v));
        }

        changes.into_iter().filter(|changed| *changed).count()
    }
}

/// Shortest string taken from a commit
const MIN_SUBMITTED_LENGTH: usize = 2;

fn submitted(value: &str) -> Option<&str> {
    (value.chars().count() >= MIN_SUBMITTED_LENGTH).then_some(value)
}

fn clamp_i16(value: i32) -> i16 {
    match i16::try_from(value) {
        Ok(v) => v,
        Err(_) => {
            warn!("Time offset {} does not fit the register, clamping", value);
            value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        }
    }
}

/// Cells of the commit password slot
pub const COMMIT_PASSWORD_CELLS: u16 = STRING_CELLS;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardType;
    use crate::io::{ExpansionStack, ModuleType};
    use crate::registers::layout::{CHANNEL_STRIDE, INPUT_BASE, MODULE_BASE};

    #[test]
    fn test_published_image_hides_secrets() {
        let mut config = Config::default();
        config.network.set_password("wifi-secret");
        config.mqtt.set_password("broker-secret");
        config.mqtt.set_user("broker");

        let zones = ZoneTable::current();
        let buffers = ConfigImage::from_config(&config)
            .without_secrets()
            .encode(&zones)
            .unwrap();
        let image = ConfigImage::decode(&buffers).unwrap();

        assert_eq!(image.user, "");
        assert_eq!(image.mqtt_user, "");
        assert_eq!(image.password, "");
        assert_eq!(image.wifi_password, "");
        assert_eq!(image.mqtt_password, "");
        assert_eq!(image.mqtt_base, config.mqtt.base);
        assert_eq!(buffers[0].base(), zones.device);
        assert_eq!(buffers[0].u16_at(device::ID).unwrap(), 0);
    }

    #[test]
    fn test_apply_keeps_placeholders_and_refuses_out_of_range() {
        let mut config = Config::default();
        config.device.set_password("factory");

        let mut image = ConfigImage::from_config(&config).without_secrets();
        image.device_id = 300;
        image.time_offset = -5;
        image.mqtt_base = "plant-b".to_string();
        image.dhcp = 7;

        let changed = image.apply(&mut config);

        assert_eq!(changed, 2);
        assert_eq!(config.device.id, 0);
        assert_eq!(config.device.time_offset, -5);
        assert_eq!(config.device.password, "factory");
        assert_eq!(config.mqtt.base, "plant-b");
        assert!(!config.network.dhcp);
    }

    #[test]
    fn test_single_character_strings_are_placeholders() {
        let mut config = Config::default();
        config.device.set_password("factory");
        config.mqtt.set_user("broker");

        let mut image = ConfigImage::from_config(&config);
        image.password = "x".to_string();
        image.mqtt_user = "b".to_string();
        image.mqtt_base = "p2".to_string();

        assert_eq!(image.apply(&mut config), 1);
        assert_eq!(config.device.password, "factory");
        assert_eq!(config.mqtt.user, "broker");
        assert_eq!(config.mqtt.base, "p2");

        // Resubmitting the stored values changes nothing
        let image = ConfigImage::from_config(&config);
        assert_eq!(image.apply(&mut config), 0);
    }

    #[test]
    fn test_channel_block_layout() {
        let stack = ExpansionStack::build(BoardType::Rs485, &[ModuleType::DigitalRelay]);
        let mut ch = *stack.channel(1, Direction::Input, 2).unwrap();
        ch.state = true;
        ch.pulses = 0x0001_0003;

        let zones = ZoneTable::current();
        let block = channel_block(&zones, 1, &ch).unwrap();
        assert_eq!(block.base(), INPUT_BASE + (16 + 2) * CHANNEL_STRIDE);
        assert_eq!(block.len(), CHANNEL_PUBLISHED as usize);
        assert_eq!(block.u16_at(channel::UID).unwrap(), 102);
        assert_eq!(&block.cells()[10..12], &[1, 3]);
        assert_eq!(decode_channel(Direction::Input, &block).unwrap(), ch);
    }

    #[test]
    fn test_module_block() {
        let stack = ExpansionStack::build(BoardType::Rs485, &[ModuleType::Analog]);
        let zones = ZoneTable::current();
        let block = module_block(&zones, stack.module(1).unwrap()).unwrap();
        assert_eq!(block.base(), MODULE_BASE + 55);

        let info = decode_module(&block).unwrap();
        assert!(info.exists);
        assert_eq!(info.type_code, ModuleType::Analog.code());
        assert_eq!(info.name, ModuleType::Analog.expansion_name());
    }

    #[test]
    fn test_firmware_zone() {
        let version = FirmwareVersion {
            major: 1,
            minor: 4,
            revision: 2,
        };
        let zone = firmware_zone(&ZoneTable::current(), version).unwrap();
        assert_eq!(zone.u16_at(firmware::COMMIT).unwrap(), 0);
        assert_eq!(decode_firmware(&zone).unwrap(), (version, 10402));
    }
}
