// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modules: the main board and the plug-in expansions
//!
//! | Type | Code | Inputs | Outputs | Output kind |
//! |------|------|--------|---------|-------------|
//! | main board | 0 | 8 | 4 | relay |
//! | digital relay (D16O8E) | 1 | 16 | 8 | relay |
//! | digital solid state (D16O8S) | 2 | 16 | 8 | digital |
//! | analog (A06O2) | 3 | 6 | 0 | - |

use std::fmt;

use serde::{Deserialize, Serialize};

use super::channel::{Channel, ChannelKind};
use super::engine::Thresholds;
use crate::config::BoardType;
use crate::registers::layout::{MAX_INPUTS, MAX_OUTPUTS};
use crate::registers::Direction;

/// Module type tag published in the module metadata block
///
/// The main board carries the `none` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleType {
    #[default]
    None,
    DigitalRelay,
    DigitalSolidState,
    Analog,
}

impl ModuleType {
    pub fn code(self) -> u16 {
        match self {
            ModuleType::None => 0,
            ModuleType::DigitalRelay => 1,
            ModuleType::DigitalSolidState => 2,
            ModuleType::Analog => 3,
        }
    }

    /// Catalogue name of a plug-in module
    pub fn expansion_name(self) -> &'static str {
        match self {
            ModuleType::None => "",
            ModuleType::DigitalRelay => "Arduino Pro Opta Ext D16O8E - AFX00005",
            ModuleType::DigitalSolidState => "Arduino Pro Opta Ext D16O8S - AFX00006",
            ModuleType::Analog => "Arduino Pro Opta Ext A06O2 - AFX00007",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleType::None => "none",
            ModuleType::DigitalRelay => "digital-relay",
            ModuleType::DigitalSolidState => "digital-solid-state",
            ModuleType::Analog => "analog",
        };
        write!(f, "{}", name)
    }
}

/// Sampling and driving behaviour of a module, resolved once when the
/// module is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleDriver {
    MainBoard,
    DigitalRelay,
    DigitalSolidState,
    Analog,
}

impl ModuleDriver {
    pub fn for_expansion(module_type: ModuleType) -> Option<Self> {
        match module_type {
            ModuleType::None => None,
            ModuleType::DigitalRelay => Some(ModuleDriver::DigitalRelay),
            ModuleType::DigitalSolidState => Some(ModuleDriver::DigitalSolidState),
            ModuleType::Analog => Some(ModuleDriver::Analog),
        }
    }

    /// Input hysteresis, `None` for modules whose inputs are not sampled
    pub fn thresholds(self) -> Option<Thresholds> {
        match self {
            ModuleDriver::MainBoard => Some(Thresholds::MAIN_BOARD),
            ModuleDriver::DigitalRelay | ModuleDriver::DigitalSolidState => {
                Some(Thresholds::EXPANSION)
            }
            ModuleDriver::Analog => None,
        }
    }

    pub fn input_count(self) -> usize {
        match self {
            ModuleDriver::MainBoard => 8,
            ModuleDriver::DigitalRelay | ModuleDriver::DigitalSolidState => 16,
            ModuleDriver::Analog => 6,
        }
    }

    pub fn output_count(self) -> usize {
        match self {
            ModuleDriver::MainBoard => 4,
            ModuleDriver::DigitalRelay | ModuleDriver::DigitalSolidState => 8,
            ModuleDriver::Analog => 0,
        }
    }

    pub fn input_kind(self) -> ChannelKind {
        match self {
            ModuleDriver::Analog => ChannelKind::Analog,
            _ => ChannelKind::Digital,
        }
    }

    pub fn output_kind(self) -> ChannelKind {
        match self {
            ModuleDriver::MainBoard | ModuleDriver::DigitalRelay => ChannelKind::Relay,
            ModuleDriver::DigitalSolidState => ChannelKind::Digital,
            ModuleDriver::Analog => ChannelKind::None,
        }
    }
}

/// A slot of the expansion stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub index: usize,
    pub exists: bool,
    pub name: String,
    pub module_type: ModuleType,
    /// `None` for an empty slot
    pub driver: Option<ModuleDriver>,
    pub inputs: [Channel; MAX_INPUTS],
    pub outputs: [Channel; MAX_OUTPUTS],
}

impl Module {
    /// Empty slot
    pub fn vacant(index: usize) -> Self {
        Self {
            index,
            exists: false,
            name: String::new(),
            module_type: ModuleType::None,
            driver: None,
            inputs: std::array::from_fn(|i| Channel::vacant(Direction::Input, index, i)),
            outputs: std::array::from_fn(|i| Channel::vacant(Direction::Output, index, i)),
        }
    }

    /// Module 0
    pub fn main_board(board: BoardType) -> Self {
        Self::with_driver(0, ModuleType::None, board.name(), ModuleDriver::MainBoard)
    }

    /// Plug-in module, `None` for the `none` type
    pub fn expansion(index: usize, module_type: ModuleType) -> Option<Self> {
        let driver = ModuleDriver::for_expansion(module_type)?;
        Some(Self::with_driver(
            index,
            module_type,
            module_type.expansion_name(),
            driver,
        ))
    }

    fn with_driver(index: usize, module_type: ModuleType, name: &str, driver: ModuleDriver) -> Self {
        let mut module = Self::vacant(index);
        module.exists = true;
        module.name = name.to_string();
        module.module_type = module_type;
        module.driver = Some(driver);
        for (i, channel) in module.inputs.iter_mut().enumerate().take(driver.input_count()) {
            *channel = Channel::new(Direction::Input, driver.input_kind(), index, i);
        }
        for (i, channel) in module.outputs.iter_mut().enumerate().take(driver.output_count()) {
            *channel = Channel::new(Direction::Output, driver.output_kind(), index, i);
        }
        module
    }

    pub fn channels(&self, direction: Direction) -> &[Channel] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    pub fn channels_mut(&mut self, direction: Direction) -> &mut [Channel] {
        match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        }
    }

    /// Existing channel at `index`
    pub fn channel(&self, direction: Direction, index: usize) -> Option<&Channel> {
        self.channels(direction).get(index).filter(|c| c.exists)
    }

    pub fn channel_mut(&mut self, direction: Direction, index: usize) -> Option<&mut Channel> {
        self.channels_mut(direction)
            .get_mut(index)
            .filter(|c| c.exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_board_layout() {
        let module = Module::main_board(BoardType::Rs485);
        assert!(module.exists);
        assert_eq!(module.name, "Arduino OPTA RS485 - AFX00001");
        assert_eq!(module.inputs.iter().filter(|c| c.exists).count(), 8);
        assert_eq!(module.outputs.iter().filter(|c| c.exists).count(), 4);
        assert_eq!(module.outputs[0].kind, ChannelKind::Relay);
        assert!(module.channel(Direction::Input, 8).is_none());
    }

    #[test]
    fn test_expansion_catalogue() {
        let relay = Module::expansion(1, ModuleType::DigitalRelay).unwrap();
        assert_eq!(relay.inputs[15].uid, 115);
        assert_eq!(relay.outputs[7].kind, ChannelKind::Relay);

        let solid = Module::expansion(2, ModuleType::DigitalSolidState).unwrap();
        assert_eq!(solid.outputs[0].kind, ChannelKind::Digital);

        let analog = Module::expansion(3, ModuleType::Analog).unwrap();
        assert_eq!(analog.inputs.iter().filter(|c| c.exists).count(), 6);
        assert!(analog.outputs.iter().all(|c| !c.exists));
        assert_eq!(analog.driver.and_then(|d| d.thresholds()), None);

        assert!(Module::expansion(4, ModuleType::None).is_none());
    }

    #[test]
    fn test_module_type_serde_names() {
        let yaml = serde_yml::to_string(&ModuleType::DigitalSolidState).unwrap();
        assert_eq!(yaml.trim(), "digital-solid-state");
        assert_eq!(ModuleType::DigitalSolidState.to_string(), "digital-solid-state");
    }
}
