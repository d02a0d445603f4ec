// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Physical pin access
//!
//! The gateway only needs three things from the board: the list of plug-in
//! modules, a voltage per input and a way to drive outputs. On a host,
//! [`SimulatedHardware`] stands in for the board. It is cheap to clone and
//! every clone shares the same pins, so a test or a console can keep a
//! handle while the controller owns another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{IoError, ModuleType};

/// Access to the physical channels
pub trait Hardware: Send {
    /// Plug-in modules in slot order
    fn detect_expansions(&mut self) -> Vec<ModuleType>;

    /// Sample an input in millivolts
    fn read_millivolts(&mut self, module: usize, index: usize) -> Result<u16, IoError>;

    /// Drive an output
    fn write_output(&mut self, module: usize, index: usize, on: bool) -> Result<(), IoError>;
}

#[derive(Debug, Default)]
struct Pins {
    expansions: Vec<ModuleType>,
    millivolts: HashMap<(usize, usize), u16>,
    outputs: HashMap<(usize, usize), bool>,
    faults: HashSet<(usize, usize)>,
}

/// In-memory board
#[derive(Debug, Clone, Default)]
pub struct SimulatedHardware {
    pins: Arc<Mutex<Pins>>,
}

impl SimulatedHardware {
    pub fn new(expansions: Vec<ModuleType>) -> Self {
        Self {
            pins: Arc::new(Mutex::new(Pins {
                expansions,
                ..Pins::default()
            })),
        }
    }

    fn pins(&self) -> MutexGuard<'_, Pins> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the voltage seen on an input
    pub fn set_millivolts(&self, module: usize, index: usize, millivolts: u16) {
        self.pins().millivolts.insert((module, index), millivolts);
    }

    /// Current level of an output
    pub fn output(&self, module: usize, index: usize) -> bool {
        self.pins()
            .outputs
            .get(&(module, index))
            .copied()
            .unwrap_or(false)
    }

    /// Make every access to a channel fail
    pub fn inject_fault(&self, module: usize, index: usize) {
        self.pins().faults.insert((module, index));
    }

    pub fn clear_fault(&self, module: usize, index: usize) {
        self.pins().faults.remove(&(module, index));
    }
}

impl Hardware for SimulatedHardware {
    fn detect_expansions(&mut self) -> Vec<ModuleType> {
        self.pins().expansions.clone()
    }

    fn read_millivolts(&mut self, module: usize, index: usize) -> Result<u16, IoError> {
        let pins = self.pins();
        if pins.faults.contains(&(module, index)) {
            return Err(IoError::Hardware {
                module,
                index,
                reason: "simulated fault".to_string(),
            });
        }
        Ok(pins.millivolts.get(&(module, index)).copied().unwrap_or(0))
    }

    fn write_output(&mut self, module: usize, index: usize, on: bool) -> Result<(), IoError> {
        let mut pins = self.pins();
        if pins.faults.contains(&(module, index)) {
            return Err(IoError::Hardware {
                module,
                index,
                reason: "simulated fault".to_string(),
            });
        }
        pins.outputs.insert((module, index), on);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_pins() {
        let handle = SimulatedHardware::new(vec![ModuleType::Analog]);
        let mut owned = handle.clone();

        handle.set_millivolts(0, 2, 7000);
        assert_eq!(owned.read_millivolts(0, 2).unwrap(), 7000);

        owned.write_output(0, 1, true).unwrap();
        assert!(handle.output(0, 1));
        assert_eq!(owned.detect_expansions(), vec![ModuleType::Analog]);
    }

    #[test]
    fn test_fault_injection() {
        let mut hardware = SimulatedHardware::default();
        hardware.inject_fault(0, 0);
        assert!(hardware.write_output(0, 0, true).is_err());
        hardware.clear_fault(0, 0);
        assert!(hardware.write_output(0, 0, true).is_ok());
    }
}
