// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Debounce and edge detection
//!
//! Every poll tick the [`Debouncer`] samples the inputs of each existing
//! module, applies the module hysteresis and updates the statistics:
//!
//! - a state change stamps `updated_at`
//! - a rising edge increments both pulse counters
//! - the high-duration accumulators grow by one poll interval when the
//!   channel was already on at the start of the tick and still is
//!
//! Outputs are never sampled. Their accumulators grow while the commanded
//! state is on.

use log::{info, warn};

use super::hardware::Hardware;
use super::stack::ExpansionStack;

/// Input hysteresis in millivolts
///
/// An off channel turns on above `on_mv`, an on channel stays on while
/// above `off_mv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub on_mv: u16,
    pub off_mv: u16,
}

impl Thresholds {
    /// 0-10 V inputs of the main board
    pub const MAIN_BOARD: Thresholds = Thresholds {
        on_mv: 6500,
        off_mv: 3500,
    };

    /// 0-24 V inputs of the digital expansions
    pub const EXPANSION: Thresholds = Thresholds {
        on_mv: 16000,
        off_mv: 8000,
    };

    /// Candidate state for a sample given the current state
    pub fn next_state(&self, current: bool, millivolts: u16) -> bool {
        if current {
            millivolts > self.off_mv
        } else {
            millivolts > self.on_mv
        }
    }
}

/// Outcome of one poll tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Number of input state changes
    pub transitions: usize,
    /// Number of channels whose sample failed
    pub faults: usize,
}

/// Runs the per-tick sampling over an [`ExpansionStack`]
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    poll_ms: u32,
}

impl Debouncer {
    pub fn new(poll_ms: u32) -> Self {
        Self {
            poll_ms: poll_ms.max(1),
        }
    }

    pub fn poll_ms(&self) -> u32 {
        self.poll_ms
    }

    /// Sample every existing input and age every output
    ///
    /// A sampling failure is logged and skips that channel only.
    pub fn poll(
        &self,
        stack: &mut ExpansionStack,
        hardware: &mut dyn Hardware,
        now: u32,
    ) -> PollReport {
        let mut report = PollReport::default();

        for module in stack.modules_mut() {
            let thresholds = module.driver.and_then(|d| d.thresholds());
            let module_index = module.index;

            if let Some(thresholds) = thresholds {
                for channel in module.inputs.iter_mut().filter(|c| c.exists) {
                    let millivolts = match hardware.read_millivolts(module_index, channel.index) {
                        Ok(mv) => mv,
                        Err(e) => {
                            warn!("Sampling {} of module {} failed: {}", channel.label(), module_index, e);
                            report.faults += 1;
                            continue;
                        }
                    };

                    let was_on = channel.state;
                    let is_on = thresholds.next_state(was_on, millivolts);
                    channel.voltage = millivolts;

                    if is_on != was_on {
                        channel.state = is_on;
                        channel.updated_at = now;
                        if is_on {
                            channel.count_pulse();
                        }
                        report.transitions += 1;
                        info!(
                            "Module {} input {} is now {} ({} mV)",
                            module_index,
                            channel.index,
                            if is_on { "on" } else { "off" },
                            millivolts
                        );
                    } else if is_on {
                        channel.accumulate_high(self.poll_ms);
                    }
                }
            }

            for channel in module.outputs.iter_mut().filter(|c| c.exists && c.state) {
                channel.accumulate_high(self.poll_ms);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardType;
    use crate::io::hardware::SimulatedHardware;
    use crate::io::ModuleType;
    use crate::registers::Direction;

    #[test]
    fn test_hysteresis() {
        let t = Thresholds::MAIN_BOARD;
        assert!(!t.next_state(false, 6500));
        assert!(t.next_state(false, 6501));
        assert!(t.next_state(true, 4000));
        assert!(!t.next_state(true, 3500));
    }

    #[test]
    fn test_expansion_hysteresis() {
        let t = Thresholds::EXPANSION;
        assert!(!t.next_state(false, 16000));
        assert!(t.next_state(false, 16001));
        assert!(t.next_state(true, 8001));
        assert!(!t.next_state(true, 8000));
    }

    #[test]
    fn test_expansion_input_switches_at_its_thresholds() {
        let mut stack = ExpansionStack::build(BoardType::Rs485, &[ModuleType::DigitalSolidState]);
        let mut hardware = SimulatedHardware::default();
        let debouncer = Debouncer::new(50);

        hardware.set_millivolts(1, 2, 16000);
        assert_eq!(debouncer.poll(&mut stack, &mut hardware, 50).transitions, 0);
        hardware.set_millivolts(1, 2, 16001);
        assert_eq!(debouncer.poll(&mut stack, &mut hardware, 100).transitions, 1);

        hardware.set_millivolts(1, 2, 8001);
        assert_eq!(debouncer.poll(&mut stack, &mut hardware, 150).transitions, 0);
        hardware.set_millivolts(1, 2, 8000);
        assert_eq!(debouncer.poll(&mut stack, &mut hardware, 200).transitions, 1);

        let channel = stack.channel(1, Direction::Input, 2).unwrap();
        assert!(!channel.state);
        assert_eq!(channel.pulses, 1);
        assert_eq!(channel.updated_at, 200);
    }

    #[test]
    fn test_main_board_input_rising_edge() {
        let mut stack = ExpansionStack::new(BoardType::Rs485);
        let mut hardware = SimulatedHardware::default();
        let debouncer = Debouncer::new(50);

        hardware.set_millivolts(0, 3, 2000);
        debouncer.poll(&mut stack, &mut hardware, 100);
        hardware.set_millivolts(0, 3, 9000);
        let report = debouncer.poll(&mut stack, &mut hardware, 150);

        assert_eq!(report.transitions, 1);
        let channel = stack.channel(0, Direction::Input, 3).unwrap();
        assert!(channel.state);
        assert_eq!(channel.pulses, 1);
        assert_eq!(channel.partial_pulses, 1);
        assert_eq!(channel.updated_at, 150);
        assert_eq!(channel.high_ms, 0);
    }

    #[test]
    fn test_hovering_between_thresholds_holds_state() {
        let mut stack = ExpansionStack::build(BoardType::Rs485, &[ModuleType::DigitalRelay]);
        let mut hardware = SimulatedHardware::default();
        let debouncer = Debouncer::new(50);

        hardware.set_millivolts(1, 0, 20000);
        debouncer.poll(&mut stack, &mut hardware, 50);
        hardware.set_millivolts(1, 0, 12000);
        debouncer.poll(&mut stack, &mut hardware, 100);
        debouncer.poll(&mut stack, &mut hardware, 150);

        let channel = stack.channel(1, Direction::Input, 0).unwrap();
        assert!(channel.state);
        assert_eq!(channel.pulses, 1);
        assert_eq!(channel.updated_at, 50);
        assert_eq!(channel.high_ms, 100);
        assert_eq!(channel.partial_high_ms, 100);
    }

    #[test]
    fn test_outputs_accumulate_while_on() {
        let mut stack = ExpansionStack::new(BoardType::Rs485);
        let mut hardware = SimulatedHardware::default();
        let debouncer = Debouncer::new(50);

        if let Some(channel) = stack.channel_mut(0, Direction::Output, 1) {
            channel.state = true;
        }
        debouncer.poll(&mut stack, &mut hardware, 50);
        debouncer.poll(&mut stack, &mut hardware, 100);

        assert_eq!(stack.channel(0, Direction::Output, 1).unwrap().high_ms, 100);
        assert_eq!(stack.channel(0, Direction::Output, 0).unwrap().high_ms, 0);
    }

    #[test]
    fn test_sampling_fault_skips_channel_only() {
        let mut stack = ExpansionStack::new(BoardType::Rs485);
        let mut hardware = SimulatedHardware::default();
        let debouncer = Debouncer::new(50);

        hardware.inject_fault(0, 0);
        hardware.set_millivolts(0, 1, 9000);
        let report = debouncer.poll(&mut stack, &mut hardware, 50);

        assert_eq!(report.faults, 1);
        assert_eq!(report.transitions, 1);
        assert!(stack.channel(0, Direction::Input, 1).unwrap().state);
    }
}
