// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel behaviour of a board with plug-in modules, across a restart

use anyhow::Result;
use tempfile::tempdir;

use rust_iogateway::config::BoardType;
use rust_iogateway::io::{IoController, ModuleType, SimulatedHardware};
use rust_iogateway::registers::Direction;

fn board(hardware: &SimulatedHardware) -> IoController {
    IoController::new(BoardType::Rs485, Box::new(hardware.clone()), 50)
}

#[test]
fn test_main_board_input_counts_one_pulse() {
    let hardware = SimulatedHardware::default();
    let mut io = board(&hardware);

    hardware.set_millivolts(0, 3, 2000);
    io.poll(100);
    hardware.set_millivolts(0, 3, 9000);
    let report = io.poll(150);
    assert_eq!(report.transitions, 1);

    // Staying above the threshold only accumulates time
    let report = io.poll(200);
    assert_eq!(report.transitions, 0);

    let snapshot = io.snapshot();
    let channel = snapshot
        .modules
        .iter()
        .find(|m| m.index == 0)
        .and_then(|m| m.inputs.iter().find(|c| c.index == 3))
        .cloned();
    let channel = channel.expect("input 3 of the main board is saved");
    assert_eq!(channel.pulses, 1);
    assert_eq!(channel.partial_pulses, 1);
    assert_eq!(channel.high_ms, 50);
}

#[test]
fn test_expansion_thresholds_differ_from_main_board() {
    let hardware = SimulatedHardware::new(vec![ModuleType::DigitalRelay]);
    let mut io = board(&hardware);

    // 9 V switches a main board input but not an expansion input
    hardware.set_millivolts(0, 0, 9000);
    hardware.set_millivolts(1, 0, 9000);
    let report = io.poll(50);
    assert_eq!(report.transitions, 1);

    hardware.set_millivolts(1, 0, 17000);
    let report = io.poll(100);
    assert_eq!(report.transitions, 1);
}

#[test]
fn test_statistics_survive_a_restart() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("io_state.json");
    let hardware = SimulatedHardware::new(vec![ModuleType::DigitalSolidState]);

    let mut io = board(&hardware);
    assert!(io.set_output(1, 4, true, 10)?);
    io.poll(60);
    io.poll(110);
    assert!(io.set_output(1, 4, false, 120)?);
    io.reset_channel(1, Direction::Output, 4, 130)?;
    io.save_state(&path)?;

    let mut restarted = board(&hardware);
    let report = restarted.load_state(&path)?;
    assert!(report.mismatches.is_empty());

    assert_eq!(restarted.snapshot().modules, io.snapshot().modules);
    Ok(())
}

#[test]
fn test_changed_hardware_discards_module_statistics() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("io_state.json");

    let before = SimulatedHardware::new(vec![ModuleType::DigitalRelay]);
    let mut io = board(&before);
    io.set_output(1, 0, true, 0)?;
    io.save_state(&path)?;

    let after = SimulatedHardware::new(vec![ModuleType::Analog]);
    let mut restarted = board(&after);
    let report = restarted.load_state(&path)?;
    assert_eq!(report.mismatches.len(), 1);
    Ok(())
}
