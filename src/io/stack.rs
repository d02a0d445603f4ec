// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The expansion stack
//!
//! A fixed array of [`MAX_MODULES`] slots. Slot 0 always holds the main
//! board, plug-in modules fill the following slots in detection order.
//! Modules detected past the last slot are ignored and counted in
//! [`ExpansionStack::overflow`].

use log::{debug, info, warn};

use super::channel::Channel;
use super::module::{Module, ModuleType};
use crate::config::BoardType;
use crate::registers::layout::MAX_MODULES;
use crate::registers::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionStack {
    modules: [Module; MAX_MODULES],
    count: usize,
    overflow: usize,
}

impl ExpansionStack {
    /// Stack with the main board only
    pub fn new(board: BoardType) -> Self {
        let mut modules: [Module; MAX_MODULES] = std::array::from_fn(Module::vacant);
        modules[0] = Module::main_board(board);
        Self {
            modules,
            count: 1,
            overflow: 0,
        }
    }

    /// Build the stack from the enumerated plug-in modules
    pub fn build(board: BoardType, detected: &[ModuleType]) -> Self {
        let mut stack = Self::new(board);
        info!("Main board: {}", board.name());

        for module_type in detected {
            if *module_type == ModuleType::None {
                debug!("Skipping expansion without type");
                continue;
            }
            if stack.count >= MAX_MODULES {
                stack.overflow += 1;
                continue;
            }
            if let Some(module) = Module::expansion(stack.count, *module_type) {
                info!("Expansion {}: {}", stack.count, module.name);
                stack.modules[stack.count] = module;
                stack.count += 1;
            }
        }

        if stack.overflow > 0 {
            warn!(
                "{} expansion modules ignored, the stack holds {} modules",
                stack.overflow, MAX_MODULES
            );
        }
        stack
    }

    /// Number of modules present, main board included
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of detected modules that did not fit
    pub fn overflow(&self) -> usize {
        self.overflow
    }

    /// All slots, vacant ones included
    pub fn slots(&self) -> &[Module] {
        &self.modules
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|m| m.exists)
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.iter_mut().filter(|m| m.exists)
    }

    /// Existing module at `index`
    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get(index).filter(|m| m.exists)
    }

    pub fn module_mut(&mut self, index: usize) -> Option<&mut Module> {
        self.modules.get_mut(index).filter(|m| m.exists)
    }

    pub fn channel(&self, module: usize, direction: Direction, index: usize) -> Option<&Channel> {
        self.module(module)?.channel(direction, index)
    }

    pub fn channel_mut(
        &mut self,
        module: usize,
        direction: Direction,
        index: usize,
    ) -> Option<&mut Channel> {
        self.module_mut(module)?.channel_mut(direction, index)
    }

    /// Every existing channel of a direction with its module index
    pub fn channels(&self, direction: Direction) -> impl Iterator<Item = (usize, &Channel)> {
        self.modules().flat_map(move |m| {
            m.channels(direction)
                .iter()
                .filter(|c| c.exists)
                .map(move |c| (m.index, c))
        })
    }
}
