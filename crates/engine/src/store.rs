// SDB - Shader Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ordered, immutable sequence of debug states with a cursor.

use std::ops::Deref;

use sdb_common::types::{
    InstructionSourceInfo, LineColumnInfo, ShaderDebugState, ShaderDebugTrace,
};
use tracing::warn;

use crate::{DebugError, DebugResult};

/// Owns the trace metadata and every state of a debug session.
///
/// The state list never changes after construction; only the cursor moves,
/// and it always stays within `[0, len - 1]`.
#[derive(Debug, Clone)]
pub struct DebugStateStore {
    trace: ShaderDebugTrace,
    states: Vec<ShaderDebugState>,
    cursor: usize,
}

impl Deref for DebugStateStore {
    type Target = [ShaderDebugState];

    fn deref(&self) -> &Self::Target {
        &self.states
    }
}

impl DebugStateStore {
    /// Create a store positioned on the first state. A trace without states cannot be debugged.
    pub fn new(trace: ShaderDebugTrace, states: Vec<ShaderDebugState>) -> DebugResult<Self> {
        if states.is_empty() {
            return Err(DebugError::SessionUnavailable(format!(
                "{} produced no debug states",
                trace.handle
            )));
        }
        Ok(Self { trace, states, cursor: 0 })
    }

    /// The trace metadata.
    pub fn trace(&self) -> &ShaderDebugTrace {
        &self.trace
    }

    /// Index of the current state.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the cursor is on the first state.
    pub fn is_first(&self) -> bool {
        self.cursor == 0
    }

    /// Whether the cursor is on the last state.
    pub fn is_last(&self) -> bool {
        self.cursor + 1 >= self.states.len()
    }

    /// State under the cursor.
    pub fn current(&self) -> &ShaderDebugState {
        &self.states[self.cursor]
    }

    /// State before the cursor, clamped to the first state.
    pub fn previous(&self) -> &ShaderDebugState {
        &self.states[self.cursor.saturating_sub(1)]
    }

    /// State after the cursor, clamped to the last state.
    pub fn next(&self) -> &ShaderDebugState {
        &self.states[(self.cursor + 1).min(self.states.len() - 1)]
    }

    /// Move the cursor one state forward, returning `false` at the end.
    pub(crate) fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Move the cursor one state back, returning `false` at the start.
    pub(crate) fn retreat(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Source information of an instruction.
    ///
    /// Missing entries are not fatal: a warning is logged and the first entry
    /// is used instead. Returns `None` only when the trace has no table at all.
    pub fn instruction_info(&self, instruction: u32) -> Option<&InstructionSourceInfo> {
        let infos = &self.trace.inst_info;
        match infos.binary_search_by_key(&instruction, |info| info.instruction) {
            Ok(idx) => Some(&infos[idx]),
            Err(_) if infos.is_empty() => None,
            Err(_) => {
                warn!(instruction, "no source information for instruction, using first entry");
                infos.first()
            }
        }
    }

    /// Source range a state is about to execute.
    pub fn line_of(&self, state: &ShaderDebugState) -> LineColumnInfo {
        self.instruction_info(state.next_instruction)
            .map(|info| info.line_info)
            .unwrap_or_else(LineColumnInfo::unmapped)
    }

    /// Source range of the state at `index`.
    pub fn line_at(&self, index: usize) -> LineColumnInfo {
        self.states.get(index).map(|s| self.line_of(s)).unwrap_or_else(LineColumnInfo::unmapped)
    }

    /// Index of the state with the given step number.
    pub fn find_step(&self, step_index: u32) -> Option<usize> {
        self.states.iter().position(|s| s.step_index == step_index)
    }
}
