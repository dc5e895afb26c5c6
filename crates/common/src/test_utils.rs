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

//! Builders for synthetic debug traces.
//!
//! ```rust
//! use sdb_common::{test_utils::TraceBuilder, types::*};
//!
//! let (trace, states) = TraceBuilder::new()
//!     .source_file("main.hlsl")
//!     .instruction(0, LineColumnInfo::line(0, 1))
//!     .instruction(1, LineColumnInfo::line(0, 2))
//!     .state(0, &["main"], vec![ShaderVariableChange::created(ShaderVariable::scalar_f32("r0", 1.0))])
//!     .state(1, &["main"], vec![])
//!     .build();
//! assert_eq!(states.len(), 2);
//! assert!(trace.has_source_info());
//! ```

use crate::types::{
    Disassembly, InstructionSourceInfo, LineColumnInfo, ShaderDebugState, ShaderDebugTrace,
    ShaderEvents, ShaderVariable, ShaderVariableChange, SourceVariableMapping, TraceHandle,
};

/// Incrementally builds a [`ShaderDebugTrace`] together with its states.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    trace: ShaderDebugTrace,
    states: Vec<ShaderDebugState>,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    /// An empty trace with handle 1.
    pub fn new() -> Self {
        Self {
            trace: ShaderDebugTrace { handle: TraceHandle(1), ..Default::default() },
            states: Vec::new(),
        }
    }

    /// Replay-side handle.
    pub fn handle(mut self, handle: u64) -> Self {
        self.trace.handle = TraceHandle(handle);
        self
    }

    /// Append a source file.
    pub fn source_file(mut self, name: &str) -> Self {
        self.trace.source_files.push(name.to_string());
        self
    }

    /// Append a shader input.
    pub fn input(mut self, var: ShaderVariable) -> Self {
        self.trace.inputs.push(var);
        self
    }

    /// Append a constant block.
    pub fn constant_block(mut self, var: ShaderVariable) -> Self {
        self.trace.constant_blocks.push(var);
        self
    }

    /// Append a read-only resource binding.
    pub fn read_only_resource(mut self, var: ShaderVariable) -> Self {
        self.trace.read_only_resources.push(var);
        self
    }

    /// Append a read-write resource binding.
    pub fn read_write_resource(mut self, var: ShaderVariable) -> Self {
        self.trace.read_write_resources.push(var);
        self
    }

    /// Append a sampler binding.
    pub fn sampler(mut self, var: ShaderVariable) -> Self {
        self.trace.samplers.push(var);
        self
    }

    /// Append a source variable valid for the whole trace.
    pub fn global_mapping(mut self, mapping: SourceVariableMapping) -> Self {
        self.trace.source_vars.push(mapping);
        self
    }

    /// Set the source range of an instruction, keeping the table sorted.
    pub fn instruction(mut self, instruction: u32, line_info: LineColumnInfo) -> Self {
        self.info_mut(instruction).line_info = line_info;
        self
    }

    /// Set the same line for a contiguous range of instructions.
    pub fn instructions(
        mut self,
        instructions: std::ops::Range<u32>,
        line_info: LineColumnInfo,
    ) -> Self {
        for inst in instructions {
            self.info_mut(inst).line_info = line_info;
        }
        self
    }

    /// Add a source variable only valid at `instruction`.
    pub fn local_mapping(mut self, instruction: u32, mapping: SourceVariableMapping) -> Self {
        self.info_mut(instruction).source_vars.push(mapping);
        self
    }

    /// Append a state. Step indices count up from 0.
    pub fn state(
        mut self,
        next_instruction: u32,
        callstack: &[&str],
        changes: Vec<ShaderVariableChange>,
    ) -> Self {
        let step_index = self.states.len() as u32;
        self.states.push(ShaderDebugState {
            step_index,
            next_instruction,
            flags: ShaderEvents::empty(),
            callstack: callstack.iter().map(|s| s.to_string()).collect(),
            changes,
        });
        self
    }

    /// Append a fully specified state.
    pub fn raw_state(mut self, state: ShaderDebugState) -> Self {
        self.states.push(state);
        self
    }

    /// Raise events on the most recently added state.
    pub fn flags(mut self, flags: ShaderEvents) -> Self {
        if let Some(state) = self.states.last_mut() {
            state.flags |= flags;
        }
        self
    }

    /// Disassembly listing with a header line, one line per instruction.
    ///
    /// Instruction `i` is on line `i + 1`.
    pub fn disassembly(&self) -> Disassembly {
        let last = self
            .trace
            .inst_info
            .iter()
            .map(|i| i.instruction)
            .chain(self.states.iter().map(|s| s.next_instruction))
            .max();
        let mut lines = vec!["shader".to_string()];
        if let Some(last) = last {
            lines.extend((0..=last).map(|i| format!("{i:4}: op{i}")));
        }
        Disassembly::from_lines(lines)
    }

    /// Finish the trace.
    pub fn build(self) -> (ShaderDebugTrace, Vec<ShaderDebugState>) {
        (self.trace, self.states)
    }

    fn info_mut(&mut self, instruction: u32) -> &mut InstructionSourceInfo {
        let infos = &mut self.trace.inst_info;
        let pos = match infos.binary_search_by_key(&instruction, |i| i.instruction) {
            Ok(pos) => pos,
            Err(pos) => {
                infos.insert(
                    pos,
                    InstructionSourceInfo {
                        instruction,
                        line_info: LineColumnInfo::unmapped(),
                        source_vars: Vec::new(),
                    },
                );
                pos
            }
        };
        &mut infos[pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_table_sorted() {
        let (trace, _) = TraceBuilder::new()
            .instruction(5, LineColumnInfo::line(0, 5))
            .instruction(1, LineColumnInfo::line(0, 1))
            .instructions(2..4, LineColumnInfo::line(0, 2))
            .build();
        let order: Vec<u32> = trace.inst_info.iter().map(|i| i.instruction).collect();
        assert_eq!(order, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_states_and_flags() {
        let (_, states) = TraceBuilder::new()
            .state(0, &[], vec![])
            .state(1, &["main"], vec![])
            .flags(ShaderEvents::SAMPLE_LOAD_GATHER)
            .build();
        assert_eq!(states[1].step_index, 1);
        assert_eq!(states[1].callstack, vec!["main".to_string()]);
        assert!(states[1].flags.contains(ShaderEvents::SAMPLE_LOAD_GATHER));
        assert!(states[0].flags.is_empty());
    }

    #[test]
    fn test_disassembly_lines() {
        let builder = TraceBuilder::new().state(0, &[], vec![]).state(3, &[], vec![]);
        let dis = builder.disassembly();
        assert_eq!(dis.len(), 5);
        assert_eq!(dis.instruction_for_line(0), None);
        assert_eq!(dis.instruction_for_line(4), Some(3));
        assert_eq!(dis.line_for_instruction(2), Some(3));
    }
}
