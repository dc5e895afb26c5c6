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

//! Debug states and the trace they belong to.

use std::fmt::{self, Display};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::{InstructionSourceInfo, ShaderVariable, ShaderVariableChange, SourceVariableMapping};

bitflags! {
    /// Notable events raised while executing a state's instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ShaderEvents: u32 {
        /// The instruction sampled, loaded or gathered from a resource.
        const SAMPLE_LOAD_GATHER = 0x1;
        /// The instruction produced a NaN or infinity.
        const GENERATED_NAN_OR_INF = 0x2;
    }
}

/// One executed instruction step and the variable changes it caused.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShaderDebugState {
    /// Logical step number, increasing but not necessarily contiguous
    pub step_index: u32,
    /// Instruction that executes when stepping forward from this state
    pub next_instruction: u32,
    /// Events raised by this step
    #[serde(default)]
    pub flags: ShaderEvents,
    /// Function names from outermost to innermost
    #[serde(default)]
    pub callstack: Vec<String>,
    /// Variable changes, applied in order
    #[serde(default)]
    pub changes: Vec<ShaderVariableChange>,
}

impl ShaderDebugState {
    /// Whether `self`'s callstack is a prefix-compatible frame of `other`.
    ///
    /// The shorter of the two stacks must equal the corresponding prefix of
    /// the longer one.
    pub fn callstack_prefix_matches(&self, other: &Self) -> bool {
        self.callstack.iter().zip(other.callstack.iter()).all(|(a, b)| a == b)
    }
}

/// Opaque replay-side handle of a debug trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceHandle(pub u64);

impl Display for TraceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace#{}", self.0)
    }
}

/// Pipeline stage of the debugged shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Hull / tessellation control shader
    Hull,
    /// Domain / tessellation evaluation shader
    Domain,
    /// Geometry shader
    Geometry,
    /// Pixel / fragment shader
    #[default]
    Pixel,
    /// Compute shader
    Compute,
}

/// Everything the replay side knows about a debug session, except the states themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderDebugTrace {
    /// Replay-side handle
    pub handle: TraceHandle,
    /// Stage of the shader
    pub stage: ShaderStage,
    /// Source file names, indexed by `LineColumnInfo::file_index`
    pub source_files: Vec<String>,
    /// Shader inputs
    pub inputs: Vec<ShaderVariable>,
    /// Constant blocks, each a struct of members
    pub constant_blocks: Vec<ShaderVariable>,
    /// Read-only resource bindings
    pub read_only_resources: Vec<ShaderVariable>,
    /// Read-write resource bindings
    pub read_write_resources: Vec<ShaderVariable>,
    /// Sampler bindings
    pub samplers: Vec<ShaderVariable>,
    /// Source variables valid for the whole trace
    pub source_vars: Vec<SourceVariableMapping>,
    /// Per-instruction source information, sorted by instruction
    pub inst_info: Vec<InstructionSourceInfo>,
}

impl ShaderDebugTrace {
    /// Whether any instruction maps to source.
    pub fn has_source_info(&self) -> bool {
        self.inst_info.iter().any(|info| info.line_info.has_source())
    }

    /// Name of a source file, when the index is valid.
    pub fn source_file(&self, file_index: i32) -> Option<&str> {
        usize::try_from(file_index).ok().and_then(|i| self.source_files.get(i)).map(String::as_str)
    }

    /// Find a source file by name, or by its file-name component.
    pub fn find_source_file(&self, name: &str) -> Option<usize> {
        self.source_files.iter().position(|f| f == name).or_else(|| {
            self.source_files
                .iter()
                .position(|f| f.rsplit(['/', '\\']).next().is_some_and(|base| base == name))
        })
    }
}
