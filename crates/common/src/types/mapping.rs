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

//! Source-level debug information: line/column mapping per instruction and
//! the mapping of high-level variables onto debugger variables.

use serde::{Deserialize, Serialize};

use super::VarType;

/// Which variable set a [`DebugVariableReference`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DebugVariableType {
    /// Unmapped component
    #[default]
    Undefined,
    /// Shader input
    Input,
    /// Constant block member
    Constant,
    /// Sampler binding
    Sampler,
    /// Read-only resource binding
    ReadOnlyResource,
    /// Read-write resource binding
    ReadWriteResource,
    /// Live debugger variable (register, temporary, output)
    Variable,
}

/// Reference to one component of an underlying debugger variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DebugVariableReference {
    /// Path of the referenced variable, e.g. `r0` or `cb0.transform`
    pub name: String,
    /// Variable set the name is looked up in
    #[serde(rename = "type", default)]
    pub var_type: DebugVariableType,
    /// Component within the referenced variable
    #[serde(default)]
    pub component: u32,
}

impl DebugVariableReference {
    /// Create a new reference.
    pub fn new(var_type: DebugVariableType, name: impl Into<String>, component: u32) -> Self {
        Self { name: name.into(), var_type, component }
    }
}

/// Maps one source variable onto the debugger variables backing its components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceVariableMapping {
    /// Source name, possibly a flattened path such as `S.b[1]`
    pub name: String,
    /// Base type of the source variable
    #[serde(rename = "type", default)]
    pub var_type: VarType,
    /// Rows
    #[serde(default = "one")]
    pub rows: u32,
    /// Columns
    #[serde(default = "one")]
    pub columns: u32,
    /// Byte offset within the parent, used only for display ordering
    #[serde(default)]
    pub offset: u32,
    /// One reference per scalar component, row-major
    #[serde(default)]
    pub variables: Vec<DebugVariableReference>,
}

fn one() -> u32 {
    1
}

impl SourceVariableMapping {
    /// Create a mapping.
    pub fn new(
        name: impl Into<String>,
        var_type: VarType,
        rows: u32,
        columns: u32,
        variables: Vec<DebugVariableReference>,
    ) -> Self {
        Self { name: name.into(), var_type, rows, columns, offset: 0, variables }
    }

    /// Map a scalar or vector source variable onto consecutive components of one register.
    pub fn contiguous(
        name: impl Into<String>,
        var_type: VarType,
        columns: u32,
        reg_type: DebugVariableType,
        reg: &str,
        first_component: u32,
    ) -> Self {
        let variables = (0..columns)
            .map(|c| DebugVariableReference::new(reg_type, reg, first_component + c))
            .collect();
        Self::new(name, var_type, 1, columns, variables)
    }
}

/// Source range an instruction maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineColumnInfo {
    /// Index into the trace's source files, negative when unmapped
    pub file_index: i32,
    /// First line (1-based)
    #[serde(default)]
    pub line_start: u32,
    /// Last line (inclusive)
    #[serde(default)]
    pub line_end: u32,
    /// First column
    #[serde(default)]
    pub column_start: u32,
    /// Last column
    #[serde(default)]
    pub column_end: u32,
}

impl Default for LineColumnInfo {
    fn default() -> Self {
        Self::unmapped()
    }
}

impl LineColumnInfo {
    /// An instruction without source mapping.
    pub fn unmapped() -> Self {
        Self { file_index: -1, line_start: 0, line_end: 0, column_start: 0, column_end: 0 }
    }

    /// A single-line mapping without column information.
    pub fn line(file_index: i32, line: u32) -> Self {
        Self { file_index, line_start: line, line_end: line, column_start: 0, column_end: 0 }
    }

    /// Whether the instruction maps to source.
    pub fn has_source(&self) -> bool {
        self.file_index >= 0
    }

    /// Whether two ranges cover the same lines of the same file, ignoring columns.
    pub fn same_lines(&self, other: &Self) -> bool {
        self.file_index == other.file_index
            && self.line_start == other.line_start
            && self.line_end == other.line_end
    }
}

/// Per-instruction source information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InstructionSourceInfo {
    /// Instruction index
    pub instruction: u32,
    /// Source range
    #[serde(default)]
    pub line_info: LineColumnInfo,
    /// Source variables in scope at this instruction
    #[serde(default)]
    pub source_vars: Vec<SourceVariableMapping>,
}
