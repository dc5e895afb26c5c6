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

//! Recorded trace files.
//!
//! A recorded trace is the JSON dump of everything the replay side produced
//! for one shader debug session:
//!
//! ```json
//! { "trace": { "handle": 1, "source_files": ["main.hlsl"], ... },
//!   "states": [ { "step_index": 0, "next_instruction": 0, ... } ],
//!   "disassembly": "ps_5_0\n   0: mov r0.x, l(1.0)\n..." }
//! ```
//!
//! A `null` trace stands for a shader the replay side could not debug.

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use sdb_common::types::{Disassembly, ShaderDebugState, ShaderDebugTrace};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Contents of a recorded trace file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFile {
    /// Trace metadata, `None` when no debugger could be created
    pub trace: Option<ShaderDebugTrace>,
    /// Every state, in execution order
    #[serde(default)]
    pub states: Vec<ShaderDebugState>,
    /// Disassembly text
    #[serde(default)]
    pub disassembly: String,
}

impl TraceFile {
    /// Read and parse a trace file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read trace file: {}", path.display()))?;
        let file: Self = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse trace file: {}", path.display()))?;
        debug!(states = file.states.len(), "loaded trace file {}", path.display());
        Ok(file)
    }

    /// Disassembly listing.
    pub fn disassembly(&self) -> Disassembly {
        Disassembly::from_text(&self.disassembly)
    }
}
