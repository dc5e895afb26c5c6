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

//! SDB Common - Shared types and utilities for SDB components
//!
//! This crate provides the data model produced by the GPU shader debugger
//! (debug states, variables, source mappings), breakpoint locations, path
//! expressions, and the logging setup shared by the engine and the CLI.

/// Shader debugging data model: states, variables, source mappings and breakpoints
pub mod types;

/// Variable path parsing and expression normalization
pub mod expression;
/// Logging setup and utilities for consistent logging across SDB components
pub mod logging;

/// Synthetic trace construction for tests
pub mod test_utils;

pub use expression::*;
pub use logging::*;
