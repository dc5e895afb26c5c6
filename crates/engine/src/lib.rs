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

//! Shader debugging session core.
//!
//! A debug session walks a precomputed list of shader execution states in
//! either direction. Each state only records the variable changes of one
//! instruction, so the live variables are rebuilt incrementally as the cursor
//! moves. On top of that the crate resolves source-level variable paths to
//! register values, steps at source or instruction granularity, evaluates
//! watch expressions and tracks accessed resources.

pub mod breakpoint;
pub use breakpoint::*;

pub mod config;
pub use config::*;

pub mod display;

pub mod error;
pub use error::*;

pub mod format;

pub mod registry;
pub use registry::*;

pub mod replay;
pub use replay::*;

pub mod resolver;
pub use resolver::*;

pub mod resources;
pub use resources::*;

pub mod session;
pub use session::*;

pub mod stepping;
pub use stepping::*;

pub mod store;
pub use store::*;

pub mod watch;
pub use watch::*;
