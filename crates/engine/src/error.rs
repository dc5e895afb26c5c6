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

use thiserror::Error;

/// Errors raised by the debugging core.
///
/// Lookup and evaluation errors are recovered at the smallest scope (a single
/// watch row or tooltip); only [`DebugError::SessionUnavailable`] ends a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    /// A variable path or instruction could not be resolved at the current state
    #[error("not found: {0}")]
    NotFound(String),

    /// Expression text does not follow `<path>[,<cast>]`
    #[error("malformed expression '{expr}': {reason}")]
    MalformedExpression {
        /// The offending expression
        expr: String,
        /// What is wrong with it
        reason: String,
    },

    /// The cast cannot be applied to the resolved value
    #[error("cast ',{cast}' cannot be applied to {type_name}")]
    IncompatibleCast {
        /// Cast suffix
        cast: char,
        /// Type of the resolved value
        type_name: String,
    },

    /// The replay side could not produce a debug trace
    #[error("debug session unavailable: {0}")]
    SessionUnavailable(String),

    /// The replay controller failed while producing states
    #[error("replay failed: {0}")]
    Replay(String),

    /// Population was cancelled before it completed
    #[error("population cancelled")]
    Cancelled,
}

/// Result alias for the debugging core.
pub type DebugResult<T> = std::result::Result<T, DebugError>;
