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

//! Watch expressions re-evaluated after every cursor move.
//!
//! The watch list always ends in a blank "add new" row. Editing that row adds a
//! watch, clearing the text of any other row removes it.

use sdb_common::{normalize_expression, types::ShaderVariable};
use serde::Serialize;
use tracing::debug;

use crate::{
    format::{check_cast, colour_swatch, format_value, Cast},
    DebugError, DebugResult, Resolved,
};

/// Text shown for a watch whose path does not resolve at the current state.
pub const UNAVAILABLE: &str = "Unavailable";

/// Evaluation status of a watch node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WatchVarState {
    /// Expression text or cast is invalid
    #[default]
    Invalid,
    /// Evaluated at the current state
    Valid,
    /// Not available at the current state; kept from an earlier evaluation
    Stale,
}

/// One node of a watch tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WatchNode {
    /// Expression text for roots, member name for children
    pub name: String,
    /// Type column
    pub type_name: String,
    /// Value column
    pub value: String,
    /// Error text for [`WatchVarState::Invalid`] nodes
    pub error: Option<String>,
    /// Evaluation status
    pub state: WatchVarState,
    /// UI expansion state, preserved across evaluations
    pub expanded: bool,
    /// Colour swatch for `,c` watches
    pub swatch: Option<[f32; 4]>,
    /// Members, array elements or matrix rows
    pub children: Vec<WatchNode>,
}

impl WatchNode {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&WatchNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn mark_stale(&mut self) {
        self.state = WatchVarState::Stale;
        for child in &mut self.children {
            child.mark_stale();
        }
    }

    /// Copy `var` into this node, reusing children by name.
    fn mirror(&mut self, var: &ShaderVariable, cast: Option<Cast>, int_view: bool) {
        self.type_name = var.type_name();
        self.value = format_value(var, cast, int_view);
        self.error = None;
        self.state = WatchVarState::Valid;
        self.swatch = if cast == Some(Cast::Colour) { colour_swatch(var) } else { None };

        let members = if var.members.is_empty() && var.rows > 1 {
            matrix_rows(var)
        } else {
            var.members.clone()
        };

        let mut previous = std::mem::take(&mut self.children);
        for member in &members {
            let name = member.short_name(&var.name).to_string();
            let mut child = match previous.iter().position(|c| c.name == name) {
                Some(pos) => previous.remove(pos),
                None => WatchNode::new(name),
            };
            child.mirror(member, cast, int_view);
            self.children.push(child);
        }
        // members that disappeared are kept, flagged as stale
        for mut child in previous {
            child.mark_stale();
            self.children.push(child);
        }
    }

    fn fail(&mut self, err: &DebugError) {
        self.type_name.clear();
        self.swatch = None;
        match err {
            DebugError::NotFound(_) => {
                self.value = UNAVAILABLE.to_string();
                self.error = None;
                self.mark_stale();
            }
            other => {
                self.value.clear();
                self.error = Some(other.to_string());
                self.state = WatchVarState::Invalid;
                for child in &mut self.children {
                    child.mark_stale();
                }
            }
        }
    }
}

/// Split a matrix without members into one vector per row.
fn matrix_rows(var: &ShaderVariable) -> Vec<ShaderVariable> {
    let size = var.var_type.component_size();
    let columns = var.columns as usize;
    (0..var.rows as usize)
        .map(|r| {
            let mut row =
                ShaderVariable::new(format!("{}[{r}]", var.name), var.var_type, 1, var.columns);
            for c in 0..columns {
                row.value.set_component_bits(c, size, var.value.component_bits(r * columns + c, size));
            }
            row
        })
        .collect()
}

/// Split watch text into its path and optional cast.
pub fn parse_watch(text: &str) -> DebugResult<(String, Option<Cast>)> {
    let normalized = normalize_expression(text);
    let malformed = |reason: &str| DebugError::MalformedExpression {
        expr: text.to_string(),
        reason: reason.to_string(),
    };

    let (path, cast) = match normalized.rsplit_once(',') {
        Some((path, suffix)) => {
            let mut chars = suffix.chars();
            let cast = match (chars.next(), chars.next()) {
                (Some(c), None) => Cast::from_char(c),
                _ => None,
            };
            let cast = cast.ok_or_else(|| malformed("unknown cast suffix"))?;
            (path.to_string(), Some(cast))
        }
        None => (normalized, None),
    };
    if path.is_empty() {
        return Err(malformed("empty path"));
    }
    Ok((path, cast))
}

/// A watch expression and its last evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watch {
    /// Expression as entered
    pub expression: String,
    /// Evaluation tree
    pub node: WatchNode,
}

/// The watch list.
#[derive(Debug, Clone, Default)]
pub struct WatchEngine {
    watches: Vec<Watch>,
}

impl WatchEngine {
    /// An empty watch list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a watch and return its row. An expression already watched (ignoring
    /// whitespace) is not added twice.
    pub fn add(&mut self, expression: &str) -> usize {
        let normalized = normalize_expression(expression);
        if let Some(row) =
            self.watches.iter().position(|w| normalize_expression(&w.expression) == normalized)
        {
            return row;
        }
        self.watches.push(Watch {
            expression: expression.trim().to_string(),
            node: WatchNode::new(expression.trim()),
        });
        self.watches.len() - 1
    }

    /// Remove the watch at `row`.
    pub fn remove(&mut self, row: usize) -> Option<Watch> {
        (row < self.watches.len()).then(|| self.watches.remove(row))
    }

    /// Apply an edit to a row, including the trailing blank row at `len()`.
    ///
    /// Returns the row now holding the expression, or `None` if the edit
    /// removed a watch or was a no-op.
    pub fn edit_row(&mut self, row: usize, text: &str) -> Option<usize> {
        let blank = text.trim().is_empty();
        if row >= self.watches.len() {
            return if blank { None } else { Some(self.add(text)) };
        }
        if blank {
            self.watches.remove(row);
            return None;
        }
        let watch = &mut self.watches[row];
        watch.expression = text.trim().to_string();
        watch.node = WatchNode::new(watch.expression.clone());
        Some(row)
    }

    /// Watches in display order, without the blank row.
    pub fn rows(&self) -> &[Watch] {
        &self.watches
    }

    /// Number of rows including the trailing blank row.
    pub fn row_count(&self) -> usize {
        self.watches.len() + 1
    }

    /// Number of watches.
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Whether no watch is set.
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    /// Toggle the expansion state of a root node.
    pub fn set_expanded(&mut self, row: usize, expanded: bool) {
        if let Some(watch) = self.watches.get_mut(row) {
            watch.node.expanded = expanded;
        }
    }

    /// Re-evaluate every watch through `resolve`.
    pub fn evaluate_all<F>(&mut self, resolve: F, int_view: bool)
    where
        F: Fn(&str) -> DebugResult<Resolved>,
    {
        for watch in &mut self.watches {
            let result = parse_watch(&watch.expression).and_then(|(path, cast)| {
                let var = resolve(&path)?.apply_swizzle();
                check_cast(&var, cast)?;
                Ok((var, cast))
            });
            match result {
                Ok((var, cast)) => watch.node.mirror(&var, cast, int_view),
                Err(err) => {
                    debug!(expression = %watch.expression, %err, "watch evaluation failed");
                    watch.node.fail(&err);
                }
            }
        }
    }
}
