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

//! Display trees for the variable panes.
//!
//! Three trees are built per state: source variables, constants and bound
//! resources, and raw debugger variables. Nodes carry a `changed` flag set when
//! a variable they read was touched by the last cursor move.

use sdb_common::types::ShaderVariable;
use serde::Serialize;

use crate::{
    format::format_value, watch::UNAVAILABLE, SourceMappingResolver, SourceNode, VariableRegistry,
};

/// One row of a variable pane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DisplayNode {
    /// Name at this level (`color`, `[2]`)
    pub name: String,
    /// Type column
    pub type_name: String,
    /// Value column
    pub value: String,
    /// Touched by the most recent cursor move
    pub changed: bool,
    /// Members, array elements
    pub children: Vec<DisplayNode>,
}

impl DisplayNode {
    /// Build a node from a variable. `parent` is the qualified name of the parent, if any.
    pub fn from_variable(var: &ShaderVariable, parent: &str, int_view: bool, changed: bool) -> Self {
        Self {
            name: var.short_name(parent).to_string(),
            type_name: var.type_name(),
            value: format_value(var, None, int_view),
            changed,
            children: var
                .members
                .iter()
                .map(|m| Self::from_variable(m, &var.name, int_view, changed))
                .collect(),
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&DisplayNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Source variables, grouped into structs and arrays.
pub fn source_variables(resolver: &SourceMappingResolver<'_>, int_view: bool) -> Vec<DisplayNode> {
    resolver.source_tree().iter().map(|node| source_node(resolver, node, int_view)).collect()
}

fn source_node(resolver: &SourceMappingResolver<'_>, node: &SourceNode, int_view: bool) -> DisplayNode {
    let registry = resolver.registry();
    let changed = node.referenced_variables().iter().any(|name| registry.is_recently_changed(name));

    if node.children.is_empty() {
        return match resolver.evaluate_node(node) {
            Ok(var) => DisplayNode {
                name: node.name.clone(),
                type_name: var.type_name(),
                value: format_value(&var, None, int_view),
                changed,
                children: Vec::new(),
            },
            Err(_) => DisplayNode {
                name: node.name.clone(),
                value: UNAVAILABLE.to_string(),
                changed,
                ..Default::default()
            },
        };
    }

    let children: Vec<DisplayNode> =
        node.children.iter().map(|c| source_node(resolver, c, int_view)).collect();
    let is_array = children.iter().all(|c| c.name.starts_with('['));
    let type_name = match children.first() {
        Some(first) if is_array => format!("{}[{}]", first.type_name, children.len()),
        _ => "struct".to_string(),
    };
    DisplayNode { name: node.name.clone(), type_name, value: String::new(), changed, children }
}

/// Constant blocks, then read-only and read-write resources, then samplers.
pub fn constants(resolver: &SourceMappingResolver<'_>, int_view: bool) -> Vec<DisplayNode> {
    resolver.constants().map(|var| DisplayNode::from_variable(var, "", int_view, false)).collect()
}

/// Live debugger variables followed by shader inputs.
pub fn debug_variables(
    registry: &VariableRegistry,
    inputs: &[ShaderVariable],
    int_view: bool,
) -> Vec<DisplayNode> {
    registry
        .variables()
        .iter()
        .map(|var| {
            DisplayNode::from_variable(var, "", int_view, registry.is_recently_changed(&var.name))
        })
        .chain(inputs.iter().map(|var| DisplayNode::from_variable(var, "", int_view, false)))
        .collect()
}
