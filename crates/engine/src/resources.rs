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

//! Resources observed being accessed during forward execution.
//!
//! Records are only ever added to: stepping backward does not retract a step
//! that was recorded earlier, and re-visiting a step does not duplicate it.

use itertools::Itertools;
use sdb_common::types::{ShaderBindIndex, ShaderDebugState, VarType};

/// One resource binding and the steps at which it was accessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessedResource {
    /// Binding, with the array element cleared
    pub binding: ShaderBindIndex,
    /// Handle type (read-only or read-write resource)
    pub var_type: VarType,
    /// Name of the handle variable when first seen
    pub name: String,
    /// Step indices, ascending and unique
    pub steps: Vec<u32>,
}

/// Steps grouped under one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccesses<'a> {
    /// The resource
    pub resource: &'a AccessedResource,
    /// Steps in ascending order
    pub steps: &'a [u32],
}

/// Resources grouped under one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAccesses<'a> {
    /// Step index
    pub step: u32,
    /// Resources accessed at that step, in discovery order
    pub resources: Vec<&'a AccessedResource>,
}

/// Accumulates accessed resources, keyed by binding.
#[derive(Debug, Clone, Default)]
pub struct AccessedResourceTracker {
    records: Vec<AccessedResource>,
}

impl AccessedResourceTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every resource handle written by `state`.
    pub fn record(&mut self, state: &ShaderDebugState) {
        for change in &state.changes {
            let after = &change.after;
            if !after.var_type.is_resource() {
                continue;
            }
            let Some(bind) = after.bind_index() else {
                continue;
            };

            match self.records.iter_mut().find(|r| r.binding.same_binding(&bind)) {
                Some(record) => {
                    if let Err(pos) = record.steps.binary_search(&state.step_index) {
                        record.steps.insert(pos, state.step_index);
                    }
                }
                None => self.records.push(AccessedResource {
                    binding: bind.binding_only(),
                    var_type: after.var_type,
                    name: after.name.clone(),
                    steps: vec![state.step_index],
                }),
            }
        }
    }

    /// Records in discovery order.
    pub fn records(&self) -> &[AccessedResource] {
        &self.records
    }

    /// Record for a binding, ignoring the array element.
    pub fn find(&self, bind: &ShaderBindIndex) -> Option<&AccessedResource> {
        self.records.iter().find(|r| r.binding.same_binding(bind))
    }

    /// View grouped by resource: newest-discovered resource first, steps ascending.
    pub fn by_resource(&self) -> Vec<ResourceAccesses<'_>> {
        self.records
            .iter()
            .rev()
            .map(|resource| ResourceAccesses { resource, steps: &resource.steps })
            .collect()
    }

    /// View grouped by step: steps ascending, resources in discovery order.
    pub fn by_step(&self) -> Vec<StepAccesses<'_>> {
        self.records
            .iter()
            .flat_map(|r| r.steps.iter().map(move |step| (*step, r)))
            // stable, so discovery order survives within a step
            .sorted_by_key(|(step, _)| *step)
            .chunk_by(|(step, _)| *step)
            .into_iter()
            .map(|(step, group)| StepAccesses { step, resources: group.map(|(_, r)| r).collect() })
            .collect()
    }
}
