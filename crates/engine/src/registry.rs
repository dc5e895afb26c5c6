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

//! Live debug variables, maintained incrementally from state deltas.
//!
//! Moving forward applies a state's `after` values; moving back applies the
//! `before` values in reverse order. A forward/backward pair leaves the
//! registry exactly as it was, including the order of the variables.

use std::collections::{BTreeSet, HashMap};

use sdb_common::types::{lookup_path, ShaderVariable, ShaderVariableChange};
use tracing::warn;

/// How to revert one change applied forward.
#[derive(Debug, Clone)]
enum Undo {
    /// A variable was inserted at this position
    Inserted(usize),
    /// The variable at this position replaced this value
    Replaced(usize, ShaderVariable),
    /// This variable was removed from this position
    Removed(usize, ShaderVariable),
}

/// Current set of live debugger variables.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<ShaderVariable>,
    last_update: HashMap<String, u64>,
    changed: BTreeSet<String>,
    update_counter: u64,
    /// Undo records of each forward apply, innermost last.
    journal: Vec<Vec<Undo>>,
}

impl VariableRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live variables, most recently created first.
    pub fn variables(&self) -> &[ShaderVariable] {
        &self.variables
    }

    /// Find a variable by path, descending into members (`a.b`, `a[2]`).
    pub fn lookup(&self, path: &str) -> Option<&ShaderVariable> {
        lookup_path(&self.variables, path)
    }

    /// Names touched by the most recent apply, including removed ones.
    pub fn changed_names(&self) -> &BTreeSet<String> {
        &self.changed
    }

    /// Number of applies so far.
    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    /// Counter value of the last apply that touched `name`.
    pub fn last_update(&self, name: &str) -> Option<u64> {
        self.last_update.get(name).copied()
    }

    /// Whether `name` was touched by the most recent apply.
    pub fn is_recently_changed(&self, name: &str) -> bool {
        self.update_counter > 0 && self.last_update(name) == Some(self.update_counter)
    }

    /// Apply the changes of a state the cursor just moved onto.
    ///
    /// A change with a named `after` is an upsert: a live variable of that
    /// name is replaced in place, otherwise the value is inserted at the
    /// front. A change with only a `before` removes the variable.
    pub fn apply_forward(&mut self, changes: &[ShaderVariableChange]) {
        self.begin_update();

        let mut undo = Vec::with_capacity(changes.len());
        for change in changes {
            self.touch(change.name());

            if !change.after.name.is_empty() {
                let live = Some(change.before.name.as_str())
                    .filter(|name| !name.is_empty())
                    .and_then(|name| self.position(name))
                    .or_else(|| self.position(&change.after.name));
                match live {
                    Some(idx) => {
                        let old = std::mem::replace(&mut self.variables[idx], change.after.clone());
                        undo.push(Undo::Replaced(idx, old));
                    }
                    None => {
                        if !change.is_creation() {
                            warn!(name = %change.after.name, "updating unknown variable, inserting it");
                        }
                        self.variables.insert(0, change.after.clone());
                        undo.push(Undo::Inserted(0));
                    }
                }
            } else if !change.before.name.is_empty() {
                match self.position(&change.before.name) {
                    Some(idx) => undo.push(Undo::Removed(idx, self.variables.remove(idx))),
                    None => warn!(name = %change.before.name, "removing unknown variable"),
                }
            }
        }

        self.journal.push(undo);
    }

    /// Undo the changes of the state the cursor is about to leave backwards.
    pub fn apply_backward(&mut self, changes: &[ShaderVariableChange]) {
        self.begin_update();
        for change in changes {
            self.touch(change.name());
        }

        match self.journal.pop() {
            Some(undo) => {
                for record in undo.into_iter().rev() {
                    match record {
                        Undo::Inserted(idx) => {
                            self.variables.remove(idx);
                        }
                        Undo::Replaced(idx, old) => self.variables[idx] = old,
                        Undo::Removed(idx, var) => self.variables.insert(idx, var),
                    }
                }
            }
            None => {
                warn!("no forward apply recorded, undoing from change records");
                self.undo_from_changes(changes);
            }
        }
    }

    /// Best-effort undo for changes that were never applied forward here.
    fn undo_from_changes(&mut self, changes: &[ShaderVariableChange]) {
        for change in changes.iter().rev() {
            if !change.after.name.is_empty() {
                let idx = self.position(&change.after.name);
                match (idx, change.before.name.is_empty()) {
                    (Some(idx), true) => {
                        self.variables.remove(idx);
                    }
                    (Some(idx), false) => self.variables[idx] = change.before.clone(),
                    (None, _) => warn!(name = %change.after.name, "undoing change of unknown variable"),
                }
            } else if !change.before.name.is_empty() {
                self.variables.insert(0, change.before.clone());
            }
        }
    }

    fn begin_update(&mut self) {
        self.update_counter += 1;
        self.changed.clear();
    }

    fn touch(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        self.changed.insert(name.to_string());
        self.last_update.insert(name.to_string(), self.update_counter);
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }
}
