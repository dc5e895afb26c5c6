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

//! Breakpoint set consulted while stepping.

use std::collections::HashSet;

use sdb_common::types::BreakpointLocation;

/// Set of source-line and instruction breakpoints.
///
/// Keys are `(file, line)` pairs, with file `-1` for instruction breakpoints.
/// Insertion and removal are idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointTable {
    breakpoints: HashSet<(i32, u32)>,
}

impl BreakpointTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint, returning whether it was newly inserted
    pub fn add(&mut self, loc: BreakpointLocation) -> bool {
        self.breakpoints.insert(loc.key())
    }

    /// Remove a breakpoint, returning whether it existed
    pub fn remove(&mut self, loc: BreakpointLocation) -> bool {
        self.breakpoints.remove(&loc.key())
    }

    /// Toggle a breakpoint, returning whether it is now set
    pub fn toggle(&mut self, loc: BreakpointLocation) -> bool {
        if self.breakpoints.remove(&loc.key()) {
            false
        } else {
            self.breakpoints.insert(loc.key());
            true
        }
    }

    /// Insert a temporary breakpoint, whether or not one is already set there.
    ///
    /// Returns the previous set so the caller can [`restore`](Self::restore) it.
    pub fn insert_temporary(&mut self, loc: BreakpointLocation) -> Self {
        let saved = self.clone();
        self.breakpoints.insert(loc.key());
        saved
    }

    /// Replace the whole set with a previously saved one
    pub fn restore(&mut self, saved: Self) {
        *self = saved;
    }

    /// Check if a breakpoint exists at the given location
    pub fn contains(&self, loc: &BreakpointLocation) -> bool {
        self.breakpoints.contains(&loc.key())
    }

    /// Whether an instruction breakpoint is set on `instruction`
    pub fn has_instruction(&self, instruction: u32) -> bool {
        self.breakpoints.contains(&(-1, instruction))
    }

    /// Whether a source breakpoint is set on `line` of file `file_index`
    pub fn has_source_line(&self, file_index: i32, line: u32) -> bool {
        file_index >= 0 && self.breakpoints.contains(&(file_index, line))
    }

    /// Remove every breakpoint
    pub fn clear(&mut self) {
        self.breakpoints.clear();
    }

    /// All breakpoints, sources first (by file and line) then instructions
    pub fn list(&self) -> Vec<BreakpointLocation> {
        let mut sorted: Vec<BreakpointLocation> =
            self.breakpoints.iter().copied().map(BreakpointLocation::from_key).collect();
        sorted.sort();
        sorted
    }

    /// Get breakpoint count
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Whether no breakpoint is set
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: BreakpointLocation = BreakpointLocation::Source { file_index: 0, line: 12 };
    const INST: BreakpointLocation = BreakpointLocation::Instruction { index: 7 };

    #[test]
    fn test_toggle_twice_is_identity() {
        let mut table = BreakpointTable::new();
        table.add(INST);
        let before = table.clone();

        assert!(table.toggle(SRC));
        assert!(table.contains(&SRC));
        assert!(!table.toggle(SRC));
        assert_eq!(table, before);

        assert!(!table.toggle(INST));
        assert!(table.toggle(INST));
        assert_eq!(table, before);
    }

    #[test]
    fn test_add_remove_idempotent() {
        let mut table = BreakpointTable::new();
        assert!(table.add(SRC));
        assert!(!table.add(SRC));
        assert_eq!(table.len(), 1);
        assert!(table.remove(SRC));
        assert!(!table.remove(SRC));
        assert!(table.is_empty());
    }

    #[test]
    fn test_temporary_does_not_remove_user_breakpoint() {
        let mut table = BreakpointTable::new();
        table.add(INST);
        let saved = table.insert_temporary(INST);
        assert!(table.has_instruction(7));
        table.restore(saved);
        assert!(table.has_instruction(7));

        let saved = table.insert_temporary(SRC);
        assert!(table.has_source_line(0, 12));
        table.restore(saved);
        assert!(!table.contains(&SRC));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_kinds_do_not_collide() {
        let mut table = BreakpointTable::new();
        table.add(BreakpointLocation::Instruction { index: 12 });
        assert!(table.has_instruction(12));
        assert!(!table.has_source_line(0, 12));
        assert!(!table.has_source_line(-1, 12));
    }

    #[test]
    fn test_list_sorted() {
        let mut table = BreakpointTable::new();
        table.add(INST);
        table.add(BreakpointLocation::Source { file_index: 1, line: 2 });
        table.add(SRC);
        table.add(BreakpointLocation::Instruction { index: 3 });
        assert_eq!(
            table.list(),
            vec![
                SRC,
                BreakpointLocation::Source { file_index: 1, line: 2 },
                BreakpointLocation::Instruction { index: 3 },
                INST,
            ]
        );
        table.clear();
        assert!(table.list().is_empty());
    }
}
