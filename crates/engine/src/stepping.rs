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

//! Bidirectional stepping over the debug state store.
//!
//! Every cursor move goes through [`SteppingEngine::move_forward`] or
//! [`SteppingEngine::move_backward`], which keep the variable registry and the
//! accessed-resource tracker in sync with the cursor.

use std::collections::HashSet;

use sdb_common::types::{LineColumnInfo, ShaderBindIndex, ShaderEvents, VarType};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{AccessedResourceTracker, BreakpointTable, DebugStateStore, VariableRegistry};

/// Granularity of a source-level step relative to function calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepMode {
    /// Stop on the next source line, entering calls
    Into,
    /// Stop on the next line in the same or a calling frame
    Over,
    /// Stop once the current frame has returned
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Breakpoint,
    Boundary,
    Line,
}

/// Moves the cursor of one debug session.
#[derive(Debug)]
pub struct SteppingEngine<'a> {
    store: &'a mut DebugStateStore,
    registry: &'a mut VariableRegistry,
    tracker: &'a mut AccessedResourceTracker,
    breakpoints: &'a BreakpointTable,
    source_stepping: bool,
}

impl<'a> SteppingEngine<'a> {
    /// Borrow the session parts a step touches.
    ///
    /// `source_stepping` enables line-level stepping; it only takes effect when
    /// the trace carries line information.
    pub fn new(
        store: &'a mut DebugStateStore,
        registry: &'a mut VariableRegistry,
        tracker: &'a mut AccessedResourceTracker,
        breakpoints: &'a BreakpointTable,
        source_stepping: bool,
    ) -> Self {
        let source_stepping = source_stepping && store.trace().has_source_info();
        Self { store, registry, tracker, breakpoints, source_stepping }
    }

    /// Advance one state, applying its changes. Returns `false` at the last state.
    pub fn move_forward(&mut self) -> bool {
        if !self.store.advance() {
            return false;
        }
        let state = self.store.current();
        self.registry.apply_forward(&state.changes);
        self.tracker.record(state);
        trace!(cursor = self.store.cursor(), step = state.step_index, "moved forward");
        true
    }

    /// Retreat one state, undoing the changes of the state being left.
    /// Returns `false` at the first state.
    pub fn move_backward(&mut self) -> bool {
        if self.store.is_first() {
            return false;
        }
        self.registry.apply_backward(&self.store.current().changes);
        self.store.retreat();
        trace!(cursor = self.store.cursor(), "moved backward");
        true
    }

    fn move_once(&mut self, forward: bool) -> bool {
        if forward {
            self.move_forward()
        } else {
            self.move_backward()
        }
    }

    fn at_boundary(&self, forward: bool) -> bool {
        if forward {
            self.store.is_last()
        } else {
            self.store.is_first()
        }
    }

    fn line_at(&self, index: usize) -> LineColumnInfo {
        self.store.line_at(index)
    }

    fn instruction_breakpoint_hit(&self) -> bool {
        self.breakpoints.has_instruction(self.store.current().next_instruction)
    }

    /// A source breakpoint matches when execution enters its line.
    fn source_breakpoint_hit(&self) -> bool {
        let cursor = self.store.cursor();
        let line = self.line_at(cursor);
        if !self.breakpoints.has_source_line(line.file_index, line.line_start) {
            return false;
        }
        cursor == 0 || !self.line_at(cursor - 1).same_lines(&line)
    }

    fn breakpoint_hit(&self) -> bool {
        self.instruction_breakpoint_hit() || self.source_breakpoint_hit()
    }

    /// Step in one direction. Returns `false` if the cursor was already at the boundary.
    ///
    /// Without source information a step is a single state transition whatever
    /// the mode.
    pub fn step(&mut self, forward: bool, mode: StepMode) -> bool {
        if self.at_boundary(forward) {
            return false;
        }
        if !self.source_stepping {
            return self.move_once(forward);
        }

        let start_line = self.line_at(self.store.cursor());
        let start_stack = self.store.current().callstack.clone();

        let reason = loop {
            if !self.move_once(forward) {
                break StopReason::Boundary;
            }
            if self.instruction_breakpoint_hit() {
                break StopReason::Breakpoint;
            }

            let line = self.line_at(self.store.cursor());
            if !line.has_source() {
                continue;
            }
            if self.source_breakpoint_hit() {
                break StopReason::Breakpoint;
            }
            if line.same_lines(&start_line) {
                continue;
            }

            let stack = &self.store.current().callstack;
            let prefix_matches = stack.iter().zip(start_stack.iter()).all(|(a, b)| a == b);
            let stop = match mode {
                StepMode::Into => true,
                StepMode::Out if !start_stack.is_empty() => {
                    stack.len() < start_stack.len() && prefix_matches
                }
                StepMode::Over | StepMode::Out => {
                    stack.len() <= start_stack.len() && prefix_matches
                }
            };
            if stop {
                break StopReason::Line;
            }
        };

        if !forward && reason == StopReason::Line {
            self.rewind_to_line_start();
        }

        debug!(
            forward,
            ?mode,
            ?reason,
            cursor = self.store.cursor(),
            step = self.store.current().step_index,
            "source step finished"
        );
        true
    }

    /// After a backward step lands on the last instruction of a line, keep
    /// going back to the first one.
    ///
    /// States count as the same line when their line/column mapping is identical
    /// and their call depth matches. In A-B-A inlining patterns this can walk
    /// past the start of the line into an earlier block of the same mapping.
    fn rewind_to_line_start(&mut self) {
        while !self.store.is_first() {
            let cursor = self.store.cursor();
            let same_line = self.line_at(cursor - 1) == self.line_at(cursor)
                && self.store.previous().callstack.len() == self.store.current().callstack.len();
            if !same_line {
                break;
            }
            self.move_backward();
            if self.instruction_breakpoint_hit() {
                break;
            }
        }
    }

    /// Run one state at a time until a target instruction, an event or a breakpoint.
    ///
    /// A state whose next instruction is in `targets` stops the run, including
    /// the starting state. Events in `stop_on` and breakpoints are ignored on
    /// the starting state so a run can leave the location it stopped at.
    pub fn run_to(&mut self, targets: &HashSet<u32>, forward: bool, stop_on: ShaderEvents) -> bool {
        let start = self.store.cursor();
        let mut first_step = true;

        while !self.at_boundary(forward) {
            let state = self.store.current();
            if targets.contains(&state.next_instruction) {
                break;
            }
            if !first_step && state.flags.intersects(stop_on) {
                break;
            }
            if !first_step && self.breakpoint_hit() {
                break;
            }
            first_step = false;
            self.move_once(forward);
        }

        debug!(forward, cursor = self.store.cursor(), "run finished");
        self.store.cursor() != start
    }

    /// Run one state at a time until a state writes a handle of `var_type`
    /// bound at `bind` (ignoring the array element), or a breakpoint is hit.
    pub fn run_to_resource_access(
        &mut self,
        forward: bool,
        var_type: VarType,
        bind: ShaderBindIndex,
    ) -> bool {
        let start = self.store.cursor();
        let mut first_step = true;

        while !self.at_boundary(forward) {
            if !first_step && self.breakpoint_hit() {
                break;
            }
            first_step = false;
            self.move_once(forward);

            let accessed = self.store.current().changes.iter().any(|change| {
                change.after.var_type == var_type
                    && change.after.bind_index().is_some_and(|b| b.same_binding(&bind))
            });
            if accessed {
                break;
            }
        }

        debug!(forward, %bind, cursor = self.store.cursor(), "run to resource access finished");
        self.store.cursor() != start
    }

    /// Move state by state until the step index reaches `step_index`.
    ///
    /// The direction is chosen once; the cursor stops on the first state at or
    /// past the target, or at a boundary.
    pub fn set_current_step(&mut self, step_index: u32) -> bool {
        let start = self.store.cursor();
        let current = self.store.current().step_index;
        let forward = current < step_index;

        loop {
            let here = self.store.current().step_index;
            let reached = if forward { here >= step_index } else { here <= step_index };
            if reached || !self.move_once(forward) {
                break;
            }
        }
        self.store.cursor() != start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdb_common::{
        test_utils::TraceBuilder,
        types::{BreakpointLocation, LineColumnInfo, ShaderVariable, ShaderVariableChange},
    };

    struct Parts {
        store: DebugStateStore,
        registry: VariableRegistry,
        tracker: AccessedResourceTracker,
        breakpoints: BreakpointTable,
    }

    impl Parts {
        fn new(builder: TraceBuilder) -> Self {
            let (trace, states) = builder.build();
            let store = DebugStateStore::new(trace, states).unwrap();
            let mut registry = VariableRegistry::new();
            registry.apply_forward(&store.current().changes);
            Self {
                store,
                registry,
                tracker: AccessedResourceTracker::new(),
                breakpoints: BreakpointTable::new(),
            }
        }

        fn engine(&mut self, source: bool) -> SteppingEngine<'_> {
            SteppingEngine::new(
                &mut self.store,
                &mut self.registry,
                &mut self.tracker,
                &self.breakpoints,
                source,
            )
        }
    }

    /// Lines: 0 -> 1, 1 -> 1, 2 -> 2, 3 -> unmapped, 4 -> 3, 5 -> 3.
    fn lines_trace() -> TraceBuilder {
        let mut builder = TraceBuilder::new()
            .source_file("main.hlsl")
            .instructions(0..2, LineColumnInfo::line(0, 1))
            .instruction(2, LineColumnInfo::line(0, 2))
            .instruction(3, LineColumnInfo::unmapped())
            .instructions(4..6, LineColumnInfo::line(0, 3));
        for i in 0..6 {
            builder = builder.state(i, &["main"], vec![]);
        }
        builder
    }

    #[test]
    fn test_instruction_stepping_without_source() {
        let mut parts = Parts::new(lines_trace());
        let mut engine = parts.engine(false);
        assert!(engine.step(true, StepMode::Over));
        assert_eq!(parts.store.cursor(), 1);
    }

    #[test]
    fn test_source_step_skips_same_line_and_unmapped() {
        let mut parts = Parts::new(lines_trace());
        let mut engine = parts.engine(true);
        assert!(engine.step(true, StepMode::Into));
        assert_eq!(engine.store.cursor(), 2);
        // instruction 3 has no mapping and is skipped
        assert!(engine.step(true, StepMode::Into));
        assert_eq!(engine.store.cursor(), 4);
        // no further line: runs into the boundary
        assert!(engine.step(true, StepMode::Into));
        assert_eq!(engine.store.cursor(), 5);
        assert!(!engine.step(true, StepMode::Into));
    }

    #[test]
    fn test_backward_source_step_lands_on_line_start() {
        let mut parts = Parts::new(lines_trace());
        let mut engine = parts.engine(true);
        engine.set_current_step(5);
        assert!(engine.step(false, StepMode::Into));
        assert_eq!(engine.store.cursor(), 2);
        assert!(engine.step(false, StepMode::Into));
        assert_eq!(engine.store.cursor(), 0);
        assert!(!engine.step(false, StepMode::Into));
    }

    #[test]
    fn test_instruction_breakpoint_stops_source_step() {
        let mut parts = Parts::new(lines_trace());
        parts.breakpoints.add(BreakpointLocation::Instruction { index: 1 });
        let mut engine = parts.engine(true);
        assert!(engine.step(true, StepMode::Over));
        assert_eq!(engine.store.cursor(), 1);
    }

    #[test]
    fn test_source_breakpoint_matches_on_line_entry() {
        let mut parts = Parts::new(lines_trace());
        parts.breakpoints.add(BreakpointLocation::Source { file_index: 0, line: 3 });
        let mut engine = parts.engine(true);
        assert!(engine.run_to(&HashSet::new(), true, ShaderEvents::empty()));
        assert_eq!(engine.store.cursor(), 4);
        // the second instruction of line 3 does not stop again
        assert!(engine.run_to(&HashSet::new(), true, ShaderEvents::empty()));
        assert_eq!(engine.store.cursor(), 5);
    }

    #[test]
    fn test_run_to_targets_and_events() {
        let builder = TraceBuilder::new()
            .state(0, &[], vec![])
            .flags(ShaderEvents::SAMPLE_LOAD_GATHER)
            .state(1, &[], vec![])
            .state(2, &[], vec![])
            .flags(ShaderEvents::SAMPLE_LOAD_GATHER)
            .state(3, &[], vec![])
            .flags(ShaderEvents::GENERATED_NAN_OR_INF);
        let mut parts = Parts::new(builder);
        let mut engine = parts.engine(true);

        // starting state's flags do not stop the run
        assert!(engine.run_to(&HashSet::new(), true, ShaderEvents::SAMPLE_LOAD_GATHER));
        assert_eq!(engine.store.cursor(), 2);

        assert!(engine.run_to(&HashSet::new(), true, ShaderEvents::GENERATED_NAN_OR_INF));
        assert_eq!(engine.store.cursor(), 3);

        let targets: HashSet<u32> = [1].into_iter().collect();
        assert!(engine.run_to(&targets, false, ShaderEvents::empty()));
        assert_eq!(engine.store.cursor(), 1);
        // already on the target: nothing to do
        assert!(!engine.run_to(&targets, false, ShaderEvents::empty()));
    }

    #[test]
    fn test_run_to_resource_access() {
        use sdb_common::types::DescriptorCategory;
        let bind = ShaderBindIndex::new(DescriptorCategory::ReadWriteResource, 1, 0);
        let other = ShaderBindIndex::new(DescriptorCategory::ReadWriteResource, 2, 0);
        let builder = TraceBuilder::new()
            .state(0, &[], vec![])
            .state(1, &[], vec![ShaderVariableChange::created(ShaderVariable::resource("o", true, other))])
            .state(2, &[], vec![])
            .state(3, &[], vec![ShaderVariableChange::created(ShaderVariable::resource(
                "u",
                true,
                ShaderBindIndex { array_element: 3, ..bind },
            ))])
            .state(4, &[], vec![]);
        let mut parts = Parts::new(builder);
        let mut engine = parts.engine(false);

        assert!(engine.run_to_resource_access(true, VarType::ReadWriteResource, bind));
        assert_eq!(engine.store.cursor(), 3);
        // nothing further: runs to the end
        assert!(engine.run_to_resource_access(true, VarType::ReadWriteResource, bind));
        assert_eq!(engine.store.cursor(), 4);
        assert_eq!(parts.tracker.records().len(), 2);
    }

    #[test]
    fn test_set_current_step_with_gaps() {
        let builder = TraceBuilder::new()
            .raw_state(sdb_common::types::ShaderDebugState { step_index: 0, ..Default::default() })
            .raw_state(sdb_common::types::ShaderDebugState { step_index: 5, ..Default::default() })
            .raw_state(sdb_common::types::ShaderDebugState { step_index: 10, ..Default::default() });
        let mut parts = Parts::new(builder);
        let mut engine = parts.engine(false);

        assert!(engine.set_current_step(7));
        assert_eq!(engine.store.current().step_index, 10);
        assert!(engine.set_current_step(3));
        assert_eq!(engine.store.current().step_index, 0);
        assert!(!engine.set_current_step(0));
        assert!(engine.set_current_step(99));
        assert!(engine.store.is_last());
    }

    #[test]
    fn test_registry_follows_cursor() {
        let var = |v: f32| ShaderVariable::scalar_f32("r0", v);
        let builder = TraceBuilder::new()
            .state(0, &[], vec![ShaderVariableChange::created(var(1.0))])
            .state(1, &[], vec![ShaderVariableChange::updated(var(1.0), var(2.0))])
            .state(2, &[], vec![ShaderVariableChange::removed(var(2.0))]);
        let mut parts = Parts::new(builder);
        let mut engine = parts.engine(false);

        engine.move_forward();
        assert_eq!(engine.registry.lookup("r0").map(|v| v.value.f32v(0)), Some(2.0));
        engine.move_forward();
        assert!(engine.registry.lookup("r0").is_none());
        engine.move_backward();
        engine.move_backward();
        assert_eq!(engine.registry.lookup("r0").map(|v| v.value.f32v(0)), Some(1.0));
    }
}
