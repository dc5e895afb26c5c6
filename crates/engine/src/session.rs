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

//! One shader debugging session.
//!
//! A [`DebugSession`] owns everything a debug view needs: the state store
//! (once populated), the live variable registry, breakpoints, watches and
//! accessed resources. States are populated in the background when the
//! session opens; cursor commands issued before they arrive are queued and
//! replayed in order once they do.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use sdb_common::types::{
    BreakpointLocation, Disassembly, LineColumnInfo, ShaderBindIndex, ShaderDebugState,
    ShaderDebugTrace, ShaderEvents, TraceHandle, VarType,
};
use tracing::{debug, error, info, warn};

use crate::{
    display::{self, DisplayNode},
    format::tooltip_table,
    AccessedResourceTracker, BreakpointTable, DebugError, DebugResult, DebugStateStore,
    EngineConfig, Population, PopulationProgress, ReplayController, Resolved,
    SourceMappingResolver, StepMode, SteppingEngine, VariableRegistry, Watch, WatchEngine,
};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// States are still being received
    Loading(PopulationProgress),
    /// States are available, commands run immediately
    Ready,
    /// Population failed or was cancelled
    Failed(DebugError),
}

/// A cursor command, queued while states are loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    /// Source or instruction step
    Step {
        /// Direction
        forward: bool,
        /// Granularity
        mode: StepMode,
    },
    /// Single state transition, ignoring source lines
    StepInstruction {
        /// Direction
        forward: bool,
    },
    /// Run until a target instruction, a breakpoint, one of `stop_on` or the
    /// trace boundary
    Run {
        /// Instructions that stop the run, including on the starting state
        targets: HashSet<u32>,
        /// Direction
        forward: bool,
        /// Events that stop the run
        stop_on: ShaderEvents,
    },
    /// Run to a location through a temporary breakpoint
    RunToCursor {
        /// Target location
        target: BreakpointLocation,
        /// Direction
        forward: bool,
    },
    /// Run until a resource binding is accessed
    RunToResourceAccess {
        /// Direction
        forward: bool,
        /// Handle type
        var_type: VarType,
        /// Binding, array element ignored
        bind: ShaderBindIndex,
    },
    /// Jump to a step index
    SetCurrentStep(u32),
}

struct Loaded {
    store: DebugStateStore,
    registry: VariableRegistry,
    tracker: AccessedResourceTracker,
}

impl Loaded {
    fn new(store: DebugStateStore) -> Self {
        let mut registry = VariableRegistry::new();
        let mut tracker = AccessedResourceTracker::new();
        registry.apply_forward(&store.current().changes);
        tracker.record(store.current());
        Self { store, registry, tracker }
    }

    fn resolver(&self) -> SourceMappingResolver<'_> {
        let locals = self
            .store
            .instruction_info(self.store.current().next_instruction)
            .map(|info| info.source_vars.as_slice())
            .unwrap_or(&[]);
        SourceMappingResolver::new(self.store.trace(), &self.registry, locals)
    }
}

/// A shader debugging session over one trace.
pub struct DebugSession {
    config: EngineConfig,
    controller: Arc<dyn ReplayController>,
    handle: TraceHandle,
    disassembly: Disassembly,
    /// Trace metadata until the store takes ownership of it
    trace: Option<ShaderDebugTrace>,
    population: Option<Population>,
    loaded: Option<Loaded>,
    failure: Option<DebugError>,
    breakpoints: BreakpointTable,
    watches: WatchEngine,
    pending: VecDeque<PendingCommand>,
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("handle", &self.handle)
            .field("status", &self.status())
            .field("breakpoints", &self.breakpoints.len())
            .field("watches", &self.watches.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl DebugSession {
    /// Open a session and start populating its states.
    ///
    /// `trace` is `None` when the replay side could not produce a debugger for
    /// the shader; the session is then unavailable.
    pub fn open(
        trace: Option<ShaderDebugTrace>,
        disassembly: Disassembly,
        controller: Arc<dyn ReplayController>,
        config: EngineConfig,
    ) -> DebugResult<Self> {
        let Some(trace) = trace else {
            error!("replay controller produced no debug trace");
            return Err(DebugError::SessionUnavailable(
                "the shader could not be debugged".to_string(),
            ));
        };
        let handle = trace.handle;
        let population =
            Population::start(controller.clone(), handle, config.population_log_interval)?;
        info!(%handle, source = trace.has_source_info(), "debug session opened");

        Ok(Self {
            config,
            controller,
            handle,
            disassembly,
            trace: Some(trace),
            population: Some(population),
            loaded: None,
            failure: None,
            breakpoints: BreakpointTable::new(),
            watches: WatchEngine::new(),
            pending: VecDeque::new(),
        })
    }

    /// Handle of the trace being debugged.
    pub fn handle(&self) -> TraceHandle {
        self.handle
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Trace metadata.
    pub fn trace(&self) -> Option<&ShaderDebugTrace> {
        match &self.loaded {
            Some(loaded) => Some(loaded.store.trace()),
            None => self.trace.as_ref(),
        }
    }

    /// Disassembly listing of the shader.
    pub fn disassembly(&self) -> &Disassembly {
        &self.disassembly
    }

    /// Current lifecycle status, without checking for new results.
    pub fn status(&self) -> SessionStatus {
        if let Some(err) = &self.failure {
            return SessionStatus::Failed(err.clone());
        }
        match &self.population {
            Some(population) => SessionStatus::Loading(population.progress()),
            None => SessionStatus::Ready,
        }
    }

    /// Check for a finished population and take its result.
    pub fn poll(&mut self) -> SessionStatus {
        if let Some(result) = self.population.as_mut().and_then(Population::try_take) {
            self.population = None;
            self.finish_loading(result);
        }
        self.status()
    }

    /// Wait until states are available.
    pub async fn wait_ready(&mut self) -> DebugResult<()> {
        if let Some(population) = self.population.as_mut() {
            let result = population.wait().await;
            self.population = None;
            self.finish_loading(result);
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Cancel a population still in flight.
    pub fn cancel(&self) {
        if let Some(population) = &self.population {
            info!(handle = %self.handle, "cancelling population");
            population.cancel();
        }
    }

    /// Whether states are available.
    pub fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    fn finish_loading(&mut self, result: DebugResult<Vec<ShaderDebugState>>) {
        let trace = self.trace.take().unwrap_or_default();
        let store = result.and_then(|states| {
            DebugStateStore::new(trace, states).map_err(|err| {
                // the states were ours, so is the handle
                self.controller.free_trace(self.handle);
                err
            })
        });

        match store {
            Ok(store) => {
                info!(handle = %self.handle, states = store.len(), "debug states ready");
                self.loaded = Some(Loaded::new(store));
                self.refresh_watches();

                let pending = std::mem::take(&mut self.pending);
                for command in pending {
                    debug!(?command, "replaying deferred command");
                    self.execute(command);
                }
            }
            Err(err) => {
                error!(handle = %self.handle, %err, "debug session failed");
                if !self.pending.is_empty() {
                    warn!(count = self.pending.len(), "dropping deferred commands");
                    self.pending.clear();
                }
                self.failure = Some(err);
            }
        }
    }

    fn refresh_watches(&mut self) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let resolver = loaded.resolver();
        self.watches.evaluate_all(|path| resolver.resolve(path), self.config.int_view);
    }

    /// Run a cursor command now, or queue it while states are loading.
    ///
    /// Returns whether the cursor moved; deferred commands return `false`.
    pub fn execute(&mut self, command: PendingCommand) -> bool {
        if self.failure.is_some() {
            warn!(?command, "ignoring command on failed session");
            return false;
        }
        let Some(loaded) = self.loaded.as_mut() else {
            debug!(?command, "states loading, deferring command");
            self.pending.push_back(command);
            return false;
        };

        let saved = match &command {
            PendingCommand::RunToCursor { target, .. } => {
                Some(self.breakpoints.insert_temporary(*target))
            }
            _ => None,
        };

        let source_stepping = self.config.source_debugging
            && !matches!(command, PendingCommand::StepInstruction { .. });
        let mut engine = SteppingEngine::new(
            &mut loaded.store,
            &mut loaded.registry,
            &mut loaded.tracker,
            &self.breakpoints,
            source_stepping,
        );
        let moved = match &command {
            PendingCommand::Step { forward, mode } => engine.step(*forward, *mode),
            PendingCommand::StepInstruction { forward } => engine.step(*forward, StepMode::Into),
            PendingCommand::Run { targets, forward, stop_on } => {
                engine.run_to(targets, *forward, *stop_on)
            }
            PendingCommand::RunToCursor { target, forward } => {
                // an instruction target also stops a run that starts on it
                let targets = match target {
                    BreakpointLocation::Instruction { index } => HashSet::from([*index]),
                    BreakpointLocation::Source { .. } => HashSet::new(),
                };
                engine.run_to(&targets, *forward, ShaderEvents::empty())
            }
            PendingCommand::RunToResourceAccess { forward, var_type, bind } => {
                engine.run_to_resource_access(*forward, *var_type, *bind)
            }
            PendingCommand::SetCurrentStep(step) => engine.set_current_step(*step),
        };

        if let Some(saved) = saved {
            self.breakpoints.restore(saved);
        }
        debug!(?command, moved, step = ?self.current_step(), "command executed");
        self.refresh_watches();
        moved
    }

    /// Step in one direction.
    pub fn step(&mut self, forward: bool, mode: StepMode) -> bool {
        self.execute(PendingCommand::Step { forward, mode })
    }

    /// Move exactly one state.
    pub fn step_instruction(&mut self, forward: bool) -> bool {
        self.execute(PendingCommand::StepInstruction { forward })
    }

    /// Run until the next instruction is one of `targets`, a breakpoint, or an
    /// event in `stop_on`. Targets are checked on the starting state too.
    pub fn run_to(
        &mut self,
        targets: impl IntoIterator<Item = u32>,
        forward: bool,
        stop_on: ShaderEvents,
    ) -> bool {
        let targets = targets.into_iter().collect();
        self.execute(PendingCommand::Run { targets, forward, stop_on })
    }

    /// Run forward until a breakpoint or the end of the trace.
    pub fn run_forward(&mut self) -> bool {
        self.run_to([], true, ShaderEvents::empty())
    }

    /// Run backward until a breakpoint or the start of the trace.
    pub fn run_backward(&mut self) -> bool {
        self.run_to([], false, ShaderEvents::empty())
    }

    /// Run until a sample, load or gather.
    pub fn run_to_sample(&mut self, forward: bool) -> bool {
        self.run_to([], forward, ShaderEvents::SAMPLE_LOAD_GATHER)
    }

    /// Run until a NaN or infinity is produced.
    pub fn run_to_nan_or_inf(&mut self, forward: bool) -> bool {
        self.run_to([], forward, ShaderEvents::GENERATED_NAN_OR_INF)
    }

    /// Run to a location through a temporary breakpoint; the breakpoint set is
    /// left as it was.
    pub fn run_to_cursor(&mut self, target: BreakpointLocation, forward: bool) -> bool {
        self.execute(PendingCommand::RunToCursor { target, forward })
    }

    /// Run to the first instruction at or after a 0-based disassembly line.
    pub fn run_to_disassembly_line(&mut self, line: usize, forward: bool) -> DebugResult<bool> {
        let (_, index) = self
            .disassembly
            .next_instruction_line(line)
            .ok_or_else(|| DebugError::NotFound(format!("no instruction at or after line {line}")))?;
        Ok(self.run_to_cursor(BreakpointLocation::Instruction { index }, forward))
    }

    /// Run until a state accesses the resource bound at `bind`.
    pub fn run_to_resource_access(
        &mut self,
        forward: bool,
        var_type: VarType,
        bind: ShaderBindIndex,
    ) -> bool {
        self.execute(PendingCommand::RunToResourceAccess { forward, var_type, bind })
    }

    /// Move to the first state at or past a step index.
    pub fn set_current_step(&mut self, step: u32) -> bool {
        self.execute(PendingCommand::SetCurrentStep(step))
    }

    /// Step index of the current state.
    pub fn current_step(&self) -> Option<u32> {
        self.current_state().map(|s| s.step_index)
    }

    /// The current state.
    pub fn current_state(&self) -> Option<&ShaderDebugState> {
        self.loaded.as_ref().map(|l| l.store.current())
    }

    /// The state store, once populated.
    pub fn store(&self) -> Option<&DebugStateStore> {
        self.loaded.as_ref().map(|l| &l.store)
    }

    /// Source range of the current instruction.
    pub fn current_line(&self) -> Option<LineColumnInfo> {
        self.loaded.as_ref().map(|l| l.store.line_of(l.store.current()))
    }

    /// Whether the cursor is on the last state.
    pub fn is_finished(&self) -> bool {
        self.loaded.as_ref().is_some_and(|l| l.store.is_last())
    }

    /// Callstack of the current state, outermost first.
    pub fn callstack(&self) -> &[String] {
        self.current_state().map(|s| s.callstack.as_slice()).unwrap_or(&[])
    }

    /// Switch the default rendering of untyped values between float and int.
    pub fn set_int_view(&mut self, int_view: bool) {
        self.config.int_view = int_view;
        self.refresh_watches();
    }

    // breakpoints

    /// Parse `@<instruction>` or `@<file>:<line>` against this trace's source files.
    pub fn parse_breakpoint(&self, text: &str) -> eyre::Result<BreakpointLocation> {
        let files = self.trace().map(|t| t.source_files.as_slice()).unwrap_or(&[]);
        BreakpointLocation::parse_with_files(text, files)
    }

    /// Toggle a breakpoint, returning whether it is now set.
    pub fn toggle_breakpoint(&mut self, loc: BreakpointLocation) -> bool {
        let set = self.breakpoints.toggle(loc);
        debug!(%loc, set, "toggled breakpoint");
        set
    }

    /// Toggle an instruction breakpoint.
    pub fn toggle_breakpoint_on_instruction(&mut self, instruction: u32) -> bool {
        self.toggle_breakpoint(BreakpointLocation::Instruction { index: instruction })
    }

    /// Toggle a breakpoint on the first instruction at or after a 0-based
    /// disassembly line. Returns the instruction and whether it is now set.
    pub fn toggle_breakpoint_on_disassembly_line(&mut self, line: usize) -> Option<(u32, bool)> {
        let (_, instruction) = self.disassembly.next_instruction_line(line)?;
        Some((instruction, self.toggle_breakpoint_on_instruction(instruction)))
    }

    /// Add a breakpoint, returning whether it is new.
    pub fn add_breakpoint(&mut self, loc: BreakpointLocation) -> bool {
        self.breakpoints.add(loc)
    }

    /// Remove a breakpoint, returning whether it existed.
    pub fn remove_breakpoint(&mut self, loc: BreakpointLocation) -> bool {
        self.breakpoints.remove(loc)
    }

    /// Remove every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Sorted breakpoint locations.
    pub fn breakpoints(&self) -> Vec<BreakpointLocation> {
        self.breakpoints.list()
    }

    // watches and variables

    /// Add a watch and evaluate it when states are available.
    pub fn add_watch(&mut self, expression: &str) -> usize {
        let row = self.watches.add(expression);
        self.refresh_watches();
        row
    }

    /// Remove a watch row.
    pub fn remove_watch(&mut self, row: usize) -> Option<Watch> {
        let removed = self.watches.remove(row);
        self.refresh_watches();
        removed
    }

    /// Edit a watch row, including the trailing blank row.
    pub fn edit_watch(&mut self, row: usize, text: &str) -> Option<usize> {
        let row = self.watches.edit_row(row, text);
        self.refresh_watches();
        row
    }

    /// Watches and their latest evaluation.
    pub fn watches(&self) -> &[Watch] {
        self.watches.rows()
    }

    /// Resolve a variable path at the current state.
    pub fn resolve(&self, path: &str) -> DebugResult<Resolved> {
        let loaded = self.loaded.as_ref().ok_or_else(|| {
            DebugError::NotFound("debug states are still loading".to_string())
        })?;
        loaded.resolver().resolve(path)
    }

    /// Tooltip table for a variable path, empty when it does not resolve.
    pub fn tooltip(&self, path: &str) -> Option<String> {
        let var = self.resolve(path).ok()?.apply_swizzle();
        tooltip_table(&var)
    }

    /// Source variables pane.
    pub fn source_variables(&self) -> Vec<DisplayNode> {
        self.loaded
            .as_ref()
            .map(|l| display::source_variables(&l.resolver(), self.config.int_view))
            .unwrap_or_default()
    }

    /// Constants and resources pane.
    pub fn constants(&self) -> Vec<DisplayNode> {
        self.loaded
            .as_ref()
            .map(|l| display::constants(&l.resolver(), self.config.int_view))
            .unwrap_or_default()
    }

    /// Raw debugger variables pane.
    pub fn debug_variables(&self) -> Vec<DisplayNode> {
        self.loaded
            .as_ref()
            .map(|l| {
                display::debug_variables(&l.registry, &l.store.trace().inputs, self.config.int_view)
            })
            .unwrap_or_default()
    }

    /// Live debugger variables.
    pub fn registry(&self) -> Option<&VariableRegistry> {
        self.loaded.as_ref().map(|l| &l.registry)
    }

    /// Resources accessed so far.
    pub fn accessed_resources(&self) -> Option<&AccessedResourceTracker> {
        self.loaded.as_ref().map(|l| &l.tracker)
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        // while loading, the population owns the handle
        if self.loaded.is_some() {
            info!(handle = %self.handle, "closing debug session");
            self.controller.free_trace(self.handle);
        }
    }
}
