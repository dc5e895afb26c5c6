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

//! Line-oriented debugger console.
//!
//! Every command appends to an output buffer which the caller drains with
//! [`Console::take_output`] after each line.

use std::collections::VecDeque;

use eyre::{bail, eyre, Result};
use sdb_engine::{display::DisplayNode, DebugSession, StepMode, WatchNode, WatchVarState};
use tracing::debug;

/// Maximum number of output lines kept between drains
const MAX_OUTPUT_LINES: usize = 10_000;
/// Maximum number of commands kept in history
const MAX_COMMAND_HISTORY: usize = 100;

/// What the caller should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleResponse {
    /// Keep reading commands
    Handled,
    /// Leave the debugger
    Exit,
}

/// Console bound to a ready debug session
pub struct Console<'s> {
    session: &'s mut DebugSession,
    output: VecDeque<String>,
    history: VecDeque<String>,
}

impl<'s> Console<'s> {
    /// Create a console and print the welcome banner
    pub fn new(session: &'s mut DebugSession) -> Self {
        let mut console = Self { session, output: VecDeque::new(), history: VecDeque::new() };
        console.add_output(&format!("SDB Shader Debugger v{}", env!("CARGO_PKG_VERSION")));
        console.add_output("Type 'help' for available commands");
        console.show_location();
        console
    }

    /// Add a line to the output
    pub fn add_output(&mut self, line: &str) {
        if self.output.len() >= MAX_OUTPUT_LINES {
            self.output.pop_front();
        }
        self.output.push_back(line.to_string());
    }

    /// Drain the pending output
    pub fn take_output(&mut self) -> Vec<String> {
        self.output.drain(..).collect()
    }

    /// Execute a command
    pub fn execute_command(&mut self, command: &str) -> ConsoleResponse {
        debug!("Executing command: {command}");

        if !command.trim().is_empty() && self.history.back().is_none_or(|last| last != command) {
            if self.history.len() >= MAX_COMMAND_HISTORY {
                self.history.pop_front();
            }
            self.history.push_back(command.to_string());
        }

        match command.trim() {
            "" => {}
            "quit" | "q" | "exit" => {
                self.add_output("Exiting debugger...");
                return ConsoleResponse::Exit;
            }
            "help" | "h" => self.show_help(),
            "history" => self.show_history(),
            cmd => {
                if let Err(e) = self.handle_debug_command(cmd) {
                    self.add_output(&format!("Error: {e}"));
                }
            }
        }

        ConsoleResponse::Handled
    }

    /// Handle debug commands
    fn handle_debug_command(&mut self, command: &str) -> Result<()> {
        let (cmd, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        let rest = rest.trim();

        match cmd {
            // stepping
            "step" | "s" => {
                let moved = self.session.step(true, StepMode::Into);
                self.moved(moved)
            }
            "next" | "n" => {
                let moved = self.session.step(true, StepMode::Over);
                self.moved(moved)
            }
            "finish" | "f" => {
                let moved = self.session.step(true, StepMode::Out);
                self.moved(moved)
            }
            "back" | "b" => {
                let mode = match rest {
                    "" | "over" => StepMode::Over,
                    "into" => StepMode::Into,
                    "out" => StepMode::Out,
                    other => bail!("Unknown step mode: {other}"),
                };
                let moved = self.session.step(false, mode);
                self.moved(moved)
            }
            "stepi" | "si" => {
                let moved = self.session.step_instruction(true);
                self.moved(moved)
            }
            "backi" | "bi" => {
                let moved = self.session.step_instruction(false);
                self.moved(moved)
            }
            "run" | "r" | "continue" | "c" => {
                let moved = self.session.run_forward();
                self.moved(moved)
            }
            "rrun" | "rr" => {
                let moved = self.session.run_backward();
                self.moved(moved)
            }
            "sample" => {
                let forward = parse_direction(rest)?;
                let moved = self.session.run_to_sample(forward);
                self.moved(moved)
            }
            "nan" => {
                let forward = parse_direction(rest)?;
                let moved = self.session.run_to_nan_or_inf(forward);
                self.moved(moved)
            }
            "cursor" => {
                if rest.is_empty() {
                    bail!("Usage: cursor <disassembly line | @location>");
                }
                let moved = if rest.starts_with('@') {
                    let loc = self.session.parse_breakpoint(rest)?;
                    self.session.run_to_cursor(loc, true)
                } else {
                    let line = rest.parse::<usize>().map_err(|e| eyre!("Invalid line: {e}"))?;
                    self.session.run_to_disassembly_line(line, true)?
                };
                self.moved(moved)
            }
            "goto" => {
                let step = rest.parse::<u32>().map_err(|_| eyre!("Usage: goto <step>"))?;
                let moved = self.session.set_current_step(step);
                self.moved(moved)
            }

            // breakpoints
            "break" | "bp" => {
                if rest.is_empty() {
                    bail!("Usage: break <@location | disassembly line>");
                }
                if rest.starts_with('@') {
                    let loc = self.session.parse_breakpoint(rest)?;
                    let set = self.session.toggle_breakpoint(loc);
                    self.show_breakpoint_toggle(&loc.to_string(), set);
                } else {
                    let line = rest.parse::<usize>().map_err(|e| eyre!("Invalid line: {e}"))?;
                    let (instruction, set) = self
                        .session
                        .toggle_breakpoint_on_disassembly_line(line)
                        .ok_or_else(|| eyre!("No instruction at or after line {line}"))?;
                    self.show_breakpoint_toggle(&format!("@{instruction}"), set);
                }
            }
            "delete" | "d" => {
                if rest.is_empty() {
                    self.session.clear_breakpoints();
                    self.add_output("All breakpoints removed");
                } else {
                    let loc = self.session.parse_breakpoint(rest)?;
                    if self.session.remove_breakpoint(loc) {
                        self.add_output(&format!("Removed breakpoint {loc}"));
                    } else {
                        self.add_output(&format!("No breakpoint at {loc}"));
                    }
                }
            }
            "breaks" | "info" => self.show_breakpoints(),

            // watches
            "watch" | "w" => {
                if rest.is_empty() {
                    bail!("Usage: watch <path>[,cast]");
                }
                let row = self.session.add_watch(rest);
                self.add_output(&format!("Watch {} added", row + 1));
                self.show_watches();
            }
            "unwatch" => {
                let row = rest.parse::<usize>().map_err(|_| eyre!("Usage: unwatch <n>"))?;
                match row.checked_sub(1).and_then(|row| self.session.remove_watch(row)) {
                    Some(watch) => self.add_output(&format!("Removed watch {}", watch.expression)),
                    None => bail!("No watch {row}"),
                }
            }
            "watches" => self.show_watches(),
            "print" | "p" => {
                if rest.is_empty() {
                    bail!("Usage: print <path>");
                }
                match self.session.tooltip(rest) {
                    Some(table) => {
                        for line in table.lines() {
                            self.add_output(line);
                        }
                    }
                    None => {
                        let resolved = self.session.resolve(rest)?;
                        self.add_output(&format!("{rest}: {}", resolved.var.type_name()));
                    }
                }
            }

            // views
            "vars" => {
                let nodes = self.session.debug_variables();
                self.show_tree("Variables", &nodes);
            }
            "constants" => {
                let nodes = self.session.constants();
                self.show_tree("Constants & Resources", &nodes);
            }
            "source" | "locals" => {
                let nodes = self.session.source_variables();
                self.show_tree("Source Variables", &nodes);
            }
            "resources" => self.show_resources(rest == "step")?,
            "access" => {
                let mut parts = rest.split_whitespace();
                let forward = parse_direction(parts.next().unwrap_or_default())?;
                let index = parts
                    .next()
                    .and_then(|i| i.parse::<usize>().ok())
                    .ok_or_else(|| eyre!("Usage: access <next|prev> <index>"))?;
                let (var_type, binding) = {
                    let tracker = self
                        .session
                        .accessed_resources()
                        .ok_or_else(|| eyre!("Debug states are still loading"))?;
                    let record = tracker
                        .records()
                        .get(index)
                        .ok_or_else(|| eyre!("No accessed resource {index}"))?;
                    (record.var_type, record.binding)
                };
                let moved = self.session.run_to_resource_access(forward, var_type, binding);
                self.moved(moved)
            }
            "where" | "bt" => self.show_location(),
            "intview" => {
                let int_view = match rest {
                    "on" => true,
                    "off" => false,
                    _ => bail!("Usage: intview <on|off>"),
                };
                self.session.set_int_view(int_view);
                self.add_output(&format!("Integer view {rest}"));
            }

            _ => {
                self.add_output(&format!("Unknown command: {cmd}"));
                self.add_output("Type 'help' for available commands");
            }
        }

        Ok(())
    }

    fn moved(&mut self, moved: bool) {
        if !moved {
            self.add_output("Cursor did not move");
        }
        self.show_location();
    }

    /// Show the current step, instruction and source location
    fn show_location(&mut self) {
        let Some(state) = self.session.current_state() else {
            self.add_output("Debug states are still loading");
            return;
        };
        let step = state.step_index;
        let instruction = state.next_instruction;
        let callstack = state.callstack.join(" > ");

        let disasm = self
            .session
            .disassembly()
            .line_for_instruction(instruction)
            .and_then(|line| {
                self.session.disassembly().lines().get(line).map(|text| (line, text.trim()))
            })
            .map(|(line, text)| format!(" [{line}: {text}]"))
            .unwrap_or_default();
        let source = self
            .session
            .current_line()
            .filter(|info| info.has_source())
            .map(|info| {
                let file = self
                    .session
                    .trace()
                    .and_then(|t| t.source_file(info.file_index))
                    .map(str::to_string)
                    .unwrap_or_else(|| info.file_index.to_string());
                format!(" at {file}:{}", info.line_start)
            })
            .unwrap_or_default();
        let finished = if self.session.is_finished() { " (finished)" } else { "" };

        self.add_output(&format!("Step {step}, instruction {instruction}{disasm}{source}{finished}"));
        if !callstack.is_empty() {
            self.add_output(&format!("  in {callstack}"));
        }
    }

    fn show_breakpoint_toggle(&mut self, loc: &str, set: bool) {
        if set {
            self.add_output(&format!("Breakpoint set at {loc}"));
        } else {
            self.add_output(&format!("Breakpoint removed at {loc}"));
        }
    }

    fn show_breakpoints(&mut self) {
        let breakpoints = self.session.breakpoints();
        if breakpoints.is_empty() {
            self.add_output("No breakpoints");
            return;
        }
        let files = self.session.trace().map(|t| t.source_files.clone()).unwrap_or_default();
        self.add_output("Breakpoints:");
        for (i, loc) in breakpoints.iter().enumerate() {
            self.add_output(&format!("  {}: @{}", i + 1, loc.display(Some(&files))));
        }
    }

    fn show_watches(&mut self) {
        let lines: Vec<String> = self
            .session
            .watches()
            .iter()
            .enumerate()
            .flat_map(|(i, watch)| {
                let mut lines = Vec::new();
                render_watch(&watch.node, &format!("{}: ", i + 1), 1, &mut lines);
                lines
            })
            .collect();
        if lines.is_empty() {
            self.add_output("No watches");
            return;
        }
        self.add_output("Watches:");
        for line in lines {
            self.add_output(&line);
        }
    }

    fn show_tree(&mut self, title: &str, nodes: &[DisplayNode]) {
        self.add_output(&format!("{title}:"));
        if nodes.is_empty() {
            self.add_output("  (none)");
            return;
        }
        let mut lines = Vec::new();
        for node in nodes {
            render_node(node, 1, &mut lines);
        }
        for line in lines {
            self.add_output(&line);
        }
    }

    fn show_resources(&mut self, by_step: bool) -> Result<()> {
        let tracker =
            self.session.accessed_resources().ok_or_else(|| eyre!("Debug states are still loading"))?;
        let mut lines = Vec::new();
        if by_step {
            for group in tracker.by_step() {
                let names: Vec<&str> = group.resources.iter().map(|r| r.name.as_str()).collect();
                lines.push(format!("  step {}: {}", group.step, names.join(", ")));
            }
        } else {
            for (index, record) in tracker.records().iter().enumerate().rev() {
                let steps: Vec<String> = record.steps.iter().map(u32::to_string).collect();
                lines.push(format!(
                    "  [{index}] {} ({}): steps {}",
                    record.name,
                    record.binding,
                    steps.join(", ")
                ));
            }
        }

        self.add_output("Accessed resources:");
        if lines.is_empty() {
            self.add_output("  (none)");
        }
        for line in lines {
            self.add_output(&line);
        }
        Ok(())
    }

    /// Show help information
    fn show_help(&mut self) {
        self.add_output("Available commands:");
        self.add_output("");
        self.add_output("Stepping:");
        self.add_output("  step, s                 - Step into");
        self.add_output("  next, n                 - Step over");
        self.add_output("  finish, f               - Step out");
        self.add_output("  back [into|over|out]    - Step backward (default over)");
        self.add_output("  stepi, si / backi, bi   - Step one instruction");
        self.add_output("  run, r / rrun, rr       - Run to a breakpoint or the end/start");
        self.add_output("  sample [next|prev]      - Run to a sample, load or gather");
        self.add_output("  nan [next|prev]         - Run to a NaN or infinity");
        self.add_output("  cursor <line|@loc>      - Run to a disassembly line or location");
        self.add_output("  goto <step>             - Jump to a step");
        self.add_output("");
        self.add_output("Breakpoints:");
        self.add_output("  break <line|@loc>       - Toggle a breakpoint");
        self.add_output("  delete [@loc]           - Remove one or all breakpoints");
        self.add_output("  breaks                  - List breakpoints");
        self.add_output("");
        self.add_output("Inspection:");
        self.add_output("  watch <path>[,cast]     - Add a watch (casts: f d u x b o c i)");
        self.add_output("  unwatch <n>             - Remove watch n");
        self.add_output("  watches                 - Show watches");
        self.add_output("  print <path>            - Show a value");
        self.add_output("  vars / constants / source - Show variable panes");
        self.add_output("  resources [step]        - Show accessed resources");
        self.add_output("  access <next|prev> <i>  - Run to an access of resource i");
        self.add_output("  where                   - Show the current location");
        self.add_output("  intview <on|off>        - Render untyped values as integers");
        self.add_output("");
        self.add_output("Other:");
        self.add_output("  help, h                 - Show this help");
        self.add_output("  history                 - Show command history");
        self.add_output("  quit, q, exit           - Exit debugger");
        self.add_output("");
    }

    /// Show command history
    fn show_history(&mut self) {
        if self.history.is_empty() {
            self.add_output("No command history");
            return;
        }
        self.add_output("Command history:");
        let lines: Vec<String> =
            self.history.iter().enumerate().map(|(i, cmd)| format!("  {}: {cmd}", i + 1)).collect();
        for line in lines {
            self.add_output(&line);
        }
    }
}

fn parse_direction(text: &str) -> Result<bool> {
    match text {
        "" | "next" | "forward" => Ok(true),
        "prev" | "backward" => Ok(false),
        other => bail!("Unknown direction: {other}"),
    }
}

fn render_node(node: &DisplayNode, depth: usize, lines: &mut Vec<String>) {
    let marker = if node.changed { "*" } else { " " };
    let indent = "  ".repeat(depth);
    lines.push(format!("{marker}{indent}{} = {} ({})", node.name, node.value, node.type_name));
    for child in &node.children {
        render_node(child, depth + 1, lines);
    }
}

fn render_watch(node: &WatchNode, label: &str, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let line = match node.state {
        WatchVarState::Valid => {
            format!("{indent}{label}{} = {} ({})", node.name, node.value, node.type_name)
        }
        WatchVarState::Stale => format!("{indent}{label}{} = {} (stale)", node.name, node.value),
        WatchVarState::Invalid => format!(
            "{indent}{label}{} <error: {}>",
            node.name,
            node.error.as_deref().unwrap_or("invalid")
        ),
    };
    lines.push(line);
    for child in &node.children {
        render_watch(child, "", depth + 1, lines);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sdb_common::{test_utils::TraceBuilder, types::*};
    use sdb_engine::{EngineConfig, RecordedReplay};

    use super::*;

    async fn session() -> (DebugSession, Arc<RecordedReplay>) {
        let builder = TraceBuilder::new()
            .source_file("main.hlsl")
            .instruction(0, LineColumnInfo::line(0, 1))
            .instruction(1, LineColumnInfo::line(0, 2))
            .instruction(2, LineColumnInfo::line(0, 3))
            .state(0, &["main"], vec![])
            .state(
                1,
                &["main"],
                vec![ShaderVariableChange::created(ShaderVariable::vector_f32(
                    "r0",
                    &[1.0, 2.0, 3.0, 4.0],
                ))],
            )
            .state(2, &["main"], vec![])
            .flags(ShaderEvents::SAMPLE_LOAD_GATHER);
        let disassembly = builder.disassembly();
        let (trace, states) = builder.build();
        let replay = Arc::new(RecordedReplay::new(states, 2));
        let mut session =
            DebugSession::open(Some(trace), disassembly, replay.clone(), EngineConfig::default())
                .unwrap();
        session.wait_ready().await.unwrap();
        (session, replay)
    }

    fn contains(output: &[String], needle: &str) -> bool {
        output.iter().any(|line| line.contains(needle))
    }

    #[tokio::test]
    async fn test_banner_and_help() {
        let (mut session, _) = session().await;
        let mut console = Console::new(&mut session);
        let banner = console.take_output();
        assert!(contains(&banner, "SDB Shader Debugger"));
        assert!(contains(&banner, "Step 0, instruction 0"));

        assert_eq!(console.execute_command("help"), ConsoleResponse::Handled);
        assert!(contains(&console.take_output(), "Available commands"));
        assert_eq!(console.execute_command("quit"), ConsoleResponse::Exit);
    }

    #[tokio::test]
    async fn test_stepping_commands() {
        let (mut session, _) = session().await;
        let mut console = Console::new(&mut session);
        console.take_output();

        console.execute_command("next");
        let out = console.take_output();
        assert!(contains(&out, "Step 1, instruction 1"));
        assert!(contains(&out, "main.hlsl:2"));

        console.execute_command("back");
        assert!(contains(&console.take_output(), "Step 0"));

        console.execute_command("rrun");
        let out = console.take_output();
        assert!(contains(&out, "Cursor did not move"));

        console.execute_command("goto 2");
        assert!(contains(&console.take_output(), "(finished)"));
    }

    #[tokio::test]
    async fn test_breakpoint_commands() {
        let (mut session, _) = session().await;
        let mut console = Console::new(&mut session);
        console.take_output();

        console.execute_command("break @main.hlsl:2");
        assert!(contains(&console.take_output(), "Breakpoint set at @0:2"));
        console.execute_command("breaks");
        assert!(contains(&console.take_output(), "@main.hlsl:2"));

        console.execute_command("run");
        assert!(contains(&console.take_output(), "Step 1"));

        console.execute_command("break @main.hlsl:2");
        assert!(contains(&console.take_output(), "Breakpoint removed"));
        console.execute_command("break @nowhere.hlsl:2");
        assert!(contains(&console.take_output(), "Error: Unknown source file"));
    }

    #[tokio::test]
    async fn test_watch_commands() {
        let (mut session, _) = session().await;
        let mut console = Console::new(&mut session);
        console.take_output();

        console.execute_command("watch r0.y");
        let out = console.take_output();
        assert!(contains(&out, "Watch 1 added"));
        assert!(contains(&out, "Unavailable (stale)"));

        console.execute_command("next");
        console.take_output();
        console.execute_command("watches");
        assert!(contains(&console.take_output(), "1: r0.y = 2"));

        console.execute_command("unwatch 1");
        assert!(contains(&console.take_output(), "Removed watch r0.y"));
        console.execute_command("unwatch 1");
        assert!(contains(&console.take_output(), "Error: No watch 1"));
    }

    #[tokio::test]
    async fn test_event_and_view_commands() {
        let (mut session, _) = session().await;
        let mut console = Console::new(&mut session);
        console.take_output();

        console.execute_command("sample");
        assert!(contains(&console.take_output(), "Step 2"));

        console.execute_command("vars");
        let out = console.take_output();
        assert!(contains(&out, "Variables:"));
        assert!(contains(&out, "r0"));

        console.execute_command("frobnicate");
        assert!(contains(&console.take_output(), "Unknown command: frobnicate"));
    }
}
