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

//! Debug command - open a recorded trace and drive it from the console

use std::{
    fs,
    io::{self, BufRead, IsTerminal, Write},
    sync::Arc,
    time::Duration,
};

use eyre::{Result, WrapErr};
use sdb_engine::{DebugSession, EngineConfig, RecordedReplay, SessionStatus};
use tracing::{info, warn};

use crate::{
    console::{Console, ConsoleResponse},
    trace_file::TraceFile,
    DebugArgs,
};

/// Debug a recorded shader trace
pub async fn debug_trace(args: &DebugArgs) -> Result<()> {
    let config = load_config(args);

    let file = TraceFile::load(&args.trace)?;
    let disassembly = file.disassembly();
    let replay = Arc::new(RecordedReplay::new(file.states, args.batch_size));

    let mut session = DebugSession::open(file.trace, disassembly, replay, config)
        .wrap_err("Failed to open debug session")?;
    wait_for_states(&mut session).await?;

    let mut console = Console::new(&mut session);
    match &args.script {
        Some(path) => {
            let script = fs::read_to_string(path)
                .wrap_err_with(|| format!("Failed to read script: {}", path.display()))?;
            run_lines(&mut console, script.lines().map(str::to_string), true)
        }
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            let lines = stdin.lock().lines().map_while(|line| line.ok());
            run_lines(&mut console, lines, !interactive)
        }
    }
}

fn load_config(args: &DebugArgs) -> EngineConfig {
    let loaded = match &args.config {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {e:#}");
        EngineConfig::default()
    });

    if args.int_view {
        config = config.with_int_view(true);
    }
    if args.disasm_only {
        config = config.with_source_debugging(false);
    }
    config
}

/// Poll the session until every state has been received.
async fn wait_for_states(session: &mut DebugSession) -> Result<()> {
    let mut reported = 0;
    loop {
        match session.poll() {
            SessionStatus::Ready => break,
            SessionStatus::Failed(err) => return Err(err).wrap_err("Failed to load debug states"),
            SessionStatus::Loading(progress) => {
                if progress.states != reported {
                    info!("Received {} states...", progress.states);
                    reported = progress.states;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }
    }

    let states = session.store().map(|s| s.len()).unwrap_or_default();
    info!("Trace ready with {states} states");
    Ok(())
}

fn run_lines(
    console: &mut Console<'_>,
    lines: impl Iterator<Item = String>,
    echo: bool,
) -> Result<()> {
    let mut stdout = io::stdout().lock();
    let prompt = |out: &mut io::StdoutLock<'_>| -> io::Result<()> {
        if !echo {
            write!(out, "(sdb) ")?;
            out.flush()?;
        }
        Ok(())
    };

    for line in console.take_output() {
        writeln!(stdout, "{line}")?;
    }
    prompt(&mut stdout)?;

    for line in lines {
        if echo && !line.trim().is_empty() {
            writeln!(stdout, "(sdb) {line}")?;
        }
        let response = console.execute_command(&line);
        for out in console.take_output() {
            writeln!(stdout, "{out}")?;
        }
        if response == ConsoleResponse::Exit {
            break;
        }
        prompt(&mut stdout)?;
    }
    Ok(())
}
