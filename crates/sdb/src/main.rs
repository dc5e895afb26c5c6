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

//! SDB - Shader Debugger
//!
//! Steps through a recorded GPU shader execution, forwards and backwards.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;
mod console;
mod trace_file;

/// Command-line interface for SDB
#[derive(Debug, Parser)]
#[command(name = "sdb")]
#[command(about = "Shader Debugger - step through recorded GPU shader executions in both directions")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a daily rolling file
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Debug a recorded shader trace
    Debug(DebugArgs),
}

/// Arguments of the `debug` command
#[derive(Debug, Clone, clap::Args)]
pub struct DebugArgs {
    /// Recorded trace (JSON with `trace`, `states` and `disassembly`)
    pub trace: PathBuf,

    /// Read console commands from a file instead of stdin
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Number of states the replay controller hands out per batch
    #[arg(long, default_value = "256")]
    pub batch_size: usize,

    /// Render untyped register values as integers
    #[arg(long)]
    pub int_view: bool,

    /// Step by instructions even when the trace has source information
    #[arg(long)]
    pub disasm_only: bool,

    /// Configuration file (default: ~/.sdb.toml)
    #[arg(long, env = "SDB_CONFIG")]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let _guard = sdb_common::logging::init_logging("sdb", cli.log_file)?;

    match &cli.command {
        Commands::Debug(args) => {
            tracing::info!("Debugging trace: {}", args.trace.display());
            cmd::debug_trace(args).await
        }
    }
}
