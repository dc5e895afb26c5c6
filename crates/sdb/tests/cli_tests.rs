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

use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use sdb_common::{
    logging::ensure_test_logging,
    test_utils::TraceBuilder,
    types::{LineColumnInfo, ShaderVariable, ShaderVariableChange},
};
use tracing::info;

fn write_trace(dir: &Path) -> std::path::PathBuf {
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
                &[0.5, 1.0, 0.0, 1.0],
            ))],
        )
        .state(2, &["main"], vec![]);
    let disassembly = builder.disassembly().lines().join("\n");
    let (trace, states) = builder.build();

    let json = serde_json::json!({
        "trace": trace,
        "states": states,
        "disassembly": disassembly,
    });
    let path = dir.join("trace.json");
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

fn sdb(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sdb").unwrap();
    cmd.env("SDB_CONFIG", dir.join("sdb.toml"));
    cmd
}

#[test]
fn test_help_command() {
    ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = Command::cargo_bin("sdb").unwrap();
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("Shader Debugger"));
}

#[test]
fn test_version_command() {
    ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("sdb").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("sdb"));
}

#[test]
fn test_debug_subcommand_help() {
    ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("sdb").unwrap();
    cmd.arg("debug")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded trace"));
}

#[test]
fn test_missing_subcommand() {
    ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("sdb").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_trace_file() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    sdb(dir.path())
        .arg("debug")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read trace file"));
}

#[test]
fn test_undebuggable_trace() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    fs::write(&path, r#"{ "trace": null }"#).unwrap();

    sdb(dir.path())
        .arg("debug")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open debug session"));
}

#[test]
fn test_script_session() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path());
    let script = dir.path().join("script.sdb");
    fs::write(&script, "watch r0.x\nbreak @main.hlsl:2\nrun\nwatches\nback\nquit\nnext\n").unwrap();

    sdb(dir.path())
        .arg("debug")
        .arg(&trace)
        .arg("--script")
        .arg(&script)
        .arg("--batch-size")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Step 0, instruction 0"))
        .stdout(predicate::str::contains("Breakpoint set at @0:2"))
        .stdout(predicate::str::contains("Step 1, instruction 1"))
        .stdout(predicate::str::contains("1: r0.x = 0.5"))
        .stdout(predicate::str::contains("Exiting debugger"))
        // commands after quit are not run
        .stdout(predicate::str::contains("(sdb) next").not());
}

#[test]
fn test_stdin_session_disassembly_only() {
    ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let trace = write_trace(dir.path());

    sdb(dir.path())
        .arg("debug")
        .arg(&trace)
        .arg("--disasm-only")
        .write_stdin("next\nnext\nwhere\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Step 2, instruction 2"))
        .stdout(predicate::str::contains("(finished)"));
}
