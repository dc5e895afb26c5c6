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

//! Logging configuration for SDB components
//!
//! Provides centralized logging setup with:
//! - Colorful console output on stderr, so command output on stdout stays clean
//! - Optional file logging with daily rotation
//! - Environment variable support (RUST_LOG)

use eyre::{eyre, Result};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Once,
};
use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Keeps the background log writer alive. Logs are flushed when it is dropped.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory log files are written to, if file logging is enabled.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Initialize logging for an SDB component
///
/// Sets up a console layer writing to stderr and, when `enable_file_logging`
/// is set, a daily rolling log file under `$TMP/sdb-logs/<component>`.
///
/// # Examples
/// ```rust,no_run
/// let _guard = sdb_common::logging::init_logging("sdb", true)?;
/// tracing::info!("Application started");
/// # Ok::<(), eyre::Report>(())
/// ```
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<LoggingGuard> {
    let log_dir =
        if enable_file_logging { Some(create_log_directory(component_name)?) } else { None };
    init_logging_in(component_name, log_dir)
}

/// Initialize logging for an SDB component with an explicit log directory.
///
/// `None` disables file logging.
pub fn init_logging_in(component_name: &str, log_dir: Option<PathBuf>) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| eyre!("Failed to create environment filter: {e}"))?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(true)
        .with_writer(io::stderr)
        .with_filter(filter_for_console()?);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .map_err(|e| eyre!("Failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(component = component_name, "Logging initialized with console output only");
        log_environment_info(component_name);
        return Ok(LoggingGuard::default());
    };

    fs::create_dir_all(&log_dir)?;
    let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .with_filter(filter_for_file());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize tracing subscriber: {e}"))?;

    tracing::info!(
        component = component_name,
        log_dir = %log_dir.display(),
        "Logging initialized with console and file output"
    );
    log_environment_info(component_name);

    Ok(LoggingGuard { _file: Some(guard), log_dir: Some(log_dir) })
}

/// Create log directory in system temp folder
fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join("sdb-logs").join(component_name);
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Filter for console output - keep per-state stepping noise out unless asked for
fn filter_for_console() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive("sdb_engine::stepping=info".parse()?))
}

/// Filter for file output - be more verbose for debugging
fn filter_for_file() -> EnvFilter {
    EnvFilter::from_default_env()
}

fn log_environment_info(component_name: &str) {
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let args: Vec<String> = env::args().collect();

    tracing::debug!(
        component = component_name,
        rust_log = %rust_log,
        args = ?args,
        "Environment information"
    );
}

/// Initialize simple logging (console only, compact formatting)
pub fn init_simple_logging(level: Level) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .map_err(|e| eyre!("Failed to create environment filter: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|e| eyre!("Failed to initialize simple logging: {e}"))?;

    Ok(())
}

static TEST_LOGGING_INIT: Once = Once::new();

/// Safe logging initialization for tests, can be called any number of times.
///
/// Defaults to INFO, RUST_LOG takes precedence.
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        // a subscriber may already be installed by another harness
        let _ = init_simple_logging(default_level.unwrap_or(Level::INFO));
    });
}
