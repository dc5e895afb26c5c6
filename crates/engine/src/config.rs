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

//! Engine configuration.
//!
//! Stored as TOML at `~/.sdb.toml`; command-line flags override the loaded values.

use std::{fs, path::Path, path::PathBuf};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for a debugging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Step by source lines when the trace carries line information
    pub source_debugging: bool,
    /// Render untyped register values as signed integers instead of floats
    pub int_view: bool,
    /// Number of population batches between progress log lines
    pub population_log_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { source_debugging: true, int_view: false, population_log_interval: 64 }
    }
}

impl EngineConfig {
    /// Enable or disable source-level stepping
    pub fn with_source_debugging(mut self, enabled: bool) -> Self {
        self.source_debugging = enabled;
        self
    }

    /// Enable or disable integer rendering of untyped values
    pub fn with_int_view(mut self, enabled: bool) -> Self {
        self.int_view = enabled;
        self
    }

    /// Set the progress logging interval, at least 1
    pub fn with_population_log_interval(mut self, interval: usize) -> Self {
        self.population_log_interval = interval.max(1);
        self
    }

    /// Get the config file path (~/.sdb.toml)
    pub fn config_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(".sdb.toml"))
    }

    /// Load the configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing the defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, creating default at {}", path.display());
            let default_config = Self::default();
            default_config.save_to(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).wrap_err("Failed to parse config file as TOML")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).wrap_err("Failed to serialize config to TOML")?;
        fs::write(path, content)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;

        debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.source_debugging);
        assert!(!config.int_view);
        assert_eq!(config.population_log_interval, 64);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_source_debugging(false)
            .with_int_view(true)
            .with_population_log_interval(0);
        assert!(!config.source_debugging);
        assert!(config.int_view);
        assert_eq!(config.population_log_interval, 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("int_view = true").unwrap();
        assert!(config.int_view);
        assert!(config.source_debugging);
    }
}
