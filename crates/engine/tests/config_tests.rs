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

use sdb_engine::EngineConfig;
use tracing::info;

#[test]
fn test_default_config() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default();

    assert!(config.source_debugging);
    assert!(!config.int_view);
    assert_eq!(config.population_log_interval, 64);
}

#[test]
fn test_config_with_custom_values() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config =
        EngineConfig { source_debugging: false, int_view: true, population_log_interval: 8 };

    assert!(!config.source_debugging);
    assert!(config.int_view);
    assert_eq!(config.population_log_interval, 8);
}

#[test]
fn test_config_created_when_missing() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sdb.toml");

    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
    assert!(path.exists());
}

#[test]
fn test_config_save_and_reload() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sdb.toml");

    let config = EngineConfig::default().with_int_view(true).with_population_log_interval(16);
    config.save_to(&path).unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_config_is_an_error() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sdb.toml");
    std::fs::write(&path, "int_view = \"sometimes\"").unwrap();

    let err = EngineConfig::load_from(&path).unwrap_err();
    assert!(format!("{err:#}").contains("TOML"));
}
