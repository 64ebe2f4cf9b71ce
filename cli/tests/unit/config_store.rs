//! Unit tests for the YAML configuration store.
//!
//! IMPORTANT: these tests mutate `PLUGIN_SETUP_CONFIG` and are serialized
//! with `serial_test`.

#![allow(clippy::expect_used, clippy::unwrap_used, unsafe_code)]

use plugin_setup::application::ports::ConfigStore;
use plugin_setup::application::services::config_service;
use plugin_setup::domain::config::CONFIG_ENV;
use plugin_setup::domain::{AppConfig, UnparseablePolicy};
use plugin_setup::infra::config::YamlConfigStore;
use serial_test::serial;
use tempfile::TempDir;

fn point_config_at(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("nested").join("config.yaml");
    // SAFETY: every test touching this variable is #[serial].
    unsafe { std::env::set_var(CONFIG_ENV, &path) };
    path
}

#[test]
#[serial]
fn test_missing_file_loads_defaults() {
    let dir = TempDir::new().unwrap();
    point_config_at(&dir);

    let config = YamlConfigStore.load().unwrap();

    assert_eq!(config, AppConfig::default());
}

#[test]
#[serial]
fn test_set_value_persists_and_reloads() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);

    config_service::set_value(&YamlConfigStore, "validation.unparseable", "reject").unwrap();
    config_service::set_value(&YamlConfigStore, "agent.root", "/srv/agent").unwrap();

    assert!(path.is_file());
    let config = config_service::load_config(&YamlConfigStore).unwrap();
    assert_eq!(config.validation.unparseable, UnparseablePolicy::Reject);
    assert_eq!(config.agent.root, "/srv/agent");
}

#[test]
#[serial]
fn test_invalid_value_is_not_written() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);

    let err = config_service::set_value(&YamlConfigStore, "agent.root", "relative/path");

    assert!(err.is_err());
    assert!(!path.exists());
}

fn write_raw(path: &std::path::Path, yaml: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, yaml).unwrap();
}

#[test]
#[serial]
fn test_zero_timeout_file_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);
    write_raw(&path, "timeouts:\n  command_secs: 0\n");

    let err = config_service::load_config(&YamlConfigStore).unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("invalid configuration in"), "got: {msg}");
    assert!(msg.contains("timeouts.command_secs"), "got: {msg}");
}

#[test]
#[serial]
fn test_relative_agent_root_file_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);
    write_raw(&path, "agent:\n  root: relative/dir\n");

    let err = config_service::load_config(&YamlConfigStore).unwrap_err();

    assert!(format!("{err:#}").contains("agent.root"), "got: {err:#}");
}

#[test]
#[serial]
fn test_set_value_repairs_an_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);
    write_raw(&path, "timeouts:\n  command_secs: 0\n");

    config_service::set_value(&YamlConfigStore, "timeouts.command_secs", "30").unwrap();

    let config = config_service::load_config(&YamlConfigStore).unwrap();
    assert_eq!(config.timeouts.command_secs, 30);
}

#[test]
#[serial]
fn test_empty_file_loads_defaults() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);
    write_raw(&path, "\n");

    assert_eq!(YamlConfigStore.load().unwrap(), AppConfig::default());
}

#[cfg(unix)]
#[test]
#[serial]
fn test_saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);

    YamlConfigStore.save(&AppConfig::default()).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
#[serial]
fn test_path_follows_env_override() {
    let dir = TempDir::new().unwrap();
    let path = point_config_at(&dir);

    assert_eq!(YamlConfigStore.path().unwrap(), path);
}
