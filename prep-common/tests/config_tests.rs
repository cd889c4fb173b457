//! Bootstrap configuration and root folder resolution
//!
//! Tests that touch PREP_ROOT_FOLDER are #[serial] so they don't race on
//! the process environment.

use prep_common::config::{
    default_root_folder, resolve_root_folder, LedgerConfig, LoggingConfig, TomlConfig,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, &TomlConfig::default());

    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/prep-env-root");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/prep-toml-root")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/tmp/prep-env-root"));
}

#[test]
#[serial]
fn test_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/prep-env-root");

    let root = resolve_root_folder(Some(Path::new("/tmp/prep-cli-root")), &TomlConfig::default());
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/tmp/prep-cli-root"));
}

#[test]
#[serial]
fn test_toml_used_when_env_empty() {
    env::set_var(ROOT_FOLDER_ENV, "  ");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/prep-toml-root")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/tmp/prep-toml-root"));
}

#[test]
fn test_missing_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = TomlConfig::load_or_default(&temp_dir.path().join("absent.toml"));

    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("prep.toml");
    std::fs::write(&path, "root_folder = [not toml").unwrap();

    let config = TomlConfig::load_or_default(&path);

    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_ledger_section_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("prep.toml");
    std::fs::write(
        &path,
        "[logging]\nlevel = \"debug\"\n\n[ledger]\nmax_lock_wait_ms = 1500\n",
    )
    .unwrap();

    let config = TomlConfig::load_or_default(&path);

    assert_eq!(config.logging, LoggingConfig { level: "debug".to_string() });
    assert_eq!(
        config.ledger,
        LedgerConfig {
            busy_timeout_ms: 250,
            max_lock_wait_ms: 1500,
        }
    );
}
