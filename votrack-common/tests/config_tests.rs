//! Tests for configuration resolution and TOML handling
//!
//! Covers:
//! - Root folder priority order (CLI > env > TOML > compiled default)
//! - Root folder layout creation
//! - TOML read/write
//!
//! Tests that touch VOTRACK_ROOT_FOLDER are marked #[serial] so they do not
//! race on the process environment.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use votrack_common::config::{
    load_toml_config, CompiledDefaults, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("votrack"));
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.bind_address, "127.0.0.1");
    assert_eq!(defaults.port, 5780);
    assert_eq!(defaults.admin_username, "admin");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new().resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/votrack-test-env-folder");

    let root_folder = RootFolderResolver::new().resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/votrack-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/votrack-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/votrack-from-toml")),
        ..Default::default()
    };

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/votrack-from-cli")))
        .with_toml_config(toml.clone())
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/votrack-from-cli"));

    // Without CLI the env var wins over TOML
    let root_folder = RootFolderResolver::new().with_toml_config(toml).resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/votrack-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/votrack")),
        ..Default::default()
    };

    let root_folder = RootFolderResolver::new().with_toml_config(toml).resolve();
    assert_eq!(root_folder, PathBuf::from("/srv/votrack"));
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/votrack-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("votrack.db"));
    assert_eq!(initializer.evidence_path(), root.join("evidence"));
}

#[test]
fn test_initializer_creates_layout_idempotently() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(root.join("evidence").is_dir());
}

#[test]
fn test_serialized_toml_loads_back() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("votrack").join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/data/votrack")),
        bind_address: Some("0.0.0.0".to_string()),
        port: Some(8088),
        admin_username: Some("jefe".to_string()),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    };

    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, toml::to_string_pretty(&config).unwrap()).unwrap();

    assert_eq!(load_toml_config(&target).unwrap(), config);
}

#[test]
fn test_partial_toml_uses_defaults_for_missing_keys() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "port = 9000\n").unwrap();

    let config = load_toml_config(&target).unwrap();
    assert_eq!(config.port, Some(9000));
    assert_eq!(config.root_folder, None);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "port = \"not a number").unwrap();

    let err = load_toml_config(&target).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
