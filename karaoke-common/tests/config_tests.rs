//! Integration tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate KARAOKE_* environment variables are marked
//! #[serial] so they never race each other.

use karaoke_common::config::{
    load_toml_config, resolve_config_path, resolve_database_path, TomlConfig,
    ENV_ALIGNMENT_API_KEY, ENV_CONFIG_PATH, ENV_DATABASE_PATH,
};
use karaoke_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_toml_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&missing).unwrap();

    assert!(config.database_path.is_none());
    assert_eq!(config.engine.max_attempts, 3);
}

#[test]
fn test_full_toml_file_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
database_path = "/var/lib/karaoke/pipeline.db"

[logging]
level = "debug"

[engine]
max_attempts = 4
backoff_base_secs = 30
backoff_cap_secs = 600
process_timeout_secs = 120

[alignment]
base_url = "http://aligner.local/v1/forced-alignment"
source_language = "es"

[storage]
chain_id = 7579
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/karaoke/pipeline.db")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.engine.max_attempts, 4);
    assert_eq!(config.engine.backoff_base_secs, 30);
    assert_eq!(config.engine.process_timeout_secs, 120);
    assert_eq!(config.engine.stale_running_secs, 3_600);
    assert_eq!(config.alignment.source_language, "es");
    assert_eq!(config.separation.model, "mdx_q");
    assert_eq!(config.storage.chain_id, 7579);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[engine\nmax_attempts = ").unwrap();

    let result = load_toml_config(&path);

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_engine_values_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[engine]\nmax_attempts = 0\n").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_database_path_beats_toml() {
    env::set_var(ENV_DATABASE_PATH, "/from/env.db");
    let config = TomlConfig {
        database_path: Some(PathBuf::from("/from/toml.db")),
        ..Default::default()
    };

    let path = resolve_database_path(None, &config);
    env::remove_var(ENV_DATABASE_PATH);

    assert_eq!(path, PathBuf::from("/from/env.db"));
}

#[test]
#[serial]
fn test_toml_database_path_used_without_env() {
    env::remove_var(ENV_DATABASE_PATH);
    let config = TomlConfig {
        database_path: Some(PathBuf::from("/from/toml.db")),
        ..Default::default()
    };

    assert_eq!(resolve_database_path(None, &config), PathBuf::from("/from/toml.db"));
}

#[test]
#[serial]
fn test_default_database_path_is_non_empty() {
    env::remove_var(ENV_DATABASE_PATH);
    let path = resolve_database_path(None, &TomlConfig::default());
    assert!(path.ends_with("karaoke.db"));
}

#[test]
#[serial]
fn test_config_path_priority() {
    env::set_var(ENV_CONFIG_PATH, "/env/config.toml");
    assert_eq!(
        resolve_config_path(Some(Path::new("/cli/config.toml"))),
        Some(PathBuf::from("/cli/config.toml"))
    );
    assert_eq!(resolve_config_path(None), Some(PathBuf::from("/env/config.toml")));
    env::remove_var(ENV_CONFIG_PATH);
}

#[test]
#[serial]
fn test_api_key_env_override() {
    env::set_var(ENV_ALIGNMENT_API_KEY, "secret-from-env");
    let mut config = TomlConfig::default();
    config.apply_env_overrides();
    env::remove_var(ENV_ALIGNMENT_API_KEY);

    assert_eq!(config.alignment.api_key.as_deref(), Some("secret-from-env"));
}

#[test]
#[serial]
fn test_blank_api_key_env_is_ignored() {
    env::set_var(ENV_ALIGNMENT_API_KEY, "   ");
    let mut config = TomlConfig::default();
    config.alignment.api_key = Some("from-toml".to_string());
    config.apply_env_overrides();
    env::remove_var(ENV_ALIGNMENT_API_KEY);

    assert_eq!(config.alignment.api_key.as_deref(), Some("from-toml"));
}
