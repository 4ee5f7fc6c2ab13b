//! Tests for config file resolution and graceful degradation
//!
//! - Missing TOML files do not cause termination
//! - Priority order for config path resolution: CLI → ENV → platform default
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use icoach_common::config::{
    load_toml_config, resolve_config_path, TomlConfig, CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let cli = PathBuf::from("/tmp/from-cli.toml");
    let resolved = resolve_config_path(Some(&cli), "icoach-ai");

    assert_eq!(resolved, Some(cli));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, "icoach-ai");

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_platform_default_names_module_file() {
    env::remove_var(CONFIG_ENV_VAR);

    if let Some(path) = resolve_config_path(None, "icoach-ai") {
        assert!(path.ends_with("icoach/icoach-ai.toml"));
    }
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config, TomlConfig::with_defaults());
    assert_eq!(config.primary_retry.max_retries, 2);
}

#[test]
fn test_file_values_are_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("icoach-ai.toml");
    std::fs::write(
        &path,
        r#"
bind_address = "0.0.0.0:9000"

[logging]
level = "debug"

[models]
evaluation_primary = "gemini-exp"

[queue]
max_concurrent = 4
min_spacing_ms = 250
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.bind_address(), "0.0.0.0:9000");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.models.evaluation_primary, "gemini-exp");
    assert_eq!(config.models.evaluation_fallback, "gemini-2.5-flash");
    assert_eq!(config.queue.max_concurrent, 4);
    assert_eq!(config.queue.min_spacing_ms, 250);
    assert_eq!(config.primary_retry.base_delay_ms, 5000);
}

#[test]
fn test_unparseable_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[logging\nlevel = 3").unwrap();

    assert!(load_toml_config(&path).is_err());
}
