//! Unit tests for configuration loading and API base URL resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TSIM_API_BASE_URL are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use serial_test::serial;
use std::env;
use std::io::Write;
use tsim_common::config::{
    resolve_api_base_url, TomlConfig, API_BASE_URL_ENV, DEFAULT_API_BASE_URL,
};
use tsim_common::{Error, RankBy};

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert_eq!(config.api_base_url, None);
    assert_eq!(config.request_timeout_ms, 10_000);
    assert_eq!(config.min_count, 5);
    assert_eq!(config.top_n, 25);
    assert_eq!(config.rank_by, RankBy::Avg);
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_fills_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        api_base_url = "http://api.example:9000"
        rank_by = "max"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.api_base_url.as_deref(), Some("http://api.example:9000"));
    assert_eq!(config.rank_by, RankBy::Max);
    assert_eq!(config.top_n, 25);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_values_rejected() {
    let result = TomlConfig::from_toml_str("top_n = 0");
    assert!(matches!(result, Err(Error::Config(_))));

    let result = TomlConfig::from_toml_str("rank_by = \"median\"");
    assert!(matches!(result, Err(Error::TomlParse(_))));
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "min_count = 10\ndefault_book_id = 3300\nrequest_timeout_ms = 2500").unwrap();

    let config = TomlConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.min_count, 10);
    assert_eq!(config.default_book_id, Some(3300));
    assert_eq!(config.request_timeout().as_millis(), 2500);
}

#[test]
fn test_malformed_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "min_count = [not toml").unwrap();

    let result = TomlConfig::load_or_default(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_arg_has_highest_priority() {
    env::set_var(API_BASE_URL_ENV, "http://from-env:1");
    let config = TomlConfig {
        api_base_url: Some("http://from-toml:2".to_string()),
        ..TomlConfig::default()
    };

    let url = resolve_api_base_url(Some("http://from-cli:3"), API_BASE_URL_ENV, &config);
    assert_eq!(url, "http://from-cli:3");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(API_BASE_URL_ENV, "http://from-env:1");
    let config = TomlConfig {
        api_base_url: Some("http://from-toml:2".to_string()),
        ..TomlConfig::default()
    };

    let url = resolve_api_base_url(None, API_BASE_URL_ENV, &config);
    assert_eq!(url, "http://from-env:1");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_toml_then_compiled_default() {
    env::remove_var(API_BASE_URL_ENV);

    let config = TomlConfig {
        api_base_url: Some("http://from-toml:2".to_string()),
        ..TomlConfig::default()
    };
    assert_eq!(
        resolve_api_base_url(Some("  "), API_BASE_URL_ENV, &config),
        "http://from-toml:2"
    );

    assert_eq!(
        resolve_api_base_url(None, API_BASE_URL_ENV, &TomlConfig::default()),
        DEFAULT_API_BASE_URL
    );
}
