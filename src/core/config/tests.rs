use super::data::{Config, ConfigKey, ReasoningPreferences, DEFAULT_BASE_URL};
use super::io::ConfigError;
use std::fs;
use std::str::FromStr;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.base_url(), DEFAULT_BASE_URL);
}

#[test]
fn test_config_persistence_lifecycle() {
    // Tests the full lifecycle of config persistence: initial save, modification, and unsetting values
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    // Phase 1: Initial save and load
    let config = Config {
        default_model: Some("gpt-5-mini".to_string()),
        reasoning_effort: Some("high".to_string()),
        ..Default::default()
    };
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.default_model.as_deref(), Some("gpt-5-mini"));
    assert_eq!(loaded.reasoning_effort(), "high");

    // Phase 2: Modify through mutate_at and verify other fields persist
    Config::mutate_at(&config_path, |config| {
        config.set(ConfigKey::Verbosity, Some("low".to_string()));
        Ok(())
    })
    .expect("Failed to mutate config");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load modified config");
    assert_eq!(loaded.verbosity(), "low");
    assert_eq!(loaded.default_model.as_deref(), Some("gpt-5-mini"));

    // Phase 3: Unset and verify persistence of None
    Config::mutate_at(&config_path, |config| {
        config.set(ConfigKey::DefaultModel, None);
        Ok(())
    })
    .expect("Failed to unset value");
    let loaded = Config::load_from_path(&config_path).expect("Failed to load unset config");
    assert_eq!(loaded.default_model, None);
    assert_eq!(loaded.verbosity.as_deref(), Some("low"));
}

#[test]
fn invalid_toml_reports_parse_error_with_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "base_url = [").expect("write failed");

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    let config_err = err
        .downcast_ref::<ConfigError>()
        .expect("expected ConfigError");
    assert!(matches!(config_err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn reasoning_preferences_fall_back_to_defaults() {
    let config = Config::default();
    assert_eq!(config.reasoning_effort(), "medium");
    assert_eq!(config.verbosity(), "medium");
    assert_eq!(config.reasoning_summary(), "auto");
}

#[test]
fn set_ignores_blank_values() {
    let mut config = Config::default();
    config.set(ConfigKey::ReasoningSummary, Some("  null ".to_string()));
    assert_eq!(config.reasoning_summary(), "null");
    config.set(ConfigKey::ReasoningSummary, Some("   ".to_string()));
    assert_eq!(config.reasoning_summary, None);
}

#[test]
fn config_keys_parse_with_either_separator() {
    assert_eq!(
        ConfigKey::from_str("reasoning_effort"),
        Ok(ConfigKey::ReasoningEffort)
    );
    assert_eq!(ConfigKey::from_str("Base-URL"), Ok(ConfigKey::BaseUrl));
    let err = ConfigKey::from_str("theme").expect_err("unknown key");
    assert!(err.contains("default-model"));
}
