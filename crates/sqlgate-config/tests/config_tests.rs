// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the sqlgate configuration system.

use sqlgate_config::diagnostic::ConfigError;
use sqlgate_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use sqlgate_core::NameCase;

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[database]
path = "/tmp/test.db"
wal_mode = false
busy_timeout_ms = 1000
foreign_keys = false
acquire_timeout_ms = 250

[client]
result_names = "camel_case"
query_names = "snake_case"

[log]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.database.path, "/tmp/test.db");
    assert!(!config.database.wal_mode);
    assert_eq!(config.database.busy_timeout_ms, 1000);
    assert!(!config.database.foreign_keys);
    assert_eq!(
        config.database.acquire_timeout(),
        Some(std::time::Duration::from_millis(250))
    );
    assert_eq!(config.client.result_names, NameCase::CamelCase);
    assert_eq!(config.client.query_names, NameCase::SnakeCase);
    assert_eq!(config.log.level, "debug");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should be valid");
    assert!(config.database.path.ends_with("sqlgate.db"));
    assert!(config.database.wal_mode);
    assert_eq!(config.database.busy_timeout_ms, 5000);
    assert!(config.database.foreign_keys);
    assert_eq!(config.database.acquire_timeout(), None);
    assert_eq!(config.client.result_names, NameCase::Preserve);
    assert_eq!(config.log.level, "info");
}

#[test]
fn unknown_field_in_database_suggests_correction() {
    let toml = "[database]\npth = \"/tmp/x.db\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "pth");
            assert_eq!(suggestion.as_deref(), Some("path"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[storage]\npath = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_produces_invalid_type() {
    let errors = load_and_validate_str("[database]\nwal_mode = \"yes\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "database.wal_mode"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn unknown_casing_is_rejected() {
    let errors = load_and_validate_str("[client]\nresult_names = \"kebab\"\n").unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn validation_errors_surface_after_parsing() {
    let errors = load_and_validate_str("[log]\nlevel = \"chatty\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn explicit_file_errors_suggest_correction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sqlgate.toml");
    std::fs::write(&path, "[database]\nwal_mod = true\n").unwrap();

    let errors = load_and_validate_path(&path).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "wal_mod");
            assert_eq!(suggestion.as_deref(), Some("wal_mode"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
