// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sqlgate.toml` > `~/.config/sqlgate/sqlgate.toml` > `/etc/sqlgate/sqlgate.toml`
//! with environment variable overrides via `SQLGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SqlGateConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sqlgate/sqlgate.toml";

/// Configuration file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "sqlgate.toml";

/// Per-user configuration file under the XDG config dir, if one exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sqlgate/sqlgate.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sqlgate/sqlgate.toml` (system-wide)
/// 3. `~/.config/sqlgate/sqlgate.toml` (user XDG config)
/// 4. `./sqlgate.toml` (local directory)
/// 5. `SQLGATE_*` environment variables
pub fn load_config() -> Result<SqlGateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SqlGateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SqlGateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SqlGateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SqlGateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SqlGateConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `SQLGATE_DATABASE_BUSY_TIMEOUT_MS` must map to
/// `database.busy_timeout_ms`, not `database.busy.timeout.ms`.
fn env_provider() -> Env {
    Env::prefixed("SQLGATE_").map(|key| {
        // Keys arrive here before figment lowercases them.
        let mapped = key
            .as_str()
            .to_ascii_lowercase()
            .replacen("database_", "database.", 1)
            .replacen("client_", "client.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use sqlgate_core::NameCase;

    #[test]
    fn env_overrides_map_to_sections() {
        Jail::expect_with(|jail| {
            jail.create_file("explicit.toml", "[database]\npath = \"/tmp/file.db\"\n")?;
            jail.set_env("SQLGATE_DATABASE_BUSY_TIMEOUT_MS", "250");
            jail.set_env("SQLGATE_CLIENT_RESULT_NAMES", "camel_case");
            jail.set_env("SQLGATE_LOG_LEVEL", "debug");

            let config = load_config_from_path(Path::new("explicit.toml"))?;
            assert_eq!(config.database.path, "/tmp/file.db");
            assert_eq!(config.database.busy_timeout_ms, 250);
            assert_eq!(config.client.result_names, NameCase::CamelCase);
            assert_eq!(config.log.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn env_beats_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file("explicit.toml", "[database]\nwal_mode = true\n")?;
            jail.set_env("SQLGATE_DATABASE_WAL_MODE", "false");

            let config = load_config_from_path(Path::new("explicit.toml"))?;
            assert!(!config.database.wal_mode);
            Ok(())
        });
    }

    #[test]
    fn env_override_reaches_default_hierarchy() {
        Jail::expect_with(|jail| {
            jail.set_env("SQLGATE_DATABASE_FOREIGN_KEYS", "false");
            jail.set_env("SQLGATE_DATABASE_ACQUIRE_TIMEOUT_MS", "75");

            let config = load_config()?;
            assert!(!config.database.foreign_keys);
            assert_eq!(config.database.acquire_timeout_ms, Some(75));
            Ok(())
        });
    }

    #[test]
    fn local_file_is_part_of_hierarchy() {
        Jail::expect_with(|jail| {
            jail.create_file(LOCAL_CONFIG_PATH, "[log]\nlevel = \"warn\"\n")?;
            let config = load_config()?;
            assert_eq!(config.log.level, "warn");
            Ok(())
        });
    }
}
