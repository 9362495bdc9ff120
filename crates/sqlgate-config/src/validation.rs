// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checks that run after deserialization succeeds.
//!
//! Serde guarantees shape and types; these rules cover values that parse but
//! cannot work (an empty database path, zero timeouts, unknown log levels).

use crate::diagnostic::ConfigError;
use crate::model::SqlGateConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate `config`, reporting every broken rule at once.
pub fn validate_config(config: &SqlGateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.database.path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "database.path must not be empty".to_string(),
        });
    }

    if config.database.busy_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "database.busy_timeout_ms must be greater than zero".to_string(),
        });
    }

    if config.database.acquire_timeout_ms == Some(0) {
        errors.push(ConfigError::Validation {
            message: "database.acquire_timeout_ms must be greater than zero when set"
                .to_string(),
        });
    }

    let level = config.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of: {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
