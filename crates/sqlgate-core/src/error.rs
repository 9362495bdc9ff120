// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for sqlgate.

use thiserror::Error;

/// The primary error type used across all sqlgate traits and operations.
#[derive(Debug, Error)]
pub enum SqlGateError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Engine and driver errors (malformed SQL, constraint violation, I/O failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The database handle is not open.
    #[error("database is not open")]
    NotOpen,

    /// Waiting for the connection permit exceeded the configured bound.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A programming error by the caller, such as invoking an unsupported
    /// operation. Never a data condition and never worth retrying.
    #[error("defect in {operation}: {message}")]
    Defect {
        operation: &'static str,
        message: String,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SqlGateError {
    /// Wrap any engine or driver error as a recoverable storage error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Returns `true` for defect-class failures.
    ///
    /// Defects signal a bug in the calling code. They must not be handled like
    /// ordinary errors (retried, reported to end users as bad input, or
    /// treated as an empty result).
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Defect { .. })
    }
}
