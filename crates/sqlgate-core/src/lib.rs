// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for sqlgate.
//!
//! This crate provides the error type, SQL value and row types, and the trait
//! definitions shared by the SQLite backend, the test utilities, and the CLI.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SqlGateError;
pub use traits::{PluginAdapter, RowStream, SqlClient};
pub use types::{HealthStatus, NameCase, NameTransform, RawResult, Row, Statement, Value};
