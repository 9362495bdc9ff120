// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statement execution surface consumed by the SQL-client layer.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SqlGateError;
use crate::types::{RawResult, Row, Statement, Value};

/// A stream of result rows.
pub type RowStream = BoxStream<'static, Result<Row, SqlGateError>>;

/// Executes statements against a database connection.
///
/// Implemented both by clients that acquire the connection per statement and
/// by transactions that already hold it.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Execute a statement and return rows keyed by (transformed) column name.
    async fn execute(&self, statement: Statement) -> Result<Vec<Row>, SqlGateError>;

    /// Execute a statement and return the engine result untouched.
    async fn execute_raw(&self, statement: Statement) -> Result<RawResult, SqlGateError>;

    /// Execute a statement and return each row as a positional value tuple.
    async fn execute_values(&self, statement: Statement)
        -> Result<Vec<Vec<Value>>, SqlGateError>;

    /// Execute a statement without a separate prepare step.
    async fn execute_unprepared(&self, statement: Statement)
        -> Result<Vec<Row>, SqlGateError>;

    /// Execute a statement and stream its rows.
    ///
    /// Backends without streaming support return a defect-class error
    /// (see [`SqlGateError::is_defect`]) rather than an empty stream.
    fn execute_stream(&self, statement: Statement) -> Result<RowStream, SqlGateError>;
}
