// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end client tests.
//!
//! `TestHarness` opens a [`SqliteClient`] on a fresh temp-file database and
//! registers the SQL function `probe(x)`. Each call to `probe` enters the
//! harness's [`ConcurrencyProbe`], pauses on the connection thread, and
//! returns `x` unchanged, so tests can measure how many statements the engine
//! runs at once.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use sqlgate_config::SqlGateConfig;
use sqlgate_core::{NameCase, SqlClient, SqlGateError, Statement};
use sqlgate_sqlite::SqliteClient;
use tempfile::TempDir;
use tracing::debug;

use crate::probe::ConcurrencyProbe;

/// Builder for test environments.
pub struct TestHarnessBuilder {
    config: SqlGateConfig,
    schema: Vec<String>,
    probe_pause: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: SqlGateConfig::default(),
            schema: Vec::new(),
            probe_pause: Duration::from_millis(2),
        }
    }

    /// Casing applied to result column names.
    pub fn with_result_names(mut self, case: NameCase) -> Self {
        self.config.client.result_names = case;
        self
    }

    /// Casing applied to quoted identifiers.
    pub fn with_query_names(mut self, case: NameCase) -> Self {
        self.config.client.query_names = case;
        self
    }

    /// Bound the wait for the connection permit.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.database.acquire_timeout_ms =
            Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Statement run once after the database opens. May be called repeatedly.
    pub fn with_schema(mut self, sql: impl Into<String>) -> Self {
        self.schema.push(sql.into());
        self
    }

    /// How long each `probe(x)` call holds the connection thread.
    pub fn with_probe_pause(mut self, pause: Duration) -> Self {
        self.probe_pause = pause;
        self
    }

    /// Create the temp database, open the client, and install the probe.
    pub async fn build(mut self) -> Result<TestHarness, SqlGateError> {
        let temp_dir = TempDir::new().map_err(SqlGateError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        self.config.database.path = db_path.to_string_lossy().into_owned();

        let client = Arc::new(SqliteClient::connect(&self.config).await?);
        let probe = Arc::new(ConcurrencyProbe::new());
        install_probe(&client, Arc::clone(&probe), self.probe_pause).await?;

        for sql in self.schema {
            client.execute(Statement::new(sql)).await?;
        }
        debug!(path = %client.database().path(), "test harness ready");

        Ok(TestHarness {
            client,
            probe,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A live client on a temp-file database.
pub struct TestHarness {
    client: Arc<SqliteClient>,
    probe: Arc<ConcurrencyProbe>,
    config: SqlGateConfig,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Shared handle to the client under test.
    pub fn client(&self) -> Arc<SqliteClient> {
        Arc::clone(&self.client)
    }

    /// Instrument entered by every `probe(x)` call on the connection.
    pub fn probe(&self) -> &ConcurrencyProbe {
        &self.probe
    }

    /// Configuration the client was connected with.
    pub fn config(&self) -> &SqlGateConfig {
        &self.config
    }

    /// Values of the first column of `sql`, as integers.
    pub async fn integers(&self, sql: &str) -> Result<Vec<i64>, SqlGateError> {
        let rows = self.client.execute_values(Statement::new(sql)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.first().and_then(|v| v.as_i64()))
            .collect())
    }
}

async fn install_probe(
    client: &SqliteClient,
    probe: Arc<ConcurrencyProbe>,
    pause: Duration,
) -> Result<(), SqlGateError> {
    client
        .database()
        .connection()?
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.create_scalar_function("probe", 1, FunctionFlags::SQLITE_UTF8, move |ctx| {
                let _inside = probe.enter();
                std::thread::sleep(pause);
                ctx.get::<rusqlite::types::Value>(0)
            })
        })
        .await
        .map_err(SqlGateError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_runs_probe_and_schema() {
        let harness = TestHarness::builder()
            .with_schema("CREATE TABLE t (x INTEGER)")
            .with_schema("INSERT INTO t VALUES (7)")
            .build()
            .await
            .unwrap();

        assert_eq!(harness.integers("SELECT probe(x) FROM t").await.unwrap(), vec![7]);
        assert_eq!(harness.probe().entries(), 1);
        assert_eq!(harness.probe().current(), 0);
        harness.client().close().await;
    }

    #[tokio::test]
    async fn oversized_acquire_timeout_saturates() {
        let harness = TestHarness::builder()
            .with_acquire_timeout(Duration::MAX)
            .build()
            .await
            .unwrap();
        assert_eq!(harness.config().database.acquire_timeout_ms, Some(u64::MAX));
        harness.client().close().await;
    }
}
