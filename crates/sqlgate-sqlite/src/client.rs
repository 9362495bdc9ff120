// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`SqlClient`] and [`PluginAdapter`] traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlgate_config::SqlGateConfig;
use sqlgate_core::{
    HealthStatus, NameTransform, PluginAdapter, RawResult, Row, RowStream, SqlClient,
    SqlGateError, Statement, Value,
};
use tracing::{debug, error, warn};

use crate::database::{Database, map_tr_err};
use crate::gate::ConnectionGate;
use crate::rows;
use crate::transaction::Transaction;

/// Opaque identifier transforms supplied by the caller.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Applied to column names of returned rows.
    pub transform_result_names: Option<NameTransform>,
    /// Applied to identifiers passed to [`SqliteClient::quote_ident`].
    pub transform_query_names: Option<NameTransform>,
}

impl ClientOptions {
    /// Build options from the configured built-in casings.
    pub fn from_config(config: &SqlGateConfig) -> Self {
        Self {
            transform_result_names: config.client.result_names.into_transform(),
            transform_query_names: config.client.query_names.into_transform(),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("transform_result_names", &self.transform_result_names.is_some())
            .field("transform_query_names", &self.transform_query_names.is_some())
            .finish()
    }
}

/// SQL client over the single SQLite connection.
///
/// Every statement takes the gate's permit for its own duration. A
/// [`Transaction`] takes it once and keeps it until commit, rollback, or drop.
pub struct SqliteClient {
    gate: Arc<ConnectionGate<Database>>,
    options: Arc<ClientOptions>,
}

impl SqliteClient {
    /// Wrap an (opened or not yet opened) database.
    pub fn new(database: Database, options: ClientOptions) -> Self {
        Self::with_gate(ConnectionGate::new(database), options)
    }

    /// Wrap a pre-configured gate, e.g. one with a bounded acquire timeout.
    pub fn with_gate(gate: ConnectionGate<Database>, options: ClientOptions) -> Self {
        Self {
            gate: Arc::new(gate),
            options: Arc::new(options),
        }
    }

    /// Build the database, gate, and client from configuration and open the file.
    pub async fn connect(config: &SqlGateConfig) -> Result<Self, SqlGateError> {
        let gate = ConnectionGate::new(Database::from_config(&config.database))
            .with_acquire_timeout(config.database.acquire_timeout());
        let client = Self::with_gate(gate, ClientOptions::from_config(config));
        client.open().await?;
        Ok(client)
    }

    /// Open the underlying database. A no-op while it is already open.
    pub async fn open(&self) -> Result<(), SqlGateError> {
        self.gate.get_ref().open().await
    }

    /// Close the underlying database once no statement holds the connection.
    ///
    /// Close is best-effort and never fails; errors are swallowed.
    pub async fn close(&self) {
        match self.gate.acquire().await {
            Ok(db) => db.close().await,
            Err(e) => {
                warn!(error = %e, "closing without the connection permit");
                self.gate.get_ref().close().await;
            }
        }
    }

    /// The database owned by this client.
    pub fn database(&self) -> &Database {
        self.gate.get_ref()
    }

    /// The gate serializing access to the connection.
    pub fn gate(&self) -> &Arc<ConnectionGate<Database>> {
        &self.gate
    }

    /// Start a transaction that holds the connection until it finishes.
    pub async fn begin(&self) -> Result<Transaction, SqlGateError> {
        let permit = self.gate.acquire_scoped().await?;
        Transaction::begin(permit, Arc::clone(&self.options)).await
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// ```no_run
    /// # use sqlgate_core::{SqlClient, Statement};
    /// # async fn demo(client: &sqlgate_sqlite::SqliteClient) -> Result<(), sqlgate_core::SqlGateError> {
    /// client
    ///     .transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.execute(Statement::new("INSERT INTO t VALUES (1)")).await?;
    ///             tx.execute(Statement::new("INSERT INTO t VALUES (2)")).await?;
    ///             Ok(())
    ///         })
    ///     })
    ///     .await
    /// # }
    /// ```
    pub async fn transaction<T, F>(&self, f: F) -> Result<T, SqlGateError>
    where
        F: for<'t> FnOnce(&'t Transaction) -> BoxFuture<'t, Result<T, SqlGateError>>,
    {
        let tx = self.begin().await?;
        match f(&tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback after failed transaction body also failed");
                }
                Err(err)
            }
        }
    }

    /// Apply the query-name transform to `name` and quote it as an identifier.
    pub fn quote_ident(&self, name: &str) -> String {
        let name = match &self.options.transform_query_names {
            Some(f) => f(name),
            None => name.to_string(),
        };
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    async fn run(&self, statement: Statement) -> Result<RawResult, SqlGateError> {
        let db = self.gate.acquire().await?;
        let conn = db.connection()?;
        let rollback_leftover = db.take_abandoned_transaction();
        // If this task is cancelled while the engine runs, the permit is
        // released but the closure still finishes on the connection thread,
        // which runs calls one at a time.
        run_on(&conn, statement, rollback_leftover).await
    }
}

/// Run one statement on a connection the caller already has exclusive use of.
///
/// With `rollback_leftover`, a transaction abandoned by an earlier holder is
/// rolled back in the same engine call, before the statement runs.
pub(crate) async fn run_on(
    conn: &tokio_rusqlite::Connection,
    statement: Statement,
    rollback_leftover: bool,
) -> Result<RawResult, SqlGateError> {
    debug!(sql = %statement.sql, params = statement.params.len(), "executing statement");
    conn.call(move |conn| -> Result<RawResult, rusqlite::Error> {
        if rollback_leftover && !conn.is_autocommit() {
            warn!("rolling back a transaction abandoned by an earlier caller");
            conn.execute_batch("ROLLBACK;")?;
        }
        rows::query_all(conn, &statement)
    })
    .await
    .map_err(map_tr_err)
}

/// Streaming is not supported by this backend; calling it is a caller bug.
pub(crate) fn unsupported_stream(statement: &Statement) -> Result<RowStream, SqlGateError> {
    error!(sql = %statement.sql, "streaming execution requested from the sqlite backend");
    Err(SqlGateError::Defect {
        operation: "execute_stream",
        message: "streaming queries are not supported by the sqlite backend".to_string(),
    })
}

#[async_trait]
impl SqlClient for SqliteClient {
    async fn execute(&self, statement: Statement) -> Result<Vec<Row>, SqlGateError> {
        let raw = self.run(statement).await?;
        Ok(rows::into_rows(raw, self.options.transform_result_names.as_ref()))
    }

    async fn execute_raw(&self, statement: Statement) -> Result<RawResult, SqlGateError> {
        self.run(statement).await
    }

    async fn execute_values(
        &self,
        statement: Statement,
    ) -> Result<Vec<Vec<Value>>, SqlGateError> {
        Ok(self.run(statement).await?.rows)
    }

    async fn execute_unprepared(&self, statement: Statement) -> Result<Vec<Row>, SqlGateError> {
        self.execute(statement).await
    }

    fn execute_stream(&self, statement: Statement) -> Result<RowStream, SqlGateError> {
        unsupported_stream(&statement)
    }
}

#[async_trait]
impl PluginAdapter for SqliteClient {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, SqlGateError> {
        if !self.database().is_open() {
            return Ok(HealthStatus::Unhealthy("database is not open".to_string()));
        }
        match self.run(Statement::new("SELECT 1")).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(SqlGateError::Timeout { duration }) => Ok(HealthStatus::Degraded(format!(
                "connection busy for more than {duration:?}"
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), SqlGateError> {
        self.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseOptions;
    use sqlgate_core::NameCase;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    async fn setup(options: ClientOptions) -> (SqliteClient, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.db");
        let client = SqliteClient::new(
            Database::new(path.to_str().unwrap(), DatabaseOptions::default()),
            options,
        );
        client.open().await.unwrap();
        client
            .execute(Statement::new(
                "CREATE TABLE users (user_id INTEGER PRIMARY KEY, display_name TEXT NOT NULL UNIQUE)",
            ))
            .await
            .unwrap();
        (client, dir)
    }

    #[tokio::test]
    async fn execute_returns_named_rows() {
        let (client, _dir) = setup(ClientOptions::default()).await;
        client
            .execute(Statement::new("INSERT INTO users (display_name) VALUES (?1)").bind("ada"))
            .await
            .unwrap();

        let rows = client
            .execute(Statement::new("SELECT user_id, display_name FROM users"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("display_name"), Some(&Value::Text("ada".into())));
        assert_eq!(rows[0].get("user_id"), Some(&Value::Integer(1)));
        client.close().await;
    }

    #[tokio::test]
    async fn result_names_are_transformed() {
        let options = ClientOptions {
            transform_result_names: NameCase::CamelCase.into_transform(),
            ..Default::default()
        };
        let (client, _dir) = setup(options).await;
        client
            .execute(Statement::new("INSERT INTO users (display_name) VALUES ('bob')"))
            .await
            .unwrap();

        let rows = client
            .execute_unprepared(Statement::new("SELECT user_id, display_name FROM users"))
            .await
            .unwrap();
        assert_eq!(rows[0].columns(), &["userId".to_string(), "displayName".to_string()]);

        // Raw results keep the engine's names.
        let raw = client
            .execute_raw(Statement::new("SELECT display_name FROM users"))
            .await
            .unwrap();
        assert_eq!(raw.columns, vec!["display_name"]);
        client.close().await;
    }

    #[tokio::test]
    async fn values_and_raw_shapes() {
        let (client, _dir) = setup(ClientOptions::default()).await;
        let raw = client
            .execute_raw(
                Statement::new("INSERT INTO users (display_name) VALUES (?1), (?2)")
                    .bind("a")
                    .bind("b"),
            )
            .await
            .unwrap();
        assert_eq!(raw.changes, 2);
        assert_eq!(raw.last_insert_rowid, 2);

        let values = client
            .execute_values(Statement::new("SELECT display_name FROM users ORDER BY user_id"))
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![vec![Value::Text("a".into())], vec![Value::Text("b".into())]]
        );
        client.close().await;
    }

    #[tokio::test]
    async fn engine_errors_propagate_and_release_permit() {
        let (client, _dir) = setup(ClientOptions::default()).await;
        client
            .execute(Statement::new("INSERT INTO users (display_name) VALUES ('dup')"))
            .await
            .unwrap();

        let err = client
            .execute(Statement::new("INSERT INTO users (display_name) VALUES ('dup')"))
            .await
            .unwrap_err();
        assert!(matches!(err, SqlGateError::Storage { .. }));
        assert!(!err.is_defect());
        assert!(client.gate().is_available());

        let err = client.execute(Statement::new("SELEC 1")).await.unwrap_err();
        assert!(matches!(err, SqlGateError::Storage { .. }));
        assert!(client.gate().is_available());
        client.close().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn streaming_is_a_defect() {
        let (client, _dir) = setup(ClientOptions::default()).await;
        let result = client.execute_stream(Statement::new("SELECT * FROM users"));
        match result {
            Err(e) => assert!(e.is_defect()),
            Ok(_) => panic!("streaming must not yield a stream"),
        }
        assert!(logs_contain("streaming execution requested"));
        client.close().await;
    }

    #[tokio::test]
    async fn quote_ident_applies_query_transform() {
        let options = ClientOptions {
            transform_query_names: NameCase::SnakeCase.into_transform(),
            ..Default::default()
        };
        let (client, _dir) = setup(options).await;
        assert_eq!(client.quote_ident("displayName"), "\"display_name\"");
        assert_eq!(client.quote_ident("odd\"name"), "\"odd\"\"name\"");

        let sql = format!("SELECT {} FROM users", client.quote_ident("displayName"));
        assert!(client.execute(Statement::new(sql)).await.unwrap().is_empty());
        client.close().await;
    }

    #[tokio::test]
    async fn health_check_tracks_open_state() {
        let (client, _dir) = setup(ClientOptions::default()).await;
        assert_eq!(client.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(client.name(), "sqlite");

        client.shutdown().await.unwrap();
        assert!(matches!(
            client.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));

        let err = client.execute(Statement::new("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, SqlGateError::NotOpen));
    }

    #[tokio::test]
    async fn connect_uses_configuration() {
        let dir = tempdir().unwrap();
        let mut config = SqlGateConfig::default();
        config.database.path = dir.path().join("cfg.db").to_string_lossy().into_owned();
        config.client.result_names = NameCase::CamelCase;

        let client = SqliteClient::connect(&config).await.unwrap();
        let rows = client
            .execute(Statement::new("SELECT 1 AS some_value"))
            .await
            .unwrap();
        assert_eq!(rows[0].get("someValue"), Some(&Value::Integer(1)));
        client.close().await;
    }
}
