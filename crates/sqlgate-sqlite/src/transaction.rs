// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactions that hold the connection permit from BEGIN to COMMIT/ROLLBACK.

use std::sync::Arc;

use async_trait::async_trait;
use sqlgate_core::{RawResult, Row, RowStream, SqlClient, SqlGateError, Statement, Value};
use tracing::{debug, warn};

use crate::client::{ClientOptions, run_on, unsupported_stream};
use crate::database::{Database, map_tr_err};
use crate::gate::ScopedPermit;
use crate::rows;

/// An open transaction on the single connection.
///
/// Statements issued through a `Transaction` run under the permit it already
/// holds, so no other caller's statement can interleave with them. Finish it
/// with [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback).
/// A transaction dropped unfinished is rolled back in the background, and the
/// permit is released only after that rollback has run.
pub struct Transaction {
    permit: Option<ScopedPermit<Database>>,
    conn: tokio_rusqlite::Connection,
    options: Arc<ClientOptions>,
    finished: bool,
}

impl Transaction {
    pub(crate) async fn begin(
        permit: ScopedPermit<Database>,
        options: Arc<ClientOptions>,
    ) -> Result<Self, SqlGateError> {
        let conn = permit.connection()?;
        // The stale-transaction check below covers an abandoned mark.
        permit.take_abandoned_transaction();
        // Built before BEGIN is sent so a cancelled or failed BEGIN still
        // reaches Drop, which cleans up whatever state the engine is in.
        let tx = Self {
            permit: Some(permit),
            conn,
            options,
            finished: false,
        };

        tx.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                if !conn.is_autocommit() {
                    warn!("connection was left inside a transaction, rolling it back");
                    conn.execute_batch("ROLLBACK;")?;
                }
                conn.execute_batch("BEGIN;")
            })
            .await
            .map_err(map_tr_err)?;
        debug!("transaction started");
        Ok(tx)
    }

    /// Commit and release the connection.
    ///
    /// If COMMIT fails the transaction is rolled back before the permit is
    /// released.
    pub async fn commit(mut self) -> Result<(), SqlGateError> {
        self.finish("COMMIT;").await
    }

    /// Roll back and release the connection.
    pub async fn rollback(mut self) -> Result<(), SqlGateError> {
        self.finish("ROLLBACK;").await
    }

    async fn finish(&mut self, sql: &'static str) -> Result<(), SqlGateError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> { conn.execute_batch(sql) })
            .await
            .map_err(map_tr_err)?;
        self.finished = true;
        debug!(sql, "transaction finished");
        Ok(())
    }

    async fn run(&self, statement: Statement) -> Result<RawResult, SqlGateError> {
        run_on(&self.conn, statement, false).await
    }
}

#[async_trait]
impl SqlClient for Transaction {
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

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(permit) = self.permit.take() else {
            return;
        };
        // Cleared by the rollback below. If that never runs, the next holder
        // of the permit rolls back before its own statement.
        permit.mark_abandoned_transaction();

        let conn = self.conn.clone();
        let rollback = async move {
            let result = conn
                .call(|conn| -> Result<(), rusqlite::Error> {
                    if !conn.is_autocommit() {
                        conn.execute_batch("ROLLBACK;")?;
                    }
                    Ok(())
                })
                .await;
            match result {
                Ok(()) => {
                    permit.take_abandoned_transaction();
                }
                Err(e) => warn!(error = %e, "rollback of abandoned transaction failed"),
            }
            drop(permit);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("transaction dropped without commit or rollback, rolling back");
                handle.spawn(rollback);
            }
            Err(_) => {
                warn!("transaction dropped outside a runtime, rollback deferred to the next caller");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteClient;
    use crate::database::DatabaseOptions;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn setup() -> (SqliteClient, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tx.db");
        let client = SqliteClient::new(
            Database::new(path.to_str().unwrap(), DatabaseOptions::default()),
            ClientOptions::default(),
        );
        client.open().await.unwrap();
        client
            .execute(Statement::new("CREATE TABLE log (id INTEGER PRIMARY KEY, v TEXT)"))
            .await
            .unwrap();
        (client, dir)
    }

    async fn values(client: &SqliteClient) -> Vec<String> {
        client
            .execute_values(Statement::new("SELECT v FROM log ORDER BY id"))
            .await
            .unwrap()
            .into_iter()
            .filter_map(|row| row[0].as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn commit_persists_statements() {
        let (client, _dir) = setup().await;
        let tx = client.begin().await.unwrap();
        tx.execute(Statement::new("INSERT INTO log (v) VALUES ('a')"))
            .await
            .unwrap();
        tx.execute(Statement::new("INSERT INTO log (v) VALUES ('b')"))
            .await
            .unwrap();
        assert!(!client.gate().is_available());
        tx.commit().await.unwrap();

        assert!(client.gate().is_available());
        assert_eq!(values(&client).await, vec!["a", "b"]);
        client.close().await;
    }

    #[tokio::test]
    async fn rollback_discards_statements() {
        let (client, _dir) = setup().await;
        let tx = client.begin().await.unwrap();
        tx.execute(Statement::new("INSERT INTO log (v) VALUES ('gone')"))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(values(&client).await.is_empty());
        client.close().await;
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back_before_release() {
        let (client, _dir) = setup().await;
        {
            let tx = client.begin().await.unwrap();
            tx.execute(Statement::new("INSERT INTO log (v) VALUES ('dropped')"))
                .await
                .unwrap();
        }

        // The next statement waits for the background rollback to hand back the permit.
        assert!(values(&client).await.is_empty());
        let tx = client.begin().await.unwrap();
        tx.commit().await.unwrap();
        client.close().await;
    }

    #[tokio::test]
    async fn transaction_helper_commits_and_rolls_back() {
        let (client, _dir) = setup().await;

        let n = client
            .transaction(|tx| {
                Box::pin(async move {
                    tx.execute(Statement::new("INSERT INTO log (v) VALUES ('kept')"))
                        .await?;
                    Ok(1)
                })
            })
            .await
            .unwrap();
        assert_eq!(n, 1);

        let err = client
            .transaction(|tx| {
                Box::pin(async move {
                    tx.execute(Statement::new("INSERT INTO log (v) VALUES ('lost')"))
                        .await?;
                    tx.execute(Statement::new("INSERT INTO missing VALUES (1)"))
                        .await?;
                    Ok(())
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SqlGateError::Storage { .. }));

        assert_eq!(values(&client).await, vec!["kept"]);
        assert!(client.gate().is_available());
        client.close().await;
    }

    #[tokio::test]
    async fn failed_statement_keeps_transaction_usable() {
        let (client, _dir) = setup().await;
        let tx = client.begin().await.unwrap();
        assert!(tx.execute(Statement::new("SELEC 1")).await.is_err());
        tx.execute(Statement::new("INSERT INTO log (v) VALUES ('after')"))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(values(&client).await, vec!["after"]);
        client.close().await;
    }

    #[tokio::test]
    async fn streaming_inside_transaction_is_a_defect() {
        let (client, _dir) = setup().await;
        let tx = client.begin().await.unwrap();
        assert!(matches!(
            tx.execute_stream(Statement::new("SELECT 1")),
            Err(SqlGateError::Defect { .. })
        ));
        tx.rollback().await.unwrap();
        client.close().await;
    }

    #[test]
    fn transaction_dropped_outside_runtime_keeps_later_writes() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let (client, _dir) = rt.block_on(setup());

        let tx = rt.block_on(client.begin()).unwrap();
        rt.block_on(tx.execute(Statement::new("INSERT INTO log (v) VALUES ('abandoned')")))
            .unwrap();
        // No runtime context here, so no rollback task can be spawned.
        drop(tx);
        assert!(client.gate().is_available());

        rt.block_on(async {
            client
                .execute(Statement::new("INSERT INTO log (v) VALUES ('acked')"))
                .await
                .unwrap();
            let tx = client.begin().await.unwrap();
            tx.commit().await.unwrap();

            assert_eq!(values(&client).await, vec!["acked"]);
            client.close().await;
        });
    }

    #[tokio::test]
    async fn cancelled_begin_does_not_leak_permit() {
        let (client, _dir) = setup().await;
        let client = Arc::new(client);

        for _ in 0..50 {
            let task = {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    let _tx = client.begin().await;
                    std::future::pending::<()>().await;
                })
            };
            tokio::task::yield_now().await;
            task.abort();
            let _ = task.await;
        }

        let tx = tokio::time::timeout(Duration::from_secs(5), client.begin())
            .await
            .expect("permit leaked")
            .unwrap();
        tx.commit().await.unwrap();
        client.close().await;
    }
}
