// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership of the database handle: open, PRAGMA setup, and best-effort close.
//!
//! One [`Database`] owns the single `tokio_rusqlite::Connection` for a
//! configured path. Construct it once at startup and share it (normally
//! behind a [`ConnectionGate`](crate::gate::ConnectionGate)); do NOT open
//! additional connections to the same file for writes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use sqlgate_config::model::DatabaseConfig;
use sqlgate_core::SqlGateError;
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

/// Convert a tokio-rusqlite error into a recoverable storage error.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> SqlGateError {
    SqlGateError::storage(e)
}

/// Connection settings applied on open.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub wal_mode: bool,
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }
}

impl From<&DatabaseConfig> for DatabaseOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            wal_mode: config.wal_mode,
            busy_timeout: config.busy_timeout(),
            foreign_keys: config.foreign_keys,
        }
    }
}

/// Owner of the single database handle for one path.
pub struct Database {
    path: String,
    options: DatabaseOptions,
    handle: RwLock<Option<Connection>>,
    /// Serializes open and close against each other.
    lifecycle: Mutex<()>,
    /// Set while a dropped transaction may still be open on the connection.
    abandoned_transaction: AtomicBool,
}

impl Database {
    /// Create an owner for `path`. Nothing is opened until [`Database::open`].
    pub fn new(path: impl Into<String>, options: DatabaseOptions) -> Self {
        Self {
            path: path.into(),
            options,
            handle: RwLock::new(None),
            lifecycle: Mutex::new(()),
            abandoned_transaction: AtomicBool::new(false),
        }
    }

    /// Create an owner from configuration.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.path.clone(), DatabaseOptions::from(config))
    }

    /// Open the database file and apply connection PRAGMAs.
    ///
    /// Opening while a handle is already live does nothing: no second handle
    /// is created and no error is returned.
    pub async fn open(&self) -> Result<(), SqlGateError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_open() {
            debug!(path = %self.path, "database already open, reusing handle");
            return Ok(());
        }

        self.ensure_parent_dir()?;
        let conn = Connection::open(&self.path)
            .await
            .map_err(SqlGateError::storage)?;
        let options = self.options.clone();
        conn.call(move |conn| -> Result<(), rusqlite::Error> { configure(conn, &options) })
            .await
            .map_err(map_tr_err)?;

        *self.write_handle() = Some(conn);
        info!(path = %self.path, wal = self.options.wal_mode, "database opened");
        Ok(())
    }

    /// Close the database, ignoring any error the engine raises.
    ///
    /// The handle is marked closed before the engine is asked to close, so
    /// the database can always be reopened afterwards. Closing a database
    /// that is not open is a no-op.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(conn) = self.write_handle().take() else {
            debug!(path = %self.path, "close requested but database is not open");
            return;
        };
        // Closing the connection discards any open transaction.
        self.abandoned_transaction.store(false, Ordering::SeqCst);

        if self.options.wal_mode {
            let checkpoint = conn
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                })
                .await;
            if let Err(e) = checkpoint {
                warn!(path = %self.path, error = %e, "WAL checkpoint on close failed, ignoring");
            }
        }

        if let Err(e) = conn.close().await {
            warn!(path = %self.path, error = %e, "error while closing database, ignoring");
        }
        info!(path = %self.path, "database closed");
    }

    /// Returns `true` while a handle is open.
    pub fn is_open(&self) -> bool {
        self.read_handle().is_some()
    }

    /// Path of the database file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A clone of the live connection.
    ///
    /// Statements issued through it bypass the gate; prefer
    /// [`SqliteClient`](crate::SqliteClient).
    pub fn connection(&self) -> Result<Connection, SqlGateError> {
        self.read_handle().clone().ok_or(SqlGateError::NotOpen)
    }

    /// Record that a transaction was dropped before it finished.
    ///
    /// Must be called while holding the connection permit.
    pub(crate) fn mark_abandoned_transaction(&self) {
        self.abandoned_transaction.store(true, Ordering::SeqCst);
    }

    /// Clear the abandoned-transaction mark, returning whether it was set.
    pub(crate) fn take_abandoned_transaction(&self) -> bool {
        self.abandoned_transaction.swap(false, Ordering::SeqCst)
    }

    /// SQLite creates the file but not its directory.
    fn ensure_parent_dir(&self) -> Result<(), SqlGateError> {
        if self.path == ":memory:" || self.path.starts_with("file:") {
            return Ok(());
        }
        match Path::new(&self.path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(SqlGateError::storage)
            }
            _ => Ok(()),
        }
    }

    fn read_handle(&self) -> RwLockReadGuard<'_, Option<Connection>> {
        self.handle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_handle(&self) -> RwLockWriteGuard<'_, Option<Connection>> {
        self.handle.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn configure(conn: &rusqlite::Connection, options: &DatabaseOptions) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(options.busy_timeout)?;
    if options.wal_mode {
        // journal_mode returns the resulting mode as a row.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(mode = %mode, "WAL mode requested but not available");
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    conn.pragma_update(None, "foreign_keys", options.foreign_keys)?;
    Ok(())
}
