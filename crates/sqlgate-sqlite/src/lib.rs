// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite backend for sqlgate.
//!
//! One [`Database`] owns the single connection to the file. A
//! [`ConnectionGate`] serializes access to it: plain statements hold the
//! permit for one statement, a [`Transaction`] holds it from BEGIN until
//! COMMIT or ROLLBACK. [`SqliteClient`] ties both together behind the
//! [`SqlClient`](sqlgate_core::SqlClient) trait.

pub mod client;
pub mod database;
pub mod gate;
mod rows;
pub mod transaction;

pub use client::{ClientOptions, SqliteClient};
pub use database::{Database, DatabaseOptions};
pub use gate::{ConnectionGate, ScopedPermit, StatementPermit};
pub use transaction::Transaction;
