// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between engine values and sqlgate result shapes.

use std::sync::Arc;

use rusqlite::types::ValueRef;
use sqlgate_core::{NameTransform, RawResult, Row, Statement, Value};

/// Run one statement to completion and collect every row.
///
/// Column names come from the prepared statement, so every row of the
/// result shares one column list.
pub(crate) fn query_all(
    conn: &rusqlite::Connection,
    statement: &Statement,
) -> Result<RawResult, rusqlite::Error> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    // `changes()` keeps the count of the last write, so only trust it when
    // this statement moved the running total.
    let total_before = conn.total_changes();

    let params = rusqlite::params_from_iter(statement.params.iter().map(to_engine));
    let mut rows = Vec::new();
    {
        let mut cursor = stmt.query(params)?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(from_engine(row.get_ref(i)?));
            }
            rows.push(values);
        }
    }

    Ok(RawResult {
        columns,
        rows,
        changes: if conn.total_changes() != total_before {
            conn.changes() as u64
        } else {
            0
        },
        last_insert_rowid: conn.last_insert_rowid(),
    })
}

/// Name every row, applying the result-name transform once per result set.
pub(crate) fn into_rows(raw: RawResult, transform: Option<&NameTransform>) -> Vec<Row> {
    let columns: Arc<[String]> = match transform {
        Some(f) => raw.columns.iter().map(|c| f(c)).collect(),
        None => raw.columns.into(),
    };
    raw.rows
        .into_iter()
        .map(|values| Row::new(Arc::clone(&columns), values))
        .collect()
}

fn to_engine(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

fn from_engine(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}
