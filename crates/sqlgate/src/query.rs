// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `query` subcommand.

use clap::ValueEnum;
use sqlgate_core::{SqlClient, SqlGateError, Statement, Value};

/// Result shape printed by `sqlgate query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Objects keyed by (transformed) column name.
    Rows,
    /// Arrays of values in column order.
    Values,
    /// Column names, value arrays, and change counters.
    Raw,
}

/// Parse a command-line literal into a bound value.
///
/// `null` becomes NULL, integers and reals keep their type, a value wrapped
/// in single quotes is always text, and anything else is text as given.
pub fn parse_param(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Some(text) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::Text(text.to_string());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::Real(f),
        _ => Value::Text(raw.to_string()),
    }
}

/// Run `sql` with `params` and encode the result in the requested shape.
pub async fn run_query<C: SqlClient + ?Sized>(
    client: &C,
    sql: &str,
    params: &[String],
    mode: OutputMode,
) -> Result<serde_json::Value, SqlGateError> {
    let statement = Statement::new(sql).with_params(params.iter().map(|p| parse_param(p)).collect());
    let encoded = match mode {
        OutputMode::Rows => serde_json::to_value(client.execute(statement).await?),
        OutputMode::Values => serde_json::to_value(client.execute_values(statement).await?),
        OutputMode::Raw => serde_json::to_value(client.execute_raw(statement).await?),
    };
    encoded.map_err(|e| SqlGateError::Internal(format!("failed to encode result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlgate_test_utils::TestHarness;

    #[test]
    fn literals_keep_their_type() {
        assert_eq!(parse_param("NULL"), Value::Null);
        assert_eq!(parse_param("-3"), Value::Integer(-3));
        assert_eq!(parse_param("2.5"), Value::Real(2.5));
        assert_eq!(parse_param("'42'"), Value::Text("42".into()));
        assert_eq!(parse_param("hello"), Value::Text("hello".into()));
        assert_eq!(parse_param("'"), Value::Text("'".into()));
        assert_eq!(parse_param("inf"), Value::Text("inf".into()));
    }

    #[tokio::test]
    async fn every_mode_encodes_as_json() {
        let harness = TestHarness::builder()
            .with_schema("CREATE TABLE kv (k TEXT, v INTEGER)")
            .build()
            .await
            .unwrap();
        let client = harness.client();

        let raw = run_query(
            client.as_ref(),
            "INSERT INTO kv VALUES (?1, ?2)",
            &["a".into(), "1".into()],
            OutputMode::Raw,
        )
        .await
        .unwrap();
        assert_eq!(raw["changes"], json!(1));

        let rows = run_query(client.as_ref(), "SELECT k, v FROM kv", &[], OutputMode::Rows)
            .await
            .unwrap();
        assert_eq!(rows, json!([{ "k": "a", "v": 1 }]));

        let values = run_query(client.as_ref(), "SELECT k, v FROM kv", &[], OutputMode::Values)
            .await
            .unwrap();
        assert_eq!(values, json!([["a", 1]]));
        client.close().await;
    }
}
