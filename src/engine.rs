//! SQL execution against SQLite.
//!
//! Every call opens its own connection and closes it again on the way out,
//! whether the statement succeeded or not. There is no pool and no
//! long-lived transaction.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Connection, Row as _, SqliteConnection, TypeInfo};
use tracing::{debug, trace};

use crate::error::{QsResult, QuerySpeakError};

/// A result row as a positional tuple. Column names are not attached here.
pub type Row = Vec<serde_json::Value>;

/// Runs one SQL statement and returns its rows.
///
/// Implementations report a database they cannot open as
/// [`QuerySpeakError::Connection`] and a statement that fails as
/// [`QuerySpeakError::Execution`]; the diagnostic pass relies on the split.
pub trait Executor {
    fn execute(&self, sql: &str) -> impl Future<Output = QsResult<Vec<Row>>> + Send;
}

/// Executes against a SQLite database URL.
///
/// Supported URL formats:
/// - `sqlite://path/to/database.db`
/// - `sqlite://path/to/database.db?mode=rwc` (create if missing)
/// - `sqlite::memory:`
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    url: String,
}

impl SqliteExecutor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Executor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> QsResult<Vec<Row>> {
        let mut conn = SqliteConnection::connect(&self.url)
            .await
            .map_err(|e| QuerySpeakError::Connection(e.to_string()))?;

        let result = sqlx::query(sql).fetch_all(&mut conn).await;
        release(conn).await;

        let rows = result.map_err(|e| QuerySpeakError::Execution(e.to_string()))?;
        debug!(rows = rows.len(), "statement executed");
        Ok(rows.iter().map(row_to_tuple).collect())
    }
}

/// Close a connection, logging rather than propagating a failed close.
///
/// Returns whether the close succeeded.
pub(crate) async fn release(conn: SqliteConnection) -> bool {
    match conn.close().await {
        Ok(()) => {
            trace!("connection closed");
            true
        }
        Err(e) => {
            debug!(error = %e, "closing connection failed");
            false
        }
    }
}

/// Convert a SqliteRow to a positional tuple.
fn row_to_tuple(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| decode_cell(row, i, column.type_info().name()))
        .collect()
}

/// Decode by declared type first, then fall back through the storage classes.
///
/// SQLite is dynamically typed: a `TEXT` column can hold an integer and an
/// expression column has no declared type at all.
fn decode_cell(row: &SqliteRow, i: usize, type_name: &str) -> serde_json::Value {
    use serde_json::Value;

    let declared = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(i).ok().map(|v| v.map(Value::Bool)),
        "INTEGER" => row
            .try_get::<Option<i64>, _>(i)
            .ok()
            .map(|v| v.map(|n| Value::Number(n.into()))),
        "REAL" => row
            .try_get::<Option<f64>, _>(i)
            .ok()
            .map(|v| v.and_then(serde_json::Number::from_f64).map(Value::Number)),
        _ => None,
    };
    if let Some(value) = declared {
        return value.unwrap_or(Value::Null);
    }

    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(i) {
        return Value::String(format!("<blob {} bytes>", bytes.len()));
    }
    Value::Null
}

/// Render a cell for terminal output.
pub fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_database_round_trip() {
        let exec = SqliteExecutor::new("sqlite::memory:");
        let rows = exec
            .execute("SELECT 1, 2.5, 'x', NULL, CAST('ab' AS BLOB)")
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![json!(1), json!(2.5), json!("x"), json!(null), json!("<blob 2 bytes>")]]
        );
    }

    #[tokio::test]
    async fn test_statement_failure_is_execution_error() {
        let exec = SqliteExecutor::new("sqlite::memory:");
        let err = exec.execute("SELECT * FROM nowhere").await.unwrap_err();
        assert!(matches!(err, QuerySpeakError::Execution(ref m) if m.contains("no such table")));
    }

    #[tokio::test]
    async fn test_unopenable_database_is_connection_error() {
        let exec = SqliteExecutor::new("sqlite:///nonexistent-dir/for/queryspeak/test.db");
        let err = exec.execute("SELECT 1").await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_release_closes_connection() {
        let conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        assert!(release(conn).await);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!(null)), "NULL");
        assert_eq!(cell_to_string(&json!(42)), "42");
        assert_eq!(cell_to_string(&json!("Aarav")), "Aarav");
    }
}
