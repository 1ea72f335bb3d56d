//! The schema model handed to every pass, and the provider that reads it
//! from a live SQLite database.

use std::fmt;
use std::future::Future;

use sqlx::{Connection, Row, SqliteConnection};
use tracing::debug;

use crate::engine::release;
use crate::error::{QsResult, QuerySpeakError};

/// One column as declared in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A table and its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Column names joined with `", "`, ready to splice into a select list.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Ordered table → columns mapping, built once per request.
///
/// Table order follows the source database; the first table is the
/// fallback target when a query names none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaModel {
    tables: Vec<TableDef>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. A table with the same name replaces the earlier one in place.
    pub fn with_table<I, N, T>(mut self, name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        let table = TableDef {
            name: name.to_string(),
            columns: columns
                .into_iter()
                .map(|(n, t)| ColumnDef::new(n, t))
                .collect(),
        };
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: TableDef) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    /// Look a table up by name, ignoring ASCII case.
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn first_table(&self) -> Option<&TableDef> {
        self.tables.first()
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render the schema as prompt text, one line per table.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SchemaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            let cols: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.data_type).trim_end().to_string())
                .collect();
            writeln!(f, "{}({})", table.name, cols.join(", "))?;
        }
        Ok(())
    }
}

/// Supplies a fresh [`SchemaModel`] on every call.
pub trait SchemaProvider {
    fn schema(&self) -> impl Future<Output = QsResult<SchemaModel>> + Send;
}

/// Reads table metadata from a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteSchemaProvider {
    url: String,
}

impl SqliteSchemaProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SchemaProvider for SqliteSchemaProvider {
    async fn schema(&self) -> QsResult<SchemaModel> {
        let mut conn = SqliteConnection::connect(&self.url)
            .await
            .map_err(|e| QuerySpeakError::Connection(e.to_string()))?;

        let result = read_schema(&mut conn).await;
        release(conn).await;
        result
    }
}

async fn read_schema(conn: &mut SqliteConnection) -> QsResult<SchemaModel> {
    let names: Vec<String> = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| QuerySpeakError::Schema(e.to_string()))?
    .iter()
    .map(|row| row.try_get::<String, _>(0))
    .collect::<Result<_, _>>()
    .map_err(|e| QuerySpeakError::Schema(e.to_string()))?;

    let mut schema = SchemaModel::new();
    for name in names {
        let pragma = format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\""));
        let rows = sqlx::query(&pragma)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| QuerySpeakError::Schema(e.to_string()))?;

        // table_info columns: cid, name, type, notnull, dflt_value, pk
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let col: String = row
                .try_get(1)
                .map_err(|e| QuerySpeakError::Schema(e.to_string()))?;
            let ty: String = row.try_get(2).unwrap_or_default();
            columns.push(ColumnDef::new(col, ty));
        }

        debug!(table = %name, columns = columns.len(), "loaded table");
        schema.insert(TableDef { name, columns });
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> SchemaModel {
        SchemaModel::new()
            .with_table("employees", [("id", "INTEGER"), ("name", "TEXT")])
            .with_table("departments", [("id", "INTEGER"), ("manager", "")])
    }

    #[test]
    fn test_order_is_preserved() {
        let schema = sample();
        let names: Vec<&str> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["employees", "departments"]);
        assert_eq!(schema.first_table().unwrap().name, "employees");
    }

    #[test]
    fn test_lookup_ignores_case() {
        let schema = sample();
        assert!(schema.table("EMPLOYEES").is_some());
        assert!(schema.table("staff").is_none());
        assert!(schema.table("employees").unwrap().has_column("NAME"));
    }

    #[test]
    fn test_duplicate_table_replaces_in_place() {
        let schema = sample().with_table("employees", [("id", "INTEGER")]);
        assert_eq!(schema.tables().len(), 2);
        assert_eq!(schema.tables()[0].column_list(), "id");
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            sample().describe(),
            "employees(id INTEGER, name TEXT)\ndepartments(id INTEGER, manager)\n"
        );
    }
}
