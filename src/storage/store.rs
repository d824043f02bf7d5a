//! SQLite store connections and query execution.
//!
//! Loaders and the query session each hold their own connection to the same
//! store. For the in-memory case this is a named shared-cache database, which
//! stays alive as long as at least one connection to it is open.

use crate::otel::{db_query_span, db_span, record_db_metrics, DbOperation};
use crate::storage::schema::quote_ident;
use crate::types::{Result, RowRecord, RowValue};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Database file on disk
    File(PathBuf),
    /// Named shared-cache in-memory database
    Memory(String),
}

impl StoreLocation {
    /// A fresh in-memory store with a unique name.
    pub fn memory() -> Self {
        Self::Memory(format!("psq-{}", uuid::Uuid::new_v4()))
    }

    /// Connection string understood by SQLite.
    pub fn connection_string(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory(name) => format!("file:{}?mode=memory&cache=shared", name),
        }
    }

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::StoreError` if the store cannot be opened
    pub fn open(&self) -> Result<Connection> {
        let namespace = self.connection_string();
        let span = db_span(DbOperation::Connect, None, Some(&namespace));
        let _guard = span.enter();

        let conn = match self {
            Self::File(path) => Connection::open(path)?,
            Self::Memory(_) => Connection::open(&namespace)?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;

        debug!(namespace = %namespace, "Opened store connection");
        Ok(conn)
    }
}

/// Rows produced by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Result column names in select order
    pub columns: Vec<String>,

    /// Row values, positionally aligned with `columns`
    pub rows: Vec<Vec<RowValue>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as records keyed by column name.
    ///
    /// Duplicate column names keep the last value.
    pub fn to_records(&self) -> Vec<RowRecord> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Values of one column by name.
    pub fn column(&self, name: &str) -> Option<Vec<RowValue>> {
        let position = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[position].clone()).collect())
    }
}

/// Run a query and collect every row.
///
/// # Arguments
///
/// * `conn` - Store connection
/// * `sql` - Query text with placeholders already rewritten
///
/// # Errors
///
/// Returns `DatabaseError::StoreError` if the store rejects the query
pub fn execute_query(conn: &Connection, sql: &str) -> Result<QueryResult> {
    let span = db_query_span(sql, conn.path());
    let _guard = span.enter();

    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_sql(row.get_ref(i)?));
        }
        rows.push(values);
    }

    record_db_metrics(Some(rows.len()), None);
    Ok(QueryResult { columns, rows })
}

/// Column names of a table in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Check whether a table exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn from_sql(value: ValueRef<'_>) -> RowValue {
    match value {
        ValueRef::Null => RowValue::Null,
        ValueRef::Integer(i) => RowValue::Int(i),
        ValueRef::Real(f) => RowValue::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            RowValue::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_locations_are_unique() {
        let a = StoreLocation::memory();
        let b = StoreLocation::memory();
        assert_ne!(a, b);
        assert!(a.connection_string().starts_with("file:psq-"));
        assert!(a.connection_string().ends_with("?mode=memory&cache=shared"));
    }

    #[test]
    fn test_shared_memory_store() {
        let location = StoreLocation::memory();
        let writer = location.open().unwrap();
        let reader = location.open().unwrap();

        writer
            .execute_batch(r#"CREATE TABLE "t_0" ("a" TEXT, "b" TEXT); INSERT INTO "t_0" VALUES ('x', NULL);"#)
            .unwrap();

        assert!(table_exists(&reader, "t_0").unwrap());
        assert!(!table_exists(&reader, "t_1").unwrap());
        assert_eq!(table_columns(&reader, "t_0").unwrap(), vec!["a", "b"]);

        let result = execute_query(&reader, "SELECT a, b, 1 + 1 AS n, 0.5 AS f FROM t_0").unwrap();
        assert_eq!(result.columns, vec!["a", "b", "n", "f"]);
        assert_eq!(
            result.rows,
            vec![vec![
                RowValue::from("x"),
                RowValue::Null,
                RowValue::Int(2),
                RowValue::Float(0.5)
            ]]
        );

        let records = result.to_records();
        assert_eq!(records[0].get("a"), Some(&RowValue::from("x")));
        assert_eq!(result.column("n"), Some(vec![RowValue::Int(2)]));
        assert_eq!(result.column("missing"), None);
    }

    #[test]
    fn test_query_errors_are_store_errors() {
        let conn = StoreLocation::memory().open().unwrap();
        let err = execute_query(&conn, "SELECT * FROM nowhere").unwrap_err();
        assert!(err.is_store_error());
    }
}
