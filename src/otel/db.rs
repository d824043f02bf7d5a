//! Store operation instrumentation.
//!
//! Implements OpenTelemetry semantic conventions for SQLite operations.

use tracing::{field, span, Level, Span};

/// Store operation types (maps to `db.operation.name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    /// Open a store connection
    Connect,
    /// Lazily create a destination table
    CreateTable,
    /// Add a column discovered mid-stream
    AlterTable,
    /// Flush buffered rows as multi-row inserts
    BatchInsert,
    /// Load one source into its table
    Load,
    /// Run the user query
    Query,
}

impl DbOperation {
    /// Get operation name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::CreateTable => "create_table",
            Self::AlterTable => "alter_table",
            Self::BatchInsert => "batch_insert",
            Self::Load => "load",
            Self::Query => "query",
        }
    }
}

/// Create store operation span with semantic conventions.
///
/// # Arguments
///
/// * `operation` - Store operation type
/// * `table` - Destination table (optional)
/// * `namespace` - Store location (optional)
///
/// # Returns
///
/// Tracing span with OpenTelemetry semantic attributes
pub fn db_span(operation: DbOperation, table: Option<&str>, namespace: Option<&str>) -> Span {
    let span_name = match table {
        Some(table) => format!("{} {}", operation.as_str(), table),
        None => operation.as_str().to_string(),
    };

    let span = span!(
        Level::INFO,
        "db",
        otel.name = %span_name,
        otel.kind = "client",
        db.system.name = "sqlite",
        db.operation.name = operation.as_str(),
        db.collection.name = field::Empty,
        db.namespace = field::Empty,
        db.response.returned_rows = field::Empty,
        db.response.affected_rows = field::Empty,
    );

    if let Some(table) = table {
        span.record("db.collection.name", table);
    }
    if let Some(ns) = namespace {
        span.record("db.namespace", ns);
    }

    span
}

/// Create span for executing user query text.
///
/// # Arguments
///
/// * `query_text` - Rewritten SQL
/// * `namespace` - Store location (optional)
pub fn db_query_span(query_text: &str, namespace: Option<&str>) -> Span {
    let span = span!(
        Level::INFO,
        "db.query",
        otel.name = "query",
        otel.kind = "client",
        db.system.name = "sqlite",
        db.operation.name = DbOperation::Query.as_str(),
        db.query.text = query_text,
        db.namespace = field::Empty,
        db.response.returned_rows = field::Empty,
        db.response.affected_rows = field::Empty,
    );

    if let Some(ns) = namespace {
        span.record("db.namespace", ns);
    }

    span
}

/// Record row counts on the current span.
///
/// # Arguments
///
/// * `rows_returned` - Rows returned by a query (optional)
/// * `rows_affected` - Rows written (optional)
pub fn record_db_metrics(rows_returned: Option<usize>, rows_affected: Option<usize>) {
    let span = Span::current();
    if let Some(returned) = rows_returned {
        span.record("db.response.returned_rows", returned);
    }
    if let Some(affected) = rows_affected {
        span.record("db.response.affected_rows", affected);
    }
}
