//! Tracing instrumentation for store operations.
//!
//! Follows OpenTelemetry semantic conventions for database operations:
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//!
//! **Span naming**: `{db.operation.name} {table}`
//! - Example: `create_table t_0`, `batch_insert t_1`
//!
//! **Required attributes**:
//! - `db.system.name`: Always `"sqlite"`
//!
//! **Conditionally required**:
//! - `db.collection.name`: Destination table
//! - `db.namespace`: Store location
//!
//! # Example
//!
//! ```rust,ignore
//! use percolate_sql::otel::{db_span, DbOperation};
//!
//! let span = db_span(DbOperation::BatchInsert, Some("t_0"), None);
//! let _guard = span.entered();
//! ```

pub mod db;

pub use db::{db_query_span, db_span, record_db_metrics, DbOperation};
