//! SQLite storage: connections, table naming, schema evolution and bulk loading.

pub mod batch;
pub mod loader;
pub mod schema;
pub mod store;
pub mod tables;

pub use loader::{BulkLoader, LoaderState, LoaderStats, RowWriter};
pub use schema::{quote_ident, FieldSet};
pub use store::{execute_query, table_columns, table_exists, QueryResult, StoreLocation};
pub use tables::SourceTables;
