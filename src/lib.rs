//! Percolate SQL - run SQL over data files
//!
//! Streams records decoded from JSON, JSON Lines, CSV and TSV files into an
//! embedded SQLite store and runs a query over them:
//! - Tables are created lazily and gain columns as new fields appear
//! - Rows are flushed in transactions of multi-row INSERT statements
//! - Simple WHERE clauses filter rows while loading (predicate pushdown)
//!
//! Sources are referenced in queries with placeholders (`{0}`, `{1, "path"}`);
//! see [`query::rewrite`].

pub mod config;
pub mod ingest;
pub mod otel;
pub mod query;
pub mod storage;
pub mod types;

// High-level session API
pub mod database;

pub use config::{Config, LoaderOptions};
pub use database::Session;
pub use types::{DatabaseError, Result, RowRecord, RowValue};
