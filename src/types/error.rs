//! Error types for loading and querying operations.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.
//!
//! Queries the predicate compiler cannot interpret are not errors: they are
//! reported as `None` and the caller falls back to an unfiltered load.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error type for all loader, store and source operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A record is not a flat key/value structure where one is required
    #[error("Unsupported record shape: {0}")]
    UnsupportedRecordShape(String),

    /// Store failure (open, DDL, prepare, execute)
    #[error("Store error: {0}")]
    StoreError(#[from] rusqlite::Error),

    /// Hierarchical namespace writes are not implemented by the loader
    #[error("Namespaces are not supported: {0}")]
    NamespaceUnsupported(String),

    /// Write attempted on a closed loader
    #[error("Loader for table {0} is closed")]
    LoaderClosed(String),

    /// Query references a source index with no input
    #[error("No input source at index {0}")]
    UnknownSource(usize),

    /// Path-qualified reference does not address an array of records
    #[error("Path {path} not found in source {index}")]
    PathNotFound { index: usize, path: String },

    /// Record source could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Input format could not be determined or is unknown
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DatabaseError {
    /// Create a record shape error with context.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::UnsupportedRecordShape(msg.into())
    }

    /// Create a parse error with context.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Check whether the failure came from the store.
    ///
    /// # Returns
    ///
    /// `true` if the destination table should be considered unusable
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::StoreError(_))
    }
}
