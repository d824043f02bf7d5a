//! JSON document import.

use super::RecordSource;
use crate::types::{DatabaseError, Result, RowValue};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// JSON importer.
pub struct JsonImporter;

impl JsonImporter {
    /// Open a JSON file as a row stream.
    ///
    /// An array yields its elements; any other document yields itself as a
    /// single row.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ParseError` if the file is not valid JSON
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordSource> {
        let rows = match Self::read_document(path)? {
            RowValue::List(items) => items,
            other => vec![other],
        };
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    /// Read a JSON file into a single value.
    pub fn read_document<P: AsRef<Path>>(path: P) -> Result<RowValue> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(reader)
            .map_err(|e| DatabaseError::parse(format!("{}: {}", path.display(), e)))?;
        Ok(RowValue::from(value))
    }
}
