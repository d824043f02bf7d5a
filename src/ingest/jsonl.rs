//! JSON Lines import.

use super::RecordSource;
use crate::types::{DatabaseError, Result, RowValue};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// JSONL importer.
pub struct JsonlImporter;

impl JsonlImporter {
    /// Open a JSON Lines file as a lazy row stream.
    ///
    /// Values may be separated by any whitespace; blank lines are ignored.
    /// A malformed value ends the stream with `DatabaseError::ParseError`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordSource> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let values = serde_json::Deserializer::from_reader(reader).into_iter::<serde_json::Value>();

        Ok(Box::new(values.map(|value| {
            value
                .map(RowValue::from)
                .map_err(|e| DatabaseError::parse(e.to_string()))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        fs::write(&path, "{\"a\": 1}\n\n{\"a\": 2}\n").unwrap();

        let rows: Vec<RowValue> = JsonlImporter::open(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_record().unwrap().get("a"), Some(&RowValue::Int(2)));
    }

    #[test]
    fn test_malformed_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        fs::write(&path, "{\"a\": 1}\n{\"a\": \n").unwrap();

        let rows: Vec<Result<RowValue>> = JsonlImporter::open(&path).unwrap().collect();
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(DatabaseError::ParseError(_))));
    }
}
