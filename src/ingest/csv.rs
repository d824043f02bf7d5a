//! Delimited text import (CSV, TSV).

use super::{convert_number, RecordSource};
use crate::types::{Result, RowRecord, RowValue};
use std::fs::File;
use std::path::Path;

/// CSV/TSV importer.
pub struct CsvImporter;

impl CsvImporter {
    /// Open a delimited file as a lazy row stream.
    ///
    /// The first line holds the column names. Short lines leave trailing
    /// columns out of the row; extra fields are ignored.
    ///
    /// # Arguments
    ///
    /// * `path` - Input file
    /// * `delimiter` - Field delimiter (`b','` or `b'\t'`)
    /// * `convert_numbers` - Parse numeric-looking fields as numbers
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::CsvError` if the header cannot be read
    pub fn open<P: AsRef<Path>>(path: P, delimiter: u8, convert_numbers: bool) -> Result<RecordSource> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(File::open(path.as_ref())?);
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let rows = reader.into_records().map(move |record| -> Result<RowValue> {
            let record = record?;
            let row: RowRecord = headers
                .iter()
                .zip(record.iter())
                .map(|(name, field)| {
                    let value = if convert_numbers {
                        convert_number(field)
                    } else {
                        RowValue::from(field)
                    };
                    (name.clone(), value)
                })
                .collect();
            Ok(RowValue::Map(row))
        });

        Ok(Box::new(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn rows(path: &Path, delimiter: u8, convert: bool) -> Vec<RowRecord> {
        CsvImporter::open(path, delimiter, convert)
            .unwrap()
            .map(|r| match r.unwrap() {
                RowValue::Map(record) => record,
                other => panic!("unexpected row {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_csv_as_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.csv");
        fs::write(&path, "id,name\n1,alice\n2,\"bob, jr\"\n").unwrap();

        let rows = rows(&path, b',', false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&RowValue::from("1")));
        assert_eq!(rows[1].get("name"), Some(&RowValue::from("bob, jr")));
    }

    #[test]
    fn test_tsv_with_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ages.tsv");
        fs::write(&path, "id\tage\tnote\n1\t30.5\tx\n2\n").unwrap();

        let rows = rows(&path, b'\t', true);
        assert_eq!(rows[0].get("id"), Some(&RowValue::Int(1)));
        assert_eq!(rows[0].get("age"), Some(&RowValue::Float(30.5)));
        assert_eq!(rows[0].get("note"), Some(&RowValue::from("x")));
        assert_eq!(rows[1].len(), 1);
    }
}
