//! Record sources: decode input files into row values.
//!
//! Every reader yields `Result<RowValue>` items so loaders can stream rows
//! without holding a whole file in memory (plain JSON documents excepted).

pub mod csv;
pub mod json;
pub mod jsonl;

pub use self::csv::CsvImporter;
pub use self::json::JsonImporter;
pub use self::jsonl::JsonlImporter;

use crate::types::{DatabaseError, Result, RowValue};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stream of decoded rows.
pub type RecordSource = Box<dyn Iterator<Item = Result<RowValue>>>;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON array of objects, or a single object
    Json,
    /// One JSON value per line
    JsonLines,
    Csv,
    Tsv,
}

impl Format {
    /// Resolve a format from a type name or file extension.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnsupportedFormat` for unknown names
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            other => Err(DatabaseError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Resolve a format from a file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| DatabaseError::UnsupportedFormat(path.display().to_string()))?;
        Self::parse(extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input source of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInput {
    pub path: PathBuf,

    /// Explicit format; inferred from the extension when `None`
    pub format: Option<Format>,
}

impl SourceInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Effective format of this input.
    pub fn format(&self) -> Result<Format> {
        match self.format {
            Some(format) => Ok(format),
            None => Format::from_path(&self.path),
        }
    }

    /// Open a row stream over this input.
    ///
    /// # Arguments
    ///
    /// * `convert_numbers` - Turn numeric-looking CSV/TSV fields into numbers
    pub fn records(&self, convert_numbers: bool) -> Result<RecordSource> {
        match self.format()? {
            Format::Json => JsonImporter::open(&self.path),
            Format::JsonLines => JsonlImporter::open(&self.path),
            Format::Csv => CsvImporter::open(&self.path, b',', convert_numbers),
            Format::Tsv => CsvImporter::open(&self.path, b'\t', convert_numbers),
        }
    }

    /// Read the whole input as a single document.
    ///
    /// JSON inputs yield their document; line and delimited formats yield a
    /// list of their rows.
    pub fn document(&self, convert_numbers: bool) -> Result<RowValue> {
        match self.format()? {
            Format::Json => JsonImporter::read_document(&self.path),
            _ => Ok(RowValue::List(
                self.records(convert_numbers)?.collect::<Result<Vec<_>>>()?,
            )),
        }
    }
}

/// Rows found at `path` inside a document.
///
/// The path is dotted (`data.items`); the value there must be a list of rows.
///
/// # Errors
///
/// Returns `DatabaseError::PathNotFound` if the path does not resolve to a list
pub fn records_at_path(document: &RowValue, index: usize, path: &str) -> Result<Vec<RowValue>> {
    let not_found = || DatabaseError::PathNotFound {
        index,
        path: path.to_string(),
    };

    let found = if path.is_empty() {
        document
    } else {
        document.as_record().and_then(|r| r.get_path(path)).ok_or_else(not_found)?
    };

    match found {
        RowValue::List(items) => Ok(items.clone()),
        _ => Err(not_found()),
    }
}

/// Parse a delimited field, turning numeric text into numbers.
pub(crate) fn convert_number(field: &str) -> RowValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return RowValue::from(field);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return RowValue::Int(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => RowValue::Float(f),
        _ => RowValue::from(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_resolution() {
        assert_eq!(Format::parse("JSON").unwrap(), Format::Json);
        assert_eq!(Format::parse("ndjson").unwrap(), Format::JsonLines);
        assert_eq!(Format::parse(".tsv").unwrap(), Format::Tsv);
        assert_eq!(Format::from_path(Path::new("a/b.csv")).unwrap(), Format::Csv);
        assert!(matches!(
            Format::parse("parquet"),
            Err(DatabaseError::UnsupportedFormat(_))
        ));
        assert!(Format::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_records_at_path() {
        let doc = RowValue::from(json!({"data": {"items": [{"a": 1}, {"a": 2}]}, "n": 1}));

        assert_eq!(records_at_path(&doc, 0, "data.items").unwrap().len(), 2);
        assert!(matches!(
            records_at_path(&doc, 2, "n"),
            Err(DatabaseError::PathNotFound { index: 2, .. })
        ));
        assert!(records_at_path(&doc, 0, "missing").is_err());
    }

    #[test]
    fn test_convert_number() {
        assert_eq!(convert_number("12"), RowValue::Int(12));
        assert_eq!(convert_number(" 1.5 "), RowValue::Float(1.5));
        assert_eq!(convert_number("1e3"), RowValue::Float(1000.0));
        assert_eq!(convert_number("inf"), RowValue::from("inf"));
        assert_eq!(convert_number("abc"), RowValue::from("abc"));
        assert_eq!(convert_number(""), RowValue::from(""));
    }
}
