//! Row buffering and multi-row INSERT construction.

use crate::storage::schema::quote_ident;
use crate::types::{Result, RowValue};
use rusqlite::types::Value;

/// Flat buffer of pending rows.
///
/// Values are stored row-major with a fixed stride of `width` values per row.
/// When the table gains columns mid-batch the buffer is widened and earlier
/// rows are padded with `NULL`, keeping every row aligned with the current
/// column list.
#[derive(Debug, Clone, Default)]
pub struct RowBuffer {
    values: Vec<Value>,
    width: usize,
}

impl RowBuffer {
    pub fn new(width: usize) -> Self {
        Self {
            values: Vec::new(),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of buffered rows.
    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append one row.
    ///
    /// Short rows are padded with `NULL`; extra values are dropped.
    pub fn push_row(&mut self, row: impl IntoIterator<Item = Value>) {
        let start = self.values.len();
        self.values.extend(row.into_iter().take(self.width));
        let end = start + self.width;
        if self.values.len() < end {
            self.values.resize(end, Value::Null);
        }
    }

    /// Grow the row stride to `width`, padding buffered rows with `NULL`.
    pub fn widen(&mut self, width: usize) {
        if width <= self.width {
            return;
        }
        if self.values.is_empty() || self.width == 0 {
            self.width = width;
            return;
        }

        let extra = width - self.width;
        let mut widened = Vec::with_capacity(self.rows() * width);
        for row in self.values.chunks(self.width) {
            widened.extend_from_slice(row);
            widened.extend(std::iter::repeat(Value::Null).take(extra));
        }
        self.values = widened;
        self.width = width;
    }

    /// All buffered values, row-major.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Drop buffered rows, keeping the allocation.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Multi-row `INSERT` with positional parameters.
///
/// # Arguments
///
/// * `table` - Destination table
/// * `width` - Values per row
/// * `rows` - Rows bound by the statement
///
/// # Example
///
/// ```rust
/// use percolate_sql::storage::batch::insert_sql;
///
/// assert_eq!(insert_sql("t_0", 2, 2), r#"INSERT INTO "t_0" VALUES (?,?),(?,?)"#);
/// ```
pub fn insert_sql(table: &str, width: usize, rows: usize) -> String {
    let row = format!("({})", vec!["?"; width].join(","));
    let values = vec![row.as_str(); rows].join(",");
    format!("INSERT INTO {} VALUES {}", quote_ident(table), values)
}

/// Convert a record value to a store value.
///
/// Lists are stored as JSON text and nested maps as `NULL`; a missing value
/// is `NULL`.
///
/// # Errors
///
/// Returns `DatabaseError::JsonError` if a list cannot be serialized
pub fn coerce(value: Option<&RowValue>) -> Result<Value> {
    let value = match value {
        None | Some(RowValue::Null) | Some(RowValue::Map(_)) => Value::Null,
        Some(RowValue::Bool(b)) => Value::Integer(i64::from(*b)),
        Some(RowValue::Int(i)) => Value::Integer(*i),
        Some(RowValue::Float(f)) if f.is_nan() => Value::Null,
        Some(RowValue::Float(f)) => Value::Real(*f),
        Some(RowValue::String(s)) => Value::Text(s.clone()),
        Some(list @ RowValue::List(_)) => Value::Text(list.to_json_text()?),
    };
    Ok(value)
}
