//! Destination table schema: column inference, evolution and DDL text.

use crate::config::{ColumnType, NestedMode};
use crate::types::{RowRecord, RowValue};
use indexmap::IndexMap;

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Ordered, duplicate-free column list of a destination table.
///
/// Columns are only ever appended, so positions stay valid for the lifetime
/// of the loader and match the table's physical column order. Names are
/// matched ignoring ASCII case, as the store does; the first spelling seen
/// is the one kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: IndexMap<String, String>,
    fixed: bool,
}

fn fold(column: &str) -> String {
    column.to_ascii_lowercase()
}

impl FieldSet {
    /// Column list supplied by the caller.
    ///
    /// Unseen top-level keys of later records are ignored for a fixed set.
    pub fn from_override(columns: &[String]) -> Self {
        let mut set = Self {
            fields: IndexMap::new(),
            fixed: true,
        };
        for column in columns {
            set.push(column.as_str());
        }
        set
    }

    /// Infer columns from the first accepted record, in the record's key order.
    ///
    /// # Arguments
    ///
    /// * `record` - First record
    /// * `nested` - With `NestedMode::Flatten` a nested map contributes its leaf paths
    pub fn infer(record: &RowRecord, nested: NestedMode) -> Self {
        let mut set = Self::default();
        for column in record_columns(record, nested) {
            set.push(column);
        }
        set
    }

    /// Columns required by `record` that are not yet in the set.
    ///
    /// Leaf paths of nested maps under declared columns are always considered
    /// (in flatten mode); other unseen keys only when the set is not fixed.
    pub fn discover(&self, record: &RowRecord, nested: NestedMode) -> Vec<String> {
        let mut candidates = Vec::new();

        if self.fixed {
            if nested == NestedMode::Flatten {
                for field in self.iter() {
                    if let Some(RowValue::Map(inner)) = record.get_path(field) {
                        candidates.extend(inner.leaf_paths(field));
                    }
                }
            }
        } else {
            candidates = record_columns(record, nested);
        }

        let mut new_columns: Vec<String> = Vec::new();
        for column in candidates {
            let seen = new_columns.iter().any(|c| c.eq_ignore_ascii_case(&column));
            if !self.contains(&column) && !seen {
                new_columns.push(column);
            }
        }
        new_columns
    }

    /// Append a column.
    ///
    /// # Returns
    ///
    /// `true` if no column of the same name (ignoring case) was present
    pub fn push(&mut self, column: impl Into<String>) -> bool {
        let column = column.into();
        let key = fold(&column);
        if self.fields.contains_key(&key) {
            return false;
        }
        self.fields.insert(key, column);
        true
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(&fold(column))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.fields.values().cloned().collect()
    }
}

fn record_columns(record: &RowRecord, nested: NestedMode) -> Vec<String> {
    let mut columns = Vec::with_capacity(record.len());
    for (key, value) in record.iter() {
        match (value, nested) {
            (RowValue::Map(inner), NestedMode::Flatten) => columns.extend(inner.leaf_paths(key)),
            _ => columns.push(key.to_string()),
        }
    }
    columns
}

/// `CREATE TABLE` statement with a uniform column type.
pub fn create_table_sql(table: &str, fields: &FieldSet, column_type: ColumnType) -> String {
    let columns = fields
        .iter()
        .map(|field| format!("{} {}", quote_ident(field), column_type.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({})", quote_ident(table), columns)
}

/// `ALTER TABLE ... ADD` statement for a discovered column.
pub fn add_column_sql(table: &str, column: &str, column_type: ColumnType) -> String {
    format!(
        "ALTER TABLE {} ADD {} {}",
        quote_ident(table),
        quote_ident(column),
        column_type.as_sql()
    )
}
