//! Dynamically typed record values.
//!
//! Upstream parsers decode every file format into `RowValue`s. The variant set
//! is closed so that coercion into the store (lists to JSON text, maps to
//! flattened columns or `NULL`) is checked exhaustively.

use super::record::RowRecord;
use serde::Serialize;

/// A single decoded value inside a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<RowValue>),
    Map(RowRecord),
}

impl RowValue {
    /// Borrow the nested record if this value is a map.
    pub fn as_record(&self) -> Option<&RowRecord> {
        match self {
            Self::Map(record) => Some(record),
            _ => None,
        }
    }

    /// Borrow the string if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Serialize the value as JSON text.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::JsonError` if serialization fails
    pub fn to_json_text(&self) -> crate::types::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Generic textual representation.
    ///
    /// Strings render as themselves, scalars through `Display`, `Null` as
    /// `null`, and lists/maps as JSON text.
    pub fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(_) | Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl From<serde_json::Value> for RowValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RowValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RowValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for RowValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for RowValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for RowValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<RowRecord> for RowValue {
    fn from(record: RowRecord) -> Self {
        Self::Map(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_key_order() {
        let value = RowValue::from(json!({"z": 1, "a": "x", "m": [1, 2]}));
        let record = value.as_record().unwrap();

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(record.get("z"), Some(&RowValue::Int(1)));
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(RowValue::from(json!(12)), RowValue::Int(12));
        assert_eq!(RowValue::from(json!(1.5)), RowValue::Float(1.5));
        assert_eq!(RowValue::from(json!(u64::MAX)), RowValue::Float(u64::MAX as f64));
    }

    #[test]
    fn test_render() {
        assert_eq!(RowValue::from("abc").render(), "abc");
        assert_eq!(RowValue::Int(12).render(), "12");
        assert_eq!(RowValue::Float(2.5).render(), "2.5");
        assert_eq!(RowValue::Bool(true).render(), "true");
        assert_eq!(RowValue::Null.render(), "null");
        assert_eq!(RowValue::from(json!([1, "a", null])).render(), r#"[1,"a",null]"#);
        assert_eq!(RowValue::from(json!({"b": {"c": 2}})).render(), r#"{"b":{"c":2}}"#);
    }

    #[test]
    fn test_json_text() {
        let list = RowValue::from(json!(["x", {"y": true}]));
        assert_eq!(list.to_json_text().unwrap(), r#"["x",{"y":true}]"#);
    }
}
