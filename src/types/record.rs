//! Row records: ordered field maps produced by record sources.

use super::value::RowValue;
use indexmap::IndexMap;
use serde::Serialize;

/// One decoded unit of input data.
///
/// Keys keep the order in which they were first seen, so a record read from a
/// CSV header or a JSON object reports its fields in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RowRecord(IndexMap<String, RowValue>);

impl RowRecord {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RowValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&RowValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a value by field path.
    ///
    /// An exact key match wins. Otherwise the path is split on `.` and walked
    /// through nested maps. As a last resort a top-level key is matched
    /// ignoring ASCII case, since store column names are case-insensitive.
    ///
    /// # Arguments
    ///
    /// * `path` - Field name or dotted path (e.g. `user.address.city`)
    ///
    /// # Returns
    ///
    /// `Some(&RowValue)` if the path resolves, `None` otherwise
    pub fn get_path(&self, path: &str) -> Option<&RowValue> {
        if let Some(value) = self.0.get(path) {
            return Some(value);
        }

        if path.contains('.') {
            if let Some(value) = self.walk(path) {
                return Some(value);
            }
        }

        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(path))
            .map(|(_, v)| v)
    }

    fn walk(&self, path: &str) -> Option<&RowValue> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_record()?.get(segment)?;
        }
        Some(current)
    }

    /// Dotted paths of every non-map leaf, depth first in key order.
    ///
    /// Empty nested maps contribute no paths.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Path of this record inside its parent (empty at the root)
    pub fn leaf_paths(&self, prefix: &str) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaf_paths(prefix, &mut paths);
        paths
    }

    fn collect_leaf_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (key, value) in &self.0 {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            match value {
                RowValue::Map(inner) => inner.collect_leaf_paths(&path, out),
                _ => out.push(path),
            }
        }
    }
}

impl FromIterator<(String, RowValue)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (String, RowValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for RowRecord {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, RowValue::from(v))).collect()
    }
}
