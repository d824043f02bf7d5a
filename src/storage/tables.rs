//! Source index to destination table naming.
//!
//! The same mapping object is handed to the placeholder rewriter and the
//! loader driver so both agree on table names without string-formatting
//! conventions spread across components.

/// Deterministic mapping from input sources to table names.
///
/// Whole sources map to `{prefix}{index}` (`t_0`, `t_1`, ...). A path inside a
/// source maps to `{prefix}{index}_{sanitized path}_{hash}`, where the hash
/// keeps paths that sanitize identically apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTables {
    prefix: String,
}

impl Default for SourceTables {
    fn default() -> Self {
        Self::new("t_")
    }
}

impl SourceTables {
    /// Create a mapping with the given table prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Table holding a whole source.
    pub fn table(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    /// Table holding the records found at `path` inside a source.
    ///
    /// # Arguments
    ///
    /// * `index` - Source index
    /// * `path` - Unquoted path (e.g. `data.items`)
    pub fn path_table(&self, index: usize, path: &str) -> String {
        let sanitized: String = path
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        format!("{}{}_{}_{:08x}", self.prefix, index, sanitized, fnv1a(path))
    }

    /// Recover the source index of a whole-source table name.
    ///
    /// # Returns
    ///
    /// `Some(index)` if `table` was produced by [`SourceTables::table`]
    pub fn index_of(&self, table: &str) -> Option<usize> {
        let digits = table.strip_prefix(&self.prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index: usize = digits.parse().ok()?;
        // Reject non-canonical forms such as `t_01`
        (self.table(index) == table).then_some(index)
    }
}

/// 32-bit FNV-1a.
fn fnv1a(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in s.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
