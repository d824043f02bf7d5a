//! Placeholder rewriting for user query text.
//!
//! Sources are referenced in queries as:
//!
//! - `{}`: shorthand for `{0}`
//! - `{N}`: the whole source `N` (0-based)
//! - `{N, "path"}` / `{N, 'path'}`: records at `path` inside source `N`
//! - `{"path"}` / `{'path'}`: records at `path` inside source 0
//!
//! Whole-source references become either `GET_SOURCE(N)` or, when a table
//! mapping is supplied, the destination table name. Path references always
//! become `GET_SOURCE(N, "path")` since they address a sub-structure rather
//! than a loaded relation. A placeholder with a malformed or unterminated path
//! literal does not match and is left in the text untouched.

use crate::storage::SourceTables;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Name of the indirect lookup function emitted for unresolved references.
pub const SOURCE_FUNCTION: &str = "GET_SOURCE";

/// A source referenced by a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    /// 0-based source index
    pub index: usize,

    /// Unquoted, unescaped path inside the source
    pub path: Option<String>,
}

/// Result of rewriting a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenQuery {
    /// Query text with placeholders replaced
    pub sql: String,

    /// Distinct references in first-seen order
    pub references: Vec<SourceRef>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let dq = r#""(?:[^"\\]|\\.)*""#;
        let sq = r#"'(?:[^'\\]|\\.)*'"#;
        let pattern = format!(
            r"\{{(?:(?P<index>[0-9]+)(?:,\s*(?P<path>{dq}|{sq}))?|(?P<bare>{dq}|{sq}))?\}}"
        );
        Regex::new(&pattern).expect("placeholder pattern is valid")
    })
}

/// Rewrite placeholders in `query`.
///
/// # Arguments
///
/// * `query` - Raw user query
/// * `tables` - Direct table mapping; `None` emits `GET_SOURCE(N)` for whole sources
///
/// # Example
///
/// ```rust
/// use percolate_sql::query::rewrite_query;
/// use percolate_sql::storage::SourceTables;
///
/// let tables = SourceTables::default();
/// let rewritten = rewrite_query("SELECT * FROM {}", Some(&tables));
/// assert_eq!(rewritten.sql, "SELECT * FROM t_0");
///
/// let rewritten = rewrite_query(r#"SELECT * FROM {1, "a.b"}"#, None);
/// assert_eq!(rewritten.sql, r#"SELECT * FROM GET_SOURCE(1, "a.b")"#);
/// ```
pub fn rewrite_query(query: &str, tables: Option<&SourceTables>) -> RewrittenQuery {
    rewrite_with(query, |source, literal| match (literal, tables) {
        (Some(literal), _) => format!("{}({}, {})", SOURCE_FUNCTION, source.index, literal),
        (None, Some(tables)) => tables.table(source.index),
        (None, None) => format!("{}({})", SOURCE_FUNCTION, source.index),
    })
}

/// Rewrite placeholders with a custom resolver.
///
/// The resolver receives each reference and, for path references, the path
/// literal exactly as written (quotes included).
pub fn rewrite_with<F>(query: &str, mut resolve: F) -> RewrittenQuery
where
    F: FnMut(&SourceRef, Option<&str>) -> String,
{
    let query = query.replace("{}", "{0}");
    let mut references: Vec<SourceRef> = Vec::new();

    let sql = placeholder_re().replace_all(&query, |caps: &Captures| {
        let index = match caps.name("index") {
            Some(m) => match m.as_str().parse::<usize>() {
                Ok(index) => index,
                // Out of range indexes are left for the store to reject
                Err(_) => return caps[0].to_string(),
            },
            None => 0,
        };
        let literal = caps.name("path").or_else(|| caps.name("bare")).map(|m| m.as_str());

        let source = SourceRef {
            index,
            path: literal.map(unquote),
        };
        let replacement = resolve(&source, literal);

        if !references.contains(&source) {
            references.push(source);
        }
        replacement
    });

    RewrittenQuery {
        sql: sql.into_owned(),
        references,
    }
}

/// Strip the surrounding quotes of a path literal and resolve backslash escapes.
pub fn unquote(literal: &str) -> String {
    let inner = if literal.len() >= 2 {
        &literal[1..literal.len() - 1]
    } else {
        literal
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
