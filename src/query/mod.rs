//! SQL query handling: placeholder rewriting, parsing and predicate pushdown.

pub mod parser;
pub mod predicate;
pub mod rewrite;

pub use parser::QueryParser;
pub use predicate::{compile, identifiers, Pushdown, RowPredicate};
pub use rewrite::{rewrite_query, rewrite_with, RewrittenQuery, SourceRef, SOURCE_FUNCTION};
