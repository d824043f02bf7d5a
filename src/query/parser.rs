//! SQL query parser.
//!
//! Queries target SQLite, so statements are parsed with the SQLite dialect.

use crate::types::{DatabaseError, Result};
use sqlparser::ast::{Select, SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// SQL query parser.
pub struct QueryParser;

impl QueryParser {
    /// Parse a single SQL statement.
    ///
    /// # Arguments
    ///
    /// * `sql` - SQL query string
    ///
    /// # Returns
    ///
    /// Parsed `Statement`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ParseError` if SQL is invalid or does not
    /// contain exactly one statement
    pub fn parse(sql: &str) -> Result<Statement> {
        let mut statements = Parser::parse_sql(&SQLiteDialect {}, sql)
            .map_err(|e| DatabaseError::parse(e.to_string()))?;

        if statements.len() != 1 {
            return Err(DatabaseError::parse(format!(
                "expected one statement, found {}",
                statements.len()
            )));
        }

        Ok(statements.remove(0))
    }

    /// Parse a plain `SELECT` statement.
    ///
    /// Set operations, parenthesised bodies and `WITH` clauses are not plain
    /// selects.
    ///
    /// # Returns
    ///
    /// `Some(Select)` for a plain select, `None` otherwise
    pub fn parse_select(sql: &str) -> Option<Select> {
        let Statement::Query(query) = Self::parse(sql).ok()? else {
            return None;
        };

        if query.with.is_some() {
            return None;
        }

        match *query.body {
            SetExpr::Select(select) => Some(*select),
            _ => None,
        }
    }

    /// Validate query syntax.
    ///
    /// # Returns
    ///
    /// `true` if the text parses as exactly one statement
    pub fn validate(sql: &str) -> bool {
        Self::parse(sql).is_ok()
    }
}
