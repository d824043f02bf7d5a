//! Predicate pushdown for bulk loads.
//!
//! Compiles the WHERE clause of a single-table SELECT into a row filter that
//! runs while records are loaded, so rows the query can never return are not
//! persisted. The evaluator is deliberately narrow:
//!
//! - integer and string literals, column references, and the comparisons
//!   `=`, `<`, `>`, `<=`, `>=` are evaluated
//! - comparisons are lexicographic over text, never numeric
//! - everything else (function calls, other operators, qualified columns,
//!   missing fields) is indeterminate, and indeterminate rows are kept
//!
//! The filter only ever runs ahead of the store executing the real query,
//! which remains authoritative.

use crate::query::parser::QueryParser;
use crate::types::{RowRecord, RowValue};
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
    Select, SelectItem, TableFactor, UnaryOperator, Value,
};
use std::cmp::Ordering;

/// A compiled WHERE clause.
#[derive(Debug, Clone)]
pub struct RowPredicate {
    selection: Option<Expr>,
    identifiers: Vec<String>,
}

/// Everything pushdown needs from a supported query.
#[derive(Debug, Clone)]
pub struct Pushdown {
    /// The single FROM target
    pub relation: String,

    /// Columns referenced by the projection and WHERE clause
    pub identifiers: Vec<String>,

    /// Row filter built from the WHERE clause
    pub predicate: RowPredicate,
}

/// Compile a query for pushdown.
///
/// # Arguments
///
/// * `sql` - Query text with placeholders already rewritten
///
/// # Returns
///
/// `None` when the query is outside the supported grammar; callers then load
/// without filtering
pub fn compile(sql: &str) -> Option<Pushdown> {
    let select = QueryParser::parse_select(sql)?;
    let identifiers = identifiers(&select)?;
    let relation = relation_name(&select)?;

    Some(Pushdown {
        relation,
        identifiers,
        predicate: RowPredicate::new(&select),
    })
}

/// Collect the columns a SELECT references.
///
/// Constants contribute nothing, function calls and binary expressions
/// contribute their operands, column references contribute their dotted path.
/// The statement must have exactly one plain FROM table.
///
/// # Returns
///
/// `Some(identifiers)` (duplicates removed, first-seen order) when every
/// projection item and the WHERE clause are supported, `None` otherwise
pub fn identifiers(select: &Select) -> Option<Vec<String>> {
    let mut fields = Vec::new();

    for item in &select.projection {
        let expr = match item {
            SelectItem::UnnamedExpr(expr) => expr,
            SelectItem::ExprWithAlias { expr, .. } => expr,
            _ => return None,
        };
        fields.extend(expr_identifiers(expr)?);
    }

    relation_name(select)?;

    if let Some(selection) = &select.selection {
        fields.extend(expr_identifiers(selection)?);
    }

    let mut unique: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        if !unique.contains(&field) {
            unique.push(field);
        }
    }
    Some(unique)
}

/// Name of the single plain table in the FROM clause.
pub fn relation_name(select: &Select) -> Option<String> {
    let [from] = select.from.as_slice() else {
        return None;
    };
    if !from.joins.is_empty() {
        return None;
    }

    match &from.relation {
        TableFactor::Table {
            name, args: None, ..
        } => {
            let relation = join_idents(&name.0);
            (!relation.is_empty()).then_some(relation)
        }
        _ => None,
    }
}

fn join_idents(parts: &[Ident]) -> String {
    parts
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn expr_identifiers(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Value(_) => Some(Vec::new()),
        Expr::Function(func) => {
            let mut fields = Vec::new();
            for arg in function_args(func)? {
                fields.extend(expr_identifiers(arg)?);
            }
            Some(fields)
        }
        Expr::BinaryOp { left, right, .. } => {
            let mut fields = expr_identifiers(left)?;
            fields.extend(expr_identifiers(right)?);
            Some(fields)
        }
        Expr::Nested(inner) => expr_identifiers(inner),
        Expr::UnaryOp { expr, .. } => expr_identifiers(expr),
        Expr::Identifier(ident) => Some(vec![ident.value.clone()]),
        Expr::CompoundIdentifier(parts) => Some(vec![join_idents(parts)]),
        _ => None,
    }
}

/// Plain positional arguments of a function call.
///
/// A bare `*` argument (as in `count(*)`) is accepted and contributes nothing.
fn function_args(func: &Function) -> Option<Vec<&Expr>> {
    if func.over.is_some() || func.filter.is_some() {
        return None;
    }

    match &func.args {
        FunctionArguments::None => Some(Vec::new()),
        FunctionArguments::Subquery(_) => None,
        FunctionArguments::List(list) => {
            if !list.clauses.is_empty() {
                return None;
            }

            let mut args = Vec::with_capacity(list.args.len());
            for arg in &list.args {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => args.push(expr),
                    FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => {}
                    _ => return None,
                }
            }
            Some(args)
        }
    }
}

/// Result of evaluating an expression against one record.
#[derive(Debug, Clone, PartialEq)]
enum Evaluated {
    Text(String),
    Bool(bool),
}

impl RowPredicate {
    /// Build the predicate for a parsed SELECT.
    pub fn new(select: &Select) -> Self {
        let identifiers = select
            .selection
            .as_ref()
            .and_then(expr_identifiers)
            .unwrap_or_default();

        Self {
            selection: select.selection.clone(),
            identifiers,
        }
    }

    /// Columns the WHERE clause depends on.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Whether the query has a WHERE clause at all.
    pub fn has_filter(&self) -> bool {
        self.selection.is_some()
    }

    /// Decide whether a record can be dropped before loading.
    ///
    /// # Returns
    ///
    /// `true` when the WHERE clause evaluates to a defined value other than
    /// `true`; rows evaluating to an indeterminate value are kept
    pub fn should_skip(&self, record: &RowRecord) -> bool {
        let Some(selection) = &self.selection else {
            return false;
        };

        match eval(selection, record) {
            Some(Evaluated::Bool(true)) | None => false,
            Some(_) => true,
        }
    }
}

fn eval(expr: &Expr, record: &RowRecord) -> Option<Evaluated> {
    match expr {
        Expr::Value(value) => eval_constant(value),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match expr.as_ref() {
            Expr::Value(Value::Number(n, _)) => {
                let i: i64 = n.parse().ok()?;
                Some(Evaluated::Text((-i).to_string()))
            }
            _ => None,
        },
        Expr::Nested(inner) => eval(inner, record),
        // Function semantics are left to the store.
        Expr::Function(_) => None,
        Expr::BinaryOp { left, op, right } => {
            let Evaluated::Text(l) = eval(left, record)? else {
                return None;
            };
            let Evaluated::Text(r) = eval(right, record)? else {
                return None;
            };
            let ordering = l.cmp(&r);

            let result = match op {
                BinaryOperator::Gt => ordering == Ordering::Greater,
                BinaryOperator::Lt => ordering == Ordering::Less,
                BinaryOperator::GtEq => ordering != Ordering::Less,
                BinaryOperator::LtEq => ordering != Ordering::Greater,
                BinaryOperator::Eq => ordering == Ordering::Equal,
                _ => return None,
            };
            Some(Evaluated::Bool(result))
        }
        Expr::Identifier(ident) => match record.get_path(&ident.value) {
            Some(value) => stored_text(value).map(Evaluated::Text),
            // SQLite reads a double-quoted name that is not a column as a string
            None if ident.quote_style == Some('"') => Some(Evaluated::Text(ident.value.clone())),
            None => None,
        },
        _ => None,
    }
}

fn eval_constant(value: &Value) -> Option<Evaluated> {
    match value {
        Value::Number(n, _) => n.parse::<i64>().ok().map(|i| Evaluated::Text(i.to_string())),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
            Some(Evaluated::Text(s.clone()))
        }
        _ => None,
    }
}

/// Text form of a record value as the store will hold it.
///
/// Booleans are bound as integers and whole floats keep a `.0`, so a value
/// compares the same way before and after loading into a TEXT column. Floats
/// whose text the store would render differently are indeterminate.
fn stored_text(value: &RowValue) -> Option<String> {
    match value {
        RowValue::Bool(b) => Some(String::from(if *b { "1" } else { "0" })),
        RowValue::Float(f) if !f.is_finite() || f.abs() >= 1e15 => None,
        RowValue::Float(f) if f.fract() == 0.0 => Some(format!("{:.1}", f)),
        RowValue::Float(f) => {
            let text = f.to_string();
            let digits = text
                .trim_start_matches(['-', '0', '.'])
                .chars()
                .filter(char::is_ascii_digit)
                .count();
            (f.abs() >= 1e-4 && digits <= 15).then_some(text)
        }
        other => Some(other.render()),
    }
}
