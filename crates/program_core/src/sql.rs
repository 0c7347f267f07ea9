//! Parameterized SQL values, statements and decoded rows.
//!
//! `StatementBuilder` is the only way to produce a `SqlStatement`. It owns the
//! placeholder cursor, so every `$n` in the text has exactly one parameter at
//! position `n - 1`, and callers never number placeholders by hand.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ProgramError, Result};
use crate::predicate::CompiledPredicateSet;

/// A parameter or column value crossing the `RecordStore` port.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    TextArray(Vec<String>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::TextArray(_) => "text[]",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextArray(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// Whether the store should decode result rows or only report rows affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, or a write with RETURNING.
    Rows,
    /// A write without RETURNING.
    Command,
}

/// Immutable `(text, params)` pair ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    text: String,
    params: Vec<SqlValue>,
    kind: StatementKind,
}

impl SqlStatement {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }
}

/// Assembles a `SqlStatement`, appending `$n` placeholders from its own cursor.
///
/// A builder created with [`StatementBuilder::filtered`] starts with the
/// predicate parameters in slots `1..=k`; [`push_predicates`] may then be
/// written any number of times (Postgres allows reuse of `$n`), and every
/// [`push_bind`] continues at `k + 1`.
///
/// [`push_predicates`]: StatementBuilder::push_predicates
/// [`push_bind`]: StatementBuilder::push_bind
#[derive(Debug)]
pub struct StatementBuilder {
    text: String,
    params: Vec<SqlValue>,
    predicate_sql: String,
    kind: StatementKind,
}

impl StatementBuilder {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            text: String::new(),
            params: Vec::new(),
            predicate_sql: "TRUE".to_string(),
            kind,
        }
    }

    pub fn filtered(predicates: &CompiledPredicateSet) -> Self {
        Self {
            text: String::new(),
            params: predicates.params().to_vec(),
            predicate_sql: predicates.where_sql(),
            kind: StatementKind::Rows,
        }
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Write the compiled predicate conjunction (`TRUE` when there is none).
    pub fn push_predicates(&mut self) -> &mut Self {
        self.text.push_str(&self.predicate_sql);
        self
    }

    pub fn push_bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.params.push(value.into());
        let placeholder = format!("${}", self.params.len());
        self.text.push_str(&placeholder);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn build(self) -> SqlStatement {
        SqlStatement {
            text: self.text,
            params: self.params,
            kind: self.kind,
        }
    }
}

/// One decoded result row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<SqlValue>) {
        self.values.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.values
            .get(column)
            .ok_or_else(|| ProgramError::internal(format!("missing column '{column}'")))
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid> {
        match self.get(column)? {
            SqlValue::Uuid(v) => Ok(*v),
            other => Err(mismatch(column, "uuid", other)),
        }
    }

    pub fn opt_uuid(&self, column: &str) -> Result<Option<Uuid>> {
        match self.get(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Uuid(v) => Ok(Some(*v)),
            other => Err(mismatch(column, "uuid", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        match self.get(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.get(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(v) => Ok(Some(v.clone())),
            other => Err(mismatch(column, "text", other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        match self.get(column)? {
            SqlValue::Int(v) => Ok(*v),
            other => Err(mismatch(column, "int", other)),
        }
    }

    /// Decimal column; integer columns widen losslessly.
    pub fn decimal(&self, column: &str) -> Result<Decimal> {
        match self.get(column)? {
            SqlValue::Decimal(v) => Ok(*v),
            SqlValue::Int(v) => Ok(Decimal::from(*v)),
            other => Err(mismatch(column, "decimal", other)),
        }
    }

    pub fn opt_decimal(&self, column: &str) -> Result<Option<Decimal>> {
        match self.get(column)? {
            SqlValue::Null => Ok(None),
            _ => self.decimal(column).map(Some),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        match self.get(column)? {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(mismatch(column, "timestamp", other)),
        }
    }
}

fn mismatch(column: &str, expected: &str, found: &SqlValue) -> ProgramError {
    ProgramError::internal(format!(
        "column '{column}': expected {expected}, found {}",
        found.type_name()
    ))
}

/// Result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl RowSet {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            rows,
            rows_affected,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}
