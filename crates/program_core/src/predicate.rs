//! Predicate compiler: `FilterSpecification` → ordered, parameterized predicates.
//!
//! Every predicate binds exactly one parameter, numbered in emission order from
//! `$1`. User input only ever travels as a parameter, never as query text.
//!
//! Known limitation: contains-matches pass the raw substring, so a literal `%`
//! or `_` typed by a user acts as a wildcard.

use serde::Serialize;
use tracing::debug;

use crate::error::{ProgramError, Result};
use crate::filter::{FilterSpecification, RangeFilter};
use crate::sql::SqlValue;

/// Program columns a filter may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterColumn {
    Name,
    CategoryId,
    Status,
    LossRatio,
    GrossPremium,
    Underwriter,
}

impl FilterColumn {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Name => "p.name",
            Self::CategoryId => "p.category_id",
            Self::Status => "p.status",
            Self::LossRatio => "p.loss_ratio",
            Self::GrossPremium => "p.gross_premium",
            Self::Underwriter => "p.underwriter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    /// Case-insensitive substring match.
    Contains,
    Equals,
    /// Membership in an array parameter.
    AnyOf,
    AtLeast,
    AtMost,
}

/// One `column op $n` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub column: FilterColumn,
    pub op: PredicateOp,
    pub placeholder: usize,
}

impl Predicate {
    pub fn to_sql(&self) -> String {
        let col = self.column.sql();
        let n = self.placeholder;
        match self.op {
            PredicateOp::Contains => format!("{col} ILIKE ('%' || ${n} || '%')"),
            PredicateOp::Equals => format!("{col} = ${n}"),
            PredicateOp::AnyOf => format!("{col}::text = ANY(${n})"),
            PredicateOp::AtLeast => format!("{col} >= ${n}"),
            PredicateOp::AtMost => format!("{col} <= ${n}"),
        }
    }
}

/// Ordered predicates with their parameters, placeholders `$1..=$k`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledPredicateSet {
    predicates: Vec<Predicate>,
    params: Vec<SqlValue>,
}

impl CompiledPredicateSet {
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Placeholder index the next appended parameter must use.
    pub fn next_placeholder(&self) -> usize {
        self.params.len() + 1
    }

    /// AND-joined conjunction, or the constant `TRUE` when nothing filters.
    pub fn where_sql(&self) -> String {
        if self.predicates.is_empty() {
            return "TRUE".to_string();
        }
        self.predicates
            .iter()
            .map(Predicate::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[derive(Default)]
struct PredicateBuilder {
    set: CompiledPredicateSet,
}

impl PredicateBuilder {
    fn bind(&mut self, column: FilterColumn, op: PredicateOp, value: SqlValue) {
        let placeholder = self.set.next_placeholder();
        self.set.predicates.push(Predicate {
            column,
            op,
            placeholder,
        });
        self.set.params.push(value);
    }

    fn text(
        &mut self,
        column: FilterColumn,
        op: PredicateOp,
        value: &Option<String>,
    ) -> Result<()> {
        if let Some(value) = value {
            ensure_representable(column, value)?;
            self.bind(column, op, SqlValue::Text(value.clone()));
        }
        Ok(())
    }

    fn range(&mut self, column: FilterColumn, range: &RangeFilter) {
        if let Some(min) = range.min {
            self.bind(column, PredicateOp::AtLeast, SqlValue::Decimal(min));
        }
        if let Some(max) = range.max {
            self.bind(column, PredicateOp::AtMost, SqlValue::Decimal(max));
        }
    }

    fn finish(self) -> CompiledPredicateSet {
        self.set
    }
}

/// Compile every present field of `spec` into one predicate, in a fixed
/// field order. Pagination fields are not predicates and are ignored here.
pub fn compile(spec: &FilterSpecification) -> Result<CompiledPredicateSet> {
    let mut builder = PredicateBuilder::default();

    builder.text(FilterColumn::Name, PredicateOp::Contains, &spec.search)?;

    if let Some(category_id) = spec.category_id {
        builder.bind(
            FilterColumn::CategoryId,
            PredicateOp::Equals,
            SqlValue::Uuid(category_id),
        );
    }

    if let Some(statuses) = &spec.statuses {
        if statuses.is_empty() {
            return Err(ProgramError::InvalidFilterValue(
                "status: list must name at least one status".into(),
            ));
        }
        let values = statuses.iter().map(|s| s.as_str().to_string()).collect();
        builder.bind(
            FilterColumn::Status,
            PredicateOp::AnyOf,
            SqlValue::TextArray(values),
        );
    }

    builder.range(FilterColumn::LossRatio, &spec.loss_ratio);
    builder.range(FilterColumn::GrossPremium, &spec.gross_premium);

    builder.text(FilterColumn::Underwriter, PredicateOp::Contains, &spec.underwriter)?;

    let set = builder.finish();
    debug!(predicates = set.len(), "compiled filter specification");
    Ok(set)
}

fn ensure_representable(column: FilterColumn, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(ProgramError::InvalidFilterValue(format!(
            "{}: text must not contain NUL characters",
            column.sql()
        )));
    }
    Ok(())
}
