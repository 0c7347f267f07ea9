//! Statistics aggregator: grouped counts and scalar aggregates over the
//! (optionally filtered) program table, answered by a single statement.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::{ProgramError, Result};
use crate::filter::FilterSpecification;
use crate::ports::{with_deadline, Deadline, RecordStore};
use crate::predicate::{compile, CompiledPredicateSet};
use crate::sql::{Row, RowSet, SqlStatement, StatementBuilder};
use crate::types::ProgramStatus;

const DIMENSION_TOTAL: &str = "total";
const DIMENSION_STATUS: &str = "status";
const DIMENSION_CATEGORY: &str = "category";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub total: i64,
    /// Only statuses with at least one program appear.
    pub by_status: BTreeMap<ProgramStatus, i64>,
    /// Keyed by category name.
    pub by_category: BTreeMap<String, i64>,
    /// Mean loss ratio rounded to 2 places, 0 when there are no programs.
    pub avg_loss_ratio: Decimal,
    pub total_gross_premium: Decimal,
}

/// Flat rows `(dimension, bucket, row_count, avg_loss_ratio, total_gross_premium)`:
/// one totals row, then one row per status and per category group.
pub fn summary_statement(predicates: &CompiledPredicateSet) -> SqlStatement {
    let mut b = StatementBuilder::filtered(predicates);
    b.push("WITH filtered AS (SELECT p.* FROM programs p WHERE ")
        .push_predicates()
        .push(
            ") \
             SELECT 'total' AS dimension, NULL::text AS bucket, COUNT(*) AS row_count, \
             COALESCE(ROUND(AVG(f.loss_ratio), 2), 0) AS avg_loss_ratio, \
             COALESCE(SUM(f.gross_premium), 0) AS total_gross_premium \
             FROM filtered f \
             UNION ALL \
             SELECT 'status', f.status::text, COUNT(*), \
             COALESCE(ROUND(AVG(f.loss_ratio), 2), 0), COALESCE(SUM(f.gross_premium), 0) \
             FROM filtered f GROUP BY f.status \
             UNION ALL \
             SELECT 'category', c.name, COUNT(*), \
             COALESCE(ROUND(AVG(f.loss_ratio), 2), 0), COALESCE(SUM(f.gross_premium), 0) \
             FROM filtered f JOIN program_categories c ON c.id = f.category_id GROUP BY c.name",
        );
    b.build()
}

/// Fold the flat aggregate rows into the nested summary.
pub fn reshape(set: &RowSet) -> Result<StatisticsSummary> {
    let mut totals: Option<&Row> = None;
    let mut by_status = BTreeMap::new();
    let mut by_category = BTreeMap::new();

    for row in &set.rows {
        let dimension = row.text("dimension")?;
        match dimension.as_str() {
            DIMENSION_TOTAL => totals = Some(row),
            DIMENSION_STATUS => {
                let raw = bucket(row)?;
                let status = ProgramStatus::parse(&raw).ok_or_else(|| {
                    ProgramError::internal(format!("unknown program status '{raw}'"))
                })?;
                by_status.insert(status, row.int("row_count")?);
            }
            DIMENSION_CATEGORY => {
                by_category.insert(bucket(row)?, row.int("row_count")?);
            }
            other => {
                return Err(ProgramError::internal(format!(
                    "unexpected statistics dimension '{other}'"
                )))
            }
        }
    }

    let totals = totals.ok_or_else(|| ProgramError::internal("statistics totals row missing"))?;
    let summary = StatisticsSummary {
        total: totals.int("row_count")?,
        by_status,
        by_category,
        avg_loss_ratio: totals.decimal("avg_loss_ratio")?,
        total_gross_premium: totals.decimal("total_gross_premium")?,
    };

    let status_sum: i64 = summary.by_status.values().sum();
    if status_sum != summary.total {
        return Err(ProgramError::internal(format!(
            "status groups sum to {status_sum} but total is {}",
            summary.total
        )));
    }
    Ok(summary)
}

fn bucket(row: &Row) -> Result<String> {
    row.opt_text("bucket")?
        .ok_or_else(|| ProgramError::internal("statistics group row without bucket"))
}

pub struct StatisticsAggregator {
    store: Arc<dyn RecordStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Summary over every program, or over those matching `filter`.
    /// Pagination fields of the filter are ignored.
    pub async fn summarize(
        &self,
        filter: Option<&FilterSpecification>,
        deadline: Deadline,
    ) -> Result<StatisticsSummary> {
        let predicates = match filter {
            Some(spec) => compile(spec)?,
            None => CompiledPredicateSet::default(),
        };
        let statement = summary_statement(&predicates);
        debug!(predicates = predicates.len(), "summarizing programs");

        let set = with_deadline(
            deadline,
            "summarize programs",
            self.store.execute(&statement, deadline),
        )
        .await?;
        reshape(&set)
    }
}
