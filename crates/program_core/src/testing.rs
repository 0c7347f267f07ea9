//! Scripted `RecordStore` for engine and router tests. Enabled by the
//! `test-support` feature (and always inside this crate's own tests).

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{ProgramError, Result};
use crate::ports::{Deadline, RecordStore};
use crate::sql::{Row, RowSet, SqlStatement, SqlValue};
use crate::types::ProgramStatus;

/// Replays queued responses in order and records every statement it receives.
#[derive(Default)]
pub struct ScriptedStore {
    responses: Mutex<VecDeque<Result<Vec<RowSet>>>>,
    statements: Mutex<Vec<SqlStatement>>,
    latency: Option<Duration>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to exercise deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_rows(&self, sets: Vec<RowSet>) -> &Self {
        self.queue().push_back(Ok(sets));
        self
    }

    pub fn push_error(&self, error: ProgramError) -> &Self {
        self.queue().push_back(Err(error));
        self
    }

    /// Statements received so far, in order.
    pub fn statements(&self) -> Vec<SqlStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<RowSet>>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn respond(&self, statements: &[SqlStatement]) -> Result<Vec<RowSet>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(statements.iter().cloned());
        self.queue()
            .pop_front()
            .unwrap_or_else(|| Err(ProgramError::internal("no scripted response queued")))
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn execute(&self, statement: &SqlStatement, _deadline: Deadline) -> Result<RowSet> {
        let mut sets = self.respond(std::slice::from_ref(statement)).await?;
        if sets.is_empty() {
            return Ok(RowSet::default());
        }
        Ok(sets.remove(0))
    }

    async fn execute_snapshot(
        &self,
        statements: &[SqlStatement],
        _deadline: Deadline,
    ) -> Result<Vec<RowSet>> {
        let sets = self.respond(statements).await?;
        if sets.len() != statements.len() {
            return Err(ProgramError::internal(format!(
                "scripted {} result sets for {} statements",
                sets.len(),
                statements.len()
            )));
        }
        Ok(sets)
    }
}

/// A fully populated program row, as the list and get queries return it.
pub fn program_row(name: &str, status: ProgramStatus) -> Row {
    let stamp = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).single().unwrap_or_default();
    Row::new()
        .with("id", Uuid::new_v4())
        .with("name", name)
        .with("category_id", Uuid::nil())
        .with("category_name", "Property Cat")
        .with("intermediary_id", SqlValue::Null)
        .with("loss_ratio", Decimal::new(6250, 2))
        .with("gross_premium", Decimal::from(1_200_000))
        .with("ceded_premium", Decimal::from(300_000))
        .with("underwriter", "A. Lindqvist")
        .with("status", status.as_str())
        .with("reinsurer_count", 2i64)
        .with("created_at", stamp)
        .with("updated_at", stamp)
}

/// Single-row result of a `COUNT(*) AS total` statement.
pub fn count_rows(total: i64) -> RowSet {
    RowSet::from_rows(vec![Row::new().with("total", total)])
}
