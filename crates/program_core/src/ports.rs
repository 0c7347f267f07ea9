//! Record Store port. Implemented by `program_postgres`; the engine depends
//! only on this trait, so every component is testable against a fake store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{ProgramError, Result};
use crate::sql::{RowSet, SqlStatement};

/// Absolute instant by which a store call must complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: instant }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Parameterized query execution against the program tables.
///
/// Implementations acquire one connection per call and release it on every
/// exit path, including when the returned future is dropped.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Execute one statement (read or write) on a single connection.
    async fn execute(&self, statement: &SqlStatement, deadline: Deadline) -> Result<RowSet>;

    /// Execute read statements in order on one connection under one snapshot,
    /// so their results are mutually consistent.
    async fn execute_snapshot(
        &self,
        statements: &[SqlStatement],
        deadline: Deadline,
    ) -> Result<Vec<RowSet>>;
}

/// Run `fut`, failing with `Timeout` once `deadline` passes. The future is
/// dropped on expiry, which releases whatever connection it held.
pub async fn with_deadline<T, F>(deadline: Deadline, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline.instant(), fut).await {
        Ok(result) => result,
        Err(_) => Err(ProgramError::Timeout(format!(
            "{operation} exceeded its deadline"
        ))),
    }
}
