//! Postgres implementation of the `RecordStore` port.
//!
//! Every call runs inside one transaction on one pooled connection, with
//! `statement_timeout` set from the caller's deadline. Snapshot batches use
//! `REPEATABLE READ, READ ONLY`, so every statement in the batch sees the same
//! data. All SQL is runtime-checked (sqlx::query, not sqlx::query!).

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgConnection, PgPool, Postgres, Row as _, TypeInfo};
use tracing::{debug, warn};
use uuid::Uuid;

use program_core::error::{ErrorKind, ProgramError, Result};
use program_core::ports::{Deadline, RecordStore};
use program_core::sql::{Row, RowSet, SqlStatement, SqlValue, StatementKind};

/// Postgres-backed record store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(
        &self,
        statements: &[SqlStatement],
        deadline: Deadline,
        snapshot: bool,
    ) -> Result<Vec<RowSet>> {
        if deadline.is_expired() {
            return Err(ProgramError::Timeout(
                "deadline passed before the store call started".into(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(|e| translate(e, "begin"))?;

        if snapshot {
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(|e| translate(e, "set isolation"))?;
        }

        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(statement_timeout_ms(deadline))
            .execute(&mut *tx)
            .await
            .map_err(|e| translate(e, "set statement_timeout"))?;

        let mut sets = Vec::with_capacity(statements.len());
        for statement in statements {
            sets.push(run_statement(&mut *tx, statement).await?);
        }

        tx.commit().await.map_err(|e| translate(e, "commit"))?;
        Ok(sets)
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn execute(&self, statement: &SqlStatement, deadline: Deadline) -> Result<RowSet> {
        let mut sets = self
            .run(std::slice::from_ref(statement), deadline, false)
            .await?;
        sets.pop()
            .ok_or_else(|| ProgramError::Internal(anyhow!("statement produced no result")))
    }

    async fn execute_snapshot(
        &self,
        statements: &[SqlStatement],
        deadline: Deadline,
    ) -> Result<Vec<RowSet>> {
        self.run(statements, deadline, true).await
    }
}

/// Remaining time as a Postgres `statement_timeout` value. Never 0, which
/// Postgres reads as "no timeout".
fn statement_timeout_ms(deadline: Deadline) -> String {
    deadline.remaining().as_millis().max(1).to_string()
}

async fn run_statement(conn: &mut PgConnection, statement: &SqlStatement) -> Result<RowSet> {
    debug!(
        params = statement.params().len(),
        kind = ?statement.kind(),
        "executing statement"
    );
    let query = bind_params(sqlx::query(statement.text()), statement.params());
    match statement.kind() {
        StatementKind::Rows => {
            let rows = query
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| translate(e, "query"))?;
            let decoded = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
            Ok(RowSet::from_rows(decoded))
        }
        StatementKind::Command => {
            let done = query
                .execute(&mut *conn)
                .await
                .map_err(|e| translate(e, "command"))?;
            Ok(RowSet::affected(done.rows_affected()))
        }
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Decimal(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::TextArray(v) => query.bind(v.clone()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let type_name = column.type_info().name();
        let value = match type_name {
            "BOOL" => get::<bool>(row, idx)?.map(SqlValue::Bool),
            "INT2" => get::<i16>(row, idx)?.map(|v| SqlValue::Int(i64::from(v))),
            "INT4" => get::<i32>(row, idx)?.map(|v| SqlValue::Int(i64::from(v))),
            "INT8" => get::<i64>(row, idx)?.map(SqlValue::Int),
            "NUMERIC" => get::<Decimal>(row, idx)?.map(SqlValue::Decimal),
            "FLOAT4" | "FLOAT8" => match get::<f64>(row, idx)? {
                Some(v) => Some(SqlValue::Decimal(Decimal::try_from(v).map_err(|e| {
                    ProgramError::Internal(anyhow!("column '{}': {e}", column.name()))
                })?)),
                None => None,
            },
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => get::<String>(row, idx)?.map(SqlValue::Text),
            "TEXT[]" | "VARCHAR[]" => get::<Vec<String>>(row, idx)?.map(SqlValue::TextArray),
            "UUID" => get::<Uuid>(row, idx)?.map(SqlValue::Uuid),
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx)?.map(SqlValue::Timestamp),
            "TIMESTAMP" => {
                get::<NaiveDateTime>(row, idx)?.map(|v| SqlValue::Timestamp(v.and_utc()))
            }
            other => {
                return Err(ProgramError::Internal(anyhow!(
                    "column '{}' has unsupported type {other}; cast it in the query",
                    column.name()
                )))
            }
        };
        out.insert(column.name(), value.unwrap_or(SqlValue::Null));
    }
    Ok(out)
}

fn get<T>(row: &PgRow, idx: usize) -> Result<Option<T>>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| ProgramError::Internal(anyhow!(e)))
}

// ── Error translation ─────────────────────────────────────────

/// Error kind for a Postgres SQLSTATE.
pub fn classify_sqlstate(code: &str) -> ErrorKind {
    match code {
        "23505" => ErrorKind::UniquenessConflict,
        "23503" => ErrorKind::ForeignKeyViolation,
        // check_violation, not_null_violation, invalid_text_representation,
        // numeric_value_out_of_range
        "23514" | "23502" | "22P02" | "22003" => ErrorKind::InvalidPayload,
        "57014" => ErrorKind::Timeout,
        c if ["08", "53", "57P", "40"].iter().any(|class| c.starts_with(class)) => {
            ErrorKind::StoreUnavailable
        }
        _ => ErrorKind::Internal,
    }
}

/// Map a driver error onto the engine taxonomy. Driver detail is logged here
/// and never copied into caller-facing messages.
pub fn translate(err: sqlx::Error, operation: &str) -> ProgramError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            let kind = classify_sqlstate(&code);
            warn!(%code, operation, error = %db, "database error");
            let detail = match db.constraint() {
                Some(constraint) => format!("{operation} rejected by constraint {constraint}"),
                None => format!("{operation} rejected by the database"),
            };
            match kind {
                ErrorKind::UniquenessConflict => ProgramError::UniquenessConflict(detail),
                ErrorKind::ForeignKeyViolation => ProgramError::ForeignKeyViolation(detail),
                ErrorKind::InvalidPayload => ProgramError::InvalidPayload(detail),
                ErrorKind::Timeout => {
                    ProgramError::Timeout(format!("{operation} cancelled by statement_timeout"))
                }
                ErrorKind::StoreUnavailable => {
                    ProgramError::StoreUnavailable(format!("{operation} failed (SQLSTATE {code})"))
                }
                _ => ProgramError::Internal(anyhow!(err).context(operation.to_string())),
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            warn!(operation, error = %err, "store unavailable");
            ProgramError::StoreUnavailable(format!("{operation}: database unavailable"))
        }
        _ => {
            warn!(operation, error = %err, "unexpected driver error");
            ProgramError::Internal(anyhow!(err).context(operation.to_string()))
        }
    }
}
