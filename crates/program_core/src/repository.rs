//! Record repository: lifecycle operations on single programs.
//!
//! Writes run as a data-modifying CTE followed by the joined select, so the
//! caller gets the stored row (category name, reinsurer count) back from the
//! same statement.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{ProgramError, Result};
use crate::ports::{with_deadline, Deadline, RecordStore};
use crate::schema::{PROGRAM_GROUP_BY, PROGRAM_SELECT, RETURNED_PROGRAM_SELECT};
use crate::sql::{RowSet, SqlStatement, SqlValue, StatementBuilder, StatementKind};
use crate::types::{NewProgram, Program, ProgramStatus, ProgramUpdate};

pub fn get_statement(id: Uuid) -> SqlStatement {
    let mut b = StatementBuilder::new(StatementKind::Rows);
    b.push(PROGRAM_SELECT)
        .push(" WHERE p.id = ")
        .push_bind(id)
        .push(PROGRAM_GROUP_BY);
    b.build()
}

pub fn create_statement(new: &NewProgram) -> Result<SqlStatement> {
    ensure_name(&new.name)?;

    let mut columns: Vec<(&str, SqlValue)> = vec![
        ("name", new.name.clone().into()),
        ("category_id", new.category_id.into()),
    ];
    if let Some(v) = new.intermediary_id {
        columns.push(("intermediary_id", v.into()));
    }
    if let Some(v) = new.loss_ratio {
        columns.push(("loss_ratio", v.into()));
    }
    if let Some(v) = new.gross_premium {
        columns.push(("gross_premium", v.into()));
    }
    if let Some(v) = new.ceded_premium {
        columns.push(("ceded_premium", v.into()));
    }
    if let Some(v) = &new.underwriter {
        columns.push(("underwriter", v.clone().into()));
    }
    if let Some(v) = new.status {
        columns.push(("status", v.as_str().into()));
    }

    let names = columns
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");

    let mut b = StatementBuilder::new(StatementKind::Rows);
    b.push("WITH p AS (INSERT INTO programs (")
        .push(&names)
        .push(") VALUES (");
    for (i, (name, value)) in columns.into_iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        push_value(&mut b, name, value);
    }
    b.push(") RETURNING *) ").push(RETURNED_PROGRAM_SELECT);
    Ok(b.build())
}

pub fn update_statement(id: Uuid, update: &ProgramUpdate) -> Result<SqlStatement> {
    if update.is_empty() {
        return Err(ProgramError::NoUpdatableFields);
    }
    if let Some(name) = &update.name {
        ensure_name(name)?;
    }

    let mut sets: Vec<(&str, SqlValue)> = Vec::new();
    if let Some(v) = &update.name {
        sets.push(("name", v.clone().into()));
    }
    if let Some(v) = update.category_id {
        sets.push(("category_id", v.into()));
    }
    if let Some(v) = update.intermediary_id {
        sets.push(("intermediary_id", v.into()));
    }
    if let Some(v) = update.loss_ratio {
        sets.push(("loss_ratio", v.into()));
    }
    if let Some(v) = update.gross_premium {
        sets.push(("gross_premium", v.into()));
    }
    if let Some(v) = update.ceded_premium {
        sets.push(("ceded_premium", v.into()));
    }
    if let Some(v) = &update.underwriter {
        sets.push(("underwriter", v.clone().into()));
    }
    if let Some(v) = update.status {
        sets.push(("status", v.as_str().into()));
    }

    let mut b = StatementBuilder::new(StatementKind::Rows);
    b.push("WITH p AS (UPDATE programs SET ");
    for (name, value) in sets {
        b.push(name).push(" = ");
        push_value(&mut b, name, value);
        b.push(", ");
    }
    b.push("updated_at = NOW() WHERE id = ")
        .push_bind(id)
        .push(" RETURNING *) ")
        .push(RETURNED_PROGRAM_SELECT);
    Ok(b.build())
}

pub fn soft_delete_statement(id: Uuid) -> SqlStatement {
    let mut b = StatementBuilder::new(StatementKind::Rows);
    b.push("WITH p AS (UPDATE programs SET status = ")
        .push_bind(ProgramStatus::Cancelled.as_str())
        .push("::program_status, updated_at = NOW() WHERE id = ")
        .push_bind(id)
        .push(" RETURNING *) ")
        .push(RETURNED_PROGRAM_SELECT);
    b.build()
}

pub fn hard_delete_statement(id: Uuid) -> SqlStatement {
    let mut b = StatementBuilder::new(StatementKind::Command);
    b.push("DELETE FROM programs WHERE id = ").push_bind(id);
    b.build()
}

fn push_value(b: &mut StatementBuilder, column: &str, value: SqlValue) {
    b.push_bind(value);
    if column == "status" {
        b.push("::program_status");
    }
}

fn ensure_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ProgramError::InvalidPayload("name must not be blank".into()));
    }
    Ok(())
}

fn single_program(set: &RowSet, id: Uuid) -> Result<Program> {
    match set.first() {
        Some(row) => Program::from_row(row),
        None => Err(ProgramError::NotFound(format!("program {id}"))),
    }
}

pub struct ProgramRepository {
    store: Arc<dyn RecordStore>,
}

impl ProgramRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid, deadline: Deadline) -> Result<Program> {
        let set = self.run(&get_statement(id), deadline, "get program").await?;
        single_program(&set, id)
    }

    pub async fn create(&self, new: &NewProgram, deadline: Deadline) -> Result<Program> {
        let statement = create_statement(new)?;
        let set = self.run(&statement, deadline, "create program").await?;
        let program = set
            .first()
            .ok_or_else(|| ProgramError::internal("insert returned no row"))
            .and_then(Program::from_row)?;
        info!("Created program {} ({})", program.name, program.id);
        Ok(program)
    }

    /// Apply the supplied fields only. Rejects an empty update before touching the store.
    pub async fn update(
        &self,
        id: Uuid,
        update: &ProgramUpdate,
        deadline: Deadline,
    ) -> Result<Program> {
        let statement = update_statement(id, update)?;
        let set = self.run(&statement, deadline, "update program").await?;
        let program = single_program(&set, id)?;
        info!("Updated program {} ({})", program.name, program.id);
        Ok(program)
    }

    /// Mark the program cancelled. The row stays and can still be fetched by id.
    pub async fn soft_delete(&self, id: Uuid, deadline: Deadline) -> Result<Program> {
        let set = self
            .run(&soft_delete_statement(id), deadline, "cancel program")
            .await?;
        let program = single_program(&set, id)?;
        info!("Cancelled program {} ({})", program.name, program.id);
        Ok(program)
    }

    /// Remove the row; join-table and transaction rows cascade.
    pub async fn hard_delete(&self, id: Uuid, deadline: Deadline) -> Result<()> {
        let set = self
            .run(&hard_delete_statement(id), deadline, "purge program")
            .await?;
        if set.rows_affected == 0 {
            return Err(ProgramError::NotFound(format!("program {id}")));
        }
        info!("Purged program {}", id);
        Ok(())
    }

    async fn run(
        &self,
        statement: &SqlStatement,
        deadline: Deadline,
        operation: &str,
    ) -> Result<RowSet> {
        with_deadline(deadline, operation, self.store.execute(statement, deadline)).await
    }
}
