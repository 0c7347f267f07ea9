use std::sync::Arc;

use tracing::debug;

use super::{HierarchyInput, HierarchyProgram, Intermediary, Reinsurer, Transaction};
use crate::error::{ProgramError, Result};
use crate::ports::{with_deadline, Deadline, RecordStore};
use crate::sql::{Row, RowSet, SqlStatement, StatementBuilder, StatementKind};
use crate::types::ProgramStatus;

/// The four level queries, top to bottom. Cancelled programs and programs
/// without an intermediary are not part of the hierarchy, and neither are
/// their transactions.
pub fn hierarchy_statements() -> [SqlStatement; 4] {
    let reinsurers = {
        let mut b = StatementBuilder::new(StatementKind::Rows);
        b.push("SELECT r.id, r.name FROM reinsurers r ORDER BY r.name ASC, r.id ASC");
        b.build()
    };
    let intermediaries = {
        let mut b = StatementBuilder::new(StatementKind::Rows);
        b.push(
            "SELECT i.id, i.reinsurer_id, i.name FROM intermediaries i \
             ORDER BY i.name ASC, i.id ASC",
        );
        b.build()
    };
    let programs = {
        let mut b = StatementBuilder::new(StatementKind::Rows);
        b.push(
            "SELECT p.id, p.intermediary_id, p.name, p.status::text AS status FROM programs p \
             WHERE p.intermediary_id IS NOT NULL AND p.status <> ",
        )
        .push_bind(ProgramStatus::Cancelled.as_str())
        .push("::program_status ORDER BY p.name ASC, p.id ASC");
        b.build()
    };
    let transactions = {
        let mut b = StatementBuilder::new(StatementKind::Rows);
        b.push(
            "SELECT t.id, t.program_id, t.premium, t.claims, t.occurred_at \
             FROM program_transactions t JOIN programs p ON p.id = t.program_id \
             WHERE p.intermediary_id IS NOT NULL AND p.status <> ",
        )
        .push_bind(ProgramStatus::Cancelled.as_str())
        .push("::program_status ORDER BY t.occurred_at ASC, t.id ASC");
        b.build()
    };
    [reinsurers, intermediaries, programs, transactions]
}

fn decode<T>(set: &RowSet, f: impl Fn(&Row) -> Result<T>) -> Result<Vec<T>> {
    set.rows.iter().map(f).collect()
}

fn program_from_row(row: &Row) -> Result<HierarchyProgram> {
    let raw = row.text("status")?;
    Ok(HierarchyProgram {
        id: row.uuid("id")?,
        intermediary_id: row.uuid("intermediary_id")?,
        name: row.text("name")?,
        status: ProgramStatus::parse(&raw)
            .ok_or_else(|| ProgramError::internal(format!("unknown program status '{raw}'")))?,
    })
}

/// Loads the four entity levels under one snapshot.
pub struct HierarchySource {
    store: Arc<dyn RecordStore>,
}

impl HierarchySource {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self, deadline: Deadline) -> Result<HierarchyInput> {
        let statements = hierarchy_statements();
        let sets = with_deadline(
            deadline,
            "load hierarchy",
            self.store.execute_snapshot(&statements, deadline),
        )
        .await?;

        let [reinsurers, intermediaries, programs, transactions]: [RowSet; 4] =
            sets.try_into().map_err(|sets: Vec<RowSet>| {
                ProgramError::internal(format!(
                    "store returned {} result sets for 4 statements",
                    sets.len()
                ))
            })?;

        let input = HierarchyInput {
            reinsurers: decode(&reinsurers, |row| {
                Ok(Reinsurer {
                    id: row.uuid("id")?,
                    name: row.text("name")?,
                })
            })?,
            intermediaries: decode(&intermediaries, |row| {
                Ok(Intermediary {
                    id: row.uuid("id")?,
                    reinsurer_id: row.uuid("reinsurer_id")?,
                    name: row.text("name")?,
                })
            })?,
            programs: decode(&programs, program_from_row)?,
            transactions: decode(&transactions, |row| {
                Ok(Transaction {
                    id: row.uuid("id")?,
                    program_id: row.uuid("program_id")?,
                    premium: row.decimal("premium")?,
                    claims: row.decimal("claims")?,
                    occurred_at: row.timestamp("occurred_at")?,
                })
            })?,
        };

        debug!(
            reinsurers = input.reinsurers.len(),
            intermediaries = input.intermediaries.len(),
            programs = input.programs.len(),
            transactions = input.transactions.len(),
            "loaded hierarchy input"
        );
        Ok(input)
    }
}
