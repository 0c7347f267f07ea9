//! Four-level roll-up: reinsurer → intermediary → program → transaction.
//!
//! `build_hierarchy` groups each level under its parent by back-reference id
//! and computes metrics bottom-up. The resulting tree is immutable; any change
//! to the inputs means building a new one.

mod metrics;
mod source;

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::types::ProgramStatus;

pub use metrics::Metrics;
pub use source::{hierarchy_statements, HierarchySource};

// ── Input entities ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reinsurer {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intermediary {
    pub id: Uuid,
    pub reinsurer_id: Uuid,
    pub name: String,
}

/// A program as it appears in the hierarchy, placed by its intermediary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyProgram {
    pub id: Uuid,
    pub intermediary_id: Uuid,
    pub name: String,
    pub status: ProgramStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub program_id: Uuid,
    pub premium: Decimal,
    pub claims: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Flat entity lists, one per level, each in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyInput {
    pub reinsurers: Vec<Reinsurer>,
    pub intermediaries: Vec<Intermediary>,
    pub programs: Vec<HierarchyProgram>,
    pub transactions: Vec<Transaction>,
}

// ── Tree ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionNode {
    transaction: Transaction,
    metrics: Metrics,
}

impl TransactionNode {
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramNode {
    program: HierarchyProgram,
    metrics: Metrics,
    transactions: Vec<TransactionNode>,
}

impl ProgramNode {
    pub fn program(&self) -> &HierarchyProgram {
        &self.program
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn transactions(&self) -> &[TransactionNode] {
        &self.transactions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntermediaryNode {
    intermediary: Intermediary,
    metrics: Metrics,
    programs: Vec<ProgramNode>,
}

impl IntermediaryNode {
    pub fn intermediary(&self) -> &Intermediary {
        &self.intermediary
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn programs(&self) -> &[ProgramNode] {
        &self.programs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReinsurerNode {
    reinsurer: Reinsurer,
    metrics: Metrics,
    intermediaries: Vec<IntermediaryNode>,
}

impl ReinsurerNode {
    pub fn reinsurer(&self) -> &Reinsurer {
        &self.reinsurer
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn intermediaries(&self) -> &[IntermediaryNode] {
        &self.intermediaries
    }
}

/// Ids of entities left out of the tree because their parent id did not
/// resolve. Descendants of a detached entity are detached too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetachedReport {
    pub intermediaries: Vec<Uuid>,
    pub programs: Vec<Uuid>,
    pub transactions: Vec<Uuid>,
}

impl DetachedReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.intermediaries.len() + self.programs.len() + self.transactions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyTree {
    metrics: Metrics,
    reinsurers: Vec<ReinsurerNode>,
    detached: DetachedReport,
}

impl HierarchyTree {
    /// Metrics aggregated over all reinsurers.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn reinsurers(&self) -> &[ReinsurerNode] {
        &self.reinsurers
    }

    pub fn detached(&self) -> &DetachedReport {
        &self.detached
    }
}

// ── Build ─────────────────────────────────────────────────────

/// Children grouped by parent id; each group keeps input order.
fn group_by_parent<T, K, F>(items: Vec<T>, parent: F) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        groups.entry(parent(&item)).or_default().push(item);
    }
    groups
}

/// Ids left in `groups` after every resolvable parent has taken its children.
fn leftover_ids<T>(groups: HashMap<Uuid, Vec<T>>, id: impl Fn(&T) -> Uuid) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = groups.into_values().flatten().map(|item| id(&item)).collect();
    ids.sort();
    ids
}

pub fn build_hierarchy(input: HierarchyInput) -> HierarchyTree {
    let HierarchyInput {
        reinsurers,
        intermediaries,
        programs,
        transactions,
    } = input;

    let mut intermediaries_by_reinsurer = group_by_parent(intermediaries, |i| i.reinsurer_id);
    let mut programs_by_intermediary = group_by_parent(programs, |p| p.intermediary_id);
    let mut transactions_by_program = group_by_parent(transactions, |t| t.program_id);

    let reinsurers: Vec<ReinsurerNode> = reinsurers
        .into_iter()
        .map(|reinsurer| {
            let intermediaries: Vec<IntermediaryNode> = intermediaries_by_reinsurer
                .remove(&reinsurer.id)
                .unwrap_or_default()
                .into_iter()
                .map(|intermediary| {
                    let programs: Vec<ProgramNode> = programs_by_intermediary
                        .remove(&intermediary.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|program| {
                            let transactions: Vec<TransactionNode> = transactions_by_program
                                .remove(&program.id)
                                .unwrap_or_default()
                                .into_iter()
                                .map(|transaction| TransactionNode {
                                    metrics: Metrics::leaf(
                                        transaction.premium,
                                        transaction.claims,
                                    ),
                                    transaction,
                                })
                                .collect();
                            let metrics =
                                Metrics::aggregate(transactions.iter().map(|t| &t.metrics));
                            ProgramNode {
                                metrics,
                                program,
                                transactions,
                            }
                        })
                        .collect();
                    IntermediaryNode {
                        metrics: Metrics::aggregate(programs.iter().map(|p| &p.metrics)),
                        intermediary,
                        programs,
                    }
                })
                .collect();
            ReinsurerNode {
                metrics: Metrics::aggregate(intermediaries.iter().map(|i| &i.metrics)),
                reinsurer,
                intermediaries,
            }
        })
        .collect();

    let detached = DetachedReport {
        intermediaries: leftover_ids(intermediaries_by_reinsurer, |i| i.id),
        programs: leftover_ids(programs_by_intermediary, |p| p.id),
        transactions: leftover_ids(transactions_by_program, |t| t.id),
    };
    if !detached.is_empty() {
        warn!(
            intermediaries = detached.intermediaries.len(),
            programs = detached.programs.len(),
            transactions = detached.transactions.len(),
            "hierarchy entities with unresolved parents left out of the tree"
        );
    }

    HierarchyTree {
        metrics: Metrics::aggregate(reinsurers.iter().map(|r| &r.metrics)),
        reinsurers,
        detached,
    }
}
