//! Program records and the request/result shapes built around them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProgramError, Result};
use crate::filter::PageWindow;
use crate::sql::Row;

// ── Status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Active,
    Inactive,
    Pending,
    Cancelled,
}

impl ProgramStatus {
    pub const ALL: [ProgramStatus; 4] = [
        Self::Active,
        Self::Inactive,
        Self::Pending,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }

    /// Case-insensitive parse of the stored/textual form.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Program ───────────────────────────────────────────────────

/// A reinsurance program as returned by every read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub intermediary_id: Option<Uuid>,
    pub loss_ratio: Decimal,
    pub gross_premium: Decimal,
    pub ceded_premium: Decimal,
    pub underwriter: Option<String>,
    pub status: ProgramStatus,
    /// Participating reinsurers, counted over `program_reinsurers`.
    pub reinsurer_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Program {
    pub fn from_row(row: &Row) -> Result<Self> {
        let status_text = row.text("status")?;
        let status = ProgramStatus::parse(&status_text).ok_or_else(|| {
            ProgramError::internal(format!("unknown program status '{status_text}'"))
        })?;

        Ok(Self {
            id: row.uuid("id")?,
            name: row.text("name")?,
            category_id: row.uuid("category_id")?,
            category_name: row.opt_text("category_name")?,
            intermediary_id: row.opt_uuid("intermediary_id")?,
            loss_ratio: row.decimal("loss_ratio")?,
            gross_premium: row.decimal("gross_premium")?,
            ceded_premium: row.decimal("ceded_premium")?,
            underwriter: row.opt_text("underwriter")?,
            status,
            reinsurer_count: row.int("reinsurer_count")?,
            created_at: row.timestamp("created_at")?,
            updated_at: row.timestamp("updated_at")?,
        })
    }
}

/// Fields for inserting a program. Absent optionals take the table defaults
/// (`status = active`, numeric fields 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProgram {
    pub name: String,
    pub category_id: Uuid,
    #[serde(default)]
    pub intermediary_id: Option<Uuid>,
    #[serde(default)]
    pub loss_ratio: Option<Decimal>,
    #[serde(default)]
    pub gross_premium: Option<Decimal>,
    #[serde(default)]
    pub ceded_premium: Option<Decimal>,
    #[serde(default)]
    pub underwriter: Option<String>,
    #[serde(default)]
    pub status: Option<ProgramStatus>,
}

impl NewProgram {
    pub fn new(name: impl Into<String>, category_id: Uuid) -> Self {
        Self {
            name: name.into(),
            category_id,
            intermediary_id: None,
            loss_ratio: None,
            gross_premium: None,
            ceded_premium: None,
            underwriter: None,
            status: None,
        }
    }
}

/// Partial update. Only `Some` fields change; an all-`None` update is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramUpdate {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub intermediary_id: Option<Uuid>,
    pub loss_ratio: Option<Decimal>,
    pub gross_premium: Option<Decimal>,
    pub ceded_premium: Option<Decimal>,
    pub underwriter: Option<String>,
    pub status: Option<ProgramStatus>,
}

impl ProgramUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category_id.is_none()
            && self.intermediary_id.is_none()
            && self.loss_ratio.is_none()
            && self.gross_premium.is_none()
            && self.ceded_premium.is_none()
            && self.underwriter.is_none()
            && self.status.is_none()
    }
}

// ── Paginated result ──────────────────────────────────────────

/// One page of rows plus the metadata needed to render pagination controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult<T> {
    pub rows: Vec<T>,
    /// 1-based page containing `offset`.
    pub page: i64,
    pub limit: i64,
    /// Count of all rows matching the filter, ignoring pagination.
    pub total: i64,
    pub total_pages: i64,
}

impl<T> PaginatedResult<T> {
    pub fn assemble(rows: Vec<T>, window: PageWindow, total: i64) -> Result<Self> {
        if rows.len() as i64 > window.limit {
            return Err(ProgramError::internal(format!(
                "store returned {} rows for limit {}",
                rows.len(),
                window.limit
            )));
        }
        let total = total.max(0);
        Ok(Self {
            rows,
            page: window.offset / window.limit + 1,
            limit: window.limit,
            total,
            total_pages: (total + window.limit - 1) / window.limit,
        })
    }
}
