//! Filter specifications: the typed form the compiler consumes, the untyped
//! form a transport hands in, and the resolved page window.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProgramError, Result};
use crate::types::ProgramStatus;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Independent optional bounds on one numeric column. `min > max` is allowed
/// and simply matches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    #[serde(default)]
    pub min: Option<Decimal>,
    #[serde(default)]
    pub max: Option<Decimal>,
}

impl RangeFilter {
    pub fn between(min: Decimal, max: Decimal) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: Decimal) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: Decimal) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

/// Sparse set of optional constraints on a program listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpecification {
    /// Case-insensitive substring of the program name.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub statuses: Option<Vec<ProgramStatus>>,
    pub loss_ratio: RangeFilter,
    pub gross_premium: RangeFilter,
    /// Case-insensitive substring of the underwriter.
    pub underwriter: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// 1-based page; alternative to `offset`, never combined with it.
    pub page: Option<i64>,
}

impl FilterSpecification {
    pub fn page_window(&self) -> Result<PageWindow> {
        PageWindow::resolve(self.limit, self.offset, self.page)
    }
}

/// Resolved `LIMIT` / `OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

impl PageWindow {
    /// Clamp `limit` to `[1, MAX_LIMIT]` and derive the offset. `offset` is the
    /// canonical position; `page` is accepted instead of it, not alongside it.
    pub fn resolve(
        limit: Option<i64>,
        offset: Option<i64>,
        page: Option<i64>,
    ) -> Result<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let offset = match (offset, page) {
            (Some(_), Some(_)) => {
                return Err(ProgramError::InvalidFilterValue(
                    "specify either offset or page, not both".into(),
                ))
            }
            (Some(offset), None) if offset < 0 => {
                return Err(ProgramError::InvalidFilterValue(format!(
                    "offset must be >= 0, got {offset}"
                )))
            }
            (Some(offset), None) => offset,
            (None, Some(page)) if page < 1 => {
                return Err(ProgramError::InvalidFilterValue(format!(
                    "page must be >= 1, got {page}"
                )))
            }
            (None, Some(page)) => (page - 1).checked_mul(limit).ok_or_else(|| {
                ProgramError::InvalidFilterValue(format!("page {page} is out of range"))
            })?,
            (None, None) => 0,
        };

        Ok(Self { limit, offset })
    }
}

/// Filter input exactly as a query string delivers it: every field optional
/// text. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub search: Option<String>,
    pub category_id: Option<String>,
    /// Comma-separated status list.
    pub status: Option<String>,
    pub min_loss_ratio: Option<String>,
    pub max_loss_ratio: Option<String>,
    pub min_premium: Option<String>,
    pub max_premium: Option<String>,
    pub underwriter: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub page: Option<String>,
}

impl TryFrom<FilterParams> for FilterSpecification {
    type Error = ProgramError;

    fn try_from(params: FilterParams) -> Result<Self> {
        Ok(Self {
            search: present(params.search),
            category_id: parse_field("category_id", params.category_id, "a UUID")?,
            statuses: parse_statuses(params.status)?,
            loss_ratio: RangeFilter {
                min: parse_field("min_loss_ratio", params.min_loss_ratio, "a number")?,
                max: parse_field("max_loss_ratio", params.max_loss_ratio, "a number")?,
            },
            gross_premium: RangeFilter {
                min: parse_field("min_premium", params.min_premium, "a number")?,
                max: parse_field("max_premium", params.max_premium, "a number")?,
            },
            underwriter: present(params.underwriter),
            limit: parse_field("limit", params.limit, "an integer")?,
            offset: parse_field("offset", params.offset, "an integer")?,
            page: parse_field("page", params.page, "an integer")?,
        })
    }
}

fn present(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

fn parse_field<T: FromStr>(
    field: &str,
    raw: Option<String>,
    expected: &str,
) -> Result<Option<T>> {
    match present(raw) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ProgramError::InvalidFilterValue(format!("{field}: expected {expected}, got '{raw}'"))
        }),
    }
}

fn parse_statuses(raw: Option<String>) -> Result<Option<Vec<ProgramStatus>>> {
    let Some(raw) = present(raw) else {
        return Ok(None);
    };

    let mut statuses = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let status = ProgramStatus::parse(part).ok_or_else(|| {
            ProgramError::InvalidFilterValue(format!("status: unknown status '{part}'"))
        })?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }

    Ok((!statuses.is_empty()).then_some(statuses))
}
