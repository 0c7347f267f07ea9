//! GET /api/programs/stats - aggregate statistics, optionally filtered.

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::{Extension, Json};

use program_core::{FilterParams, FilterSpecification, ProgramService, StatisticsSummary};

use crate::api::envelope::Envelope;
use crate::api::error::AppError;

pub async fn program_stats(
    Extension(service): Extension<ProgramService>,
    query: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Envelope<StatisticsSummary>>, AppError> {
    let Query(params) = query?;
    let spec = FilterSpecification::try_from(params)?;

    // No filter fields at all means the whole table.
    let filter = (spec != FilterSpecification::default()).then_some(&spec);
    let summary = service.summarize(filter).await?;
    Ok(Json(Envelope::ok(summary)))
}
