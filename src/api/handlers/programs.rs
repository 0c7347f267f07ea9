//! Program listing and lifecycle handlers.
//!
//! GET    /api/programs            paginated, filtered listing
//! POST   /api/programs            create
//! GET    /api/programs/:id        fetch one
//! PUT    /api/programs/:id        partial update
//! DELETE /api/programs/:id        soft delete (status → cancelled)
//! DELETE /api/programs/:id/purge  hard delete

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use program_core::{
    FilterParams, FilterSpecification, NewProgram, Program, ProgramService, ProgramUpdate,
};

use crate::api::envelope::Envelope;
use crate::api::error::AppError;

type ProgramId = Result<Path<Uuid>, PathRejection>;

pub async fn list_programs(
    Extension(service): Extension<ProgramService>,
    query: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Program>>>, AppError> {
    let Query(params) = query?;
    let spec = FilterSpecification::try_from(params)?;
    let page = service.list(&spec).await?;
    Ok(Json(Envelope::paginated(page)))
}

pub async fn get_program(
    Extension(service): Extension<ProgramService>,
    id: ProgramId,
) -> Result<Json<Envelope<Program>>, AppError> {
    let Path(id) = id?;
    let program = service.get(id).await?;
    Ok(Json(Envelope::ok(program)))
}

pub async fn create_program(
    Extension(service): Extension<ProgramService>,
    body: Result<Json<NewProgram>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Program>>), AppError> {
    let Json(new) = body?;
    let program = service.create(&new).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(program).with_message("Program created")),
    ))
}

pub async fn update_program(
    Extension(service): Extension<ProgramService>,
    id: ProgramId,
    body: Result<Json<ProgramUpdate>, JsonRejection>,
) -> Result<Json<Envelope<Program>>, AppError> {
    let Path(id) = id?;
    let Json(update) = body?;
    let program = service.update(id, &update).await?;
    Ok(Json(Envelope::ok(program).with_message("Program updated")))
}

pub async fn cancel_program(
    Extension(service): Extension<ProgramService>,
    id: ProgramId,
) -> Result<Json<Envelope<Program>>, AppError> {
    let Path(id) = id?;
    let program = service.soft_delete(id).await?;
    Ok(Json(Envelope::ok(program).with_message("Program cancelled")))
}

pub async fn purge_program(
    Extension(service): Extension<ProgramService>,
    id: ProgramId,
) -> Result<Json<Envelope<Value>>, AppError> {
    let Path(id) = id?;
    service.hard_delete(id).await?;
    Ok(Json(
        Envelope::ok(json!({ "id": id })).with_message("Program permanently deleted"),
    ))
}
