//! GET /api/hierarchy - reinsurer → intermediary → program → transaction roll-up.

use axum::{Extension, Json};

use program_core::{HierarchyTree, ProgramService};

use crate::api::envelope::Envelope;
use crate::api::error::AppError;

pub async fn get_hierarchy(
    Extension(service): Extension<ProgramService>,
) -> Result<Json<Envelope<HierarchyTree>>, AppError> {
    let tree = service.hierarchy().await?;
    let envelope = if tree.detached().is_empty() {
        Envelope::ok(tree)
    } else {
        let message = format!("{} records without a live parent", tree.detached().total());
        Envelope::ok(tree).with_message(message)
    };
    Ok(Json(envelope))
}
