//! GET /health - liveness only; does not touch the store.

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "program-desk" }))
}
