//! Router construction for the program desk server.

use axum::routing::{delete, get};
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use program_core::ProgramService;

use crate::api::handlers;

/// Build the full axum router with all routes and middleware.
pub fn build_router(service: ProgramService) -> Router {
    let programs = Router::new()
        .route(
            "/programs",
            get(handlers::programs::list_programs).post(handlers::programs::create_program),
        )
        .route("/programs/stats", get(handlers::stats::program_stats))
        .route(
            "/programs/:id",
            get(handlers::programs::get_program)
                .put(handlers::programs::update_program)
                .delete(handlers::programs::cancel_program),
        )
        .route(
            "/programs/:id/purge",
            delete(handlers::programs::purge_program),
        )
        .route("/hierarchy", get(handlers::hierarchy::get_hierarchy));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", programs)
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
