pub mod config;
pub mod consumers;
pub mod database;
pub mod dlq;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod filter;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod processors;
pub mod publisher;
pub mod replay;
pub mod retry;
pub mod routes;
pub mod state;

use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Event Processing System API",
        version = "1.0.0",
        description = "At-least-once event processing with automatic retries, a dead letter lifecycle and replay orchestration"
    ),
    tags(
        (name = "Events", description = "Publishing and inspecting stored events"),
        (name = "Dead Letter Queue", description = "Quarantined event lifecycle"),
        (name = "Replay", description = "Replay session orchestration"),
    ),
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes())
        .split_for_parts();

    router
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
}
