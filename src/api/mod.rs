//! HTTP layer: route handlers, DTOs, OpenAPI document and router
//! composition.

pub mod dto;
pub mod handlers;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the HTTP endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "chat-hub", description = "Real-time WebSocket broadcast hub"),
    paths(
        handlers::room::join_handler,
        handlers::room::stats_handler,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::StatsResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Room", description = "Joining the room and room statistics"),
        (name = "System", description = "Health and metadata"),
    )
)]
pub struct ApiDoc;

/// Builds the router with every endpoint, still awaiting its state.
pub fn build_router() -> Router<AppState> {
    let router = handlers::routes();

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/swagger.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the complete application: routes, HTTP tracing, CORS and state.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
