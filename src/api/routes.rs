//! Router configuration for the API.

use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{logging_middleware, request_id_middleware};
use crate::state::AppState;

/// Creates the application router with all routes and middleware.
///
/// # Middleware Order
/// Last added runs first: CORS, compression, request ID, then logging, so
/// every log line carries the request ID.
///
/// # Routes
/// - `/api/jobs` - job status and cancellation
/// - `/api/queue` - queue overview
/// - `/api/dispatcher` - dispatcher statistics and control
/// - `/health` - health checks
/// - `/swagger-ui` - API documentation, served from `/api-docs/openapi.json`
pub fn create_router(state: AppState) -> Router {
    let api_routes = OpenApiRouter::new()
        .nest("/jobs", handlers::jobs::job_routes())
        .nest("/dispatcher", handlers::dispatcher::dispatcher_routes())
        .merge(handlers::queue::queue_routes());

    let (router, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", api_routes)
        .merge(handlers::health::health_routes())
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
