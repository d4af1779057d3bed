//! Dispatcher inspection and control.

use axum::{Json, extract::State};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::DISPATCHER_TAG;
use crate::api::dto::ClearResponse;
use crate::dispatcher::DispatcherStats;
use crate::state::AppState;

pub fn dispatcher_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(get_stats))
        .routes(routes!(clear_queues))
}

/// GET /api/dispatcher/stats - Call totals and per-lane load
#[utoipa::path(
    get,
    path = "/stats",
    tag = DISPATCHER_TAG,
    responses(
        (status = 200, description = "Dispatcher statistics", body = DispatcherStats)
    )
)]
async fn get_stats(State(state): State<AppState>) -> Json<DispatcherStats> {
    Json(state.dispatcher.stats())
}

/// POST /api/dispatcher/clear - Discard tasks waiting in every lane
#[utoipa::path(
    post,
    path = "/clear",
    tag = DISPATCHER_TAG,
    responses(
        (status = 200, description = "Waiting tasks discarded", body = ClearResponse)
    )
)]
async fn clear_queues(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse {
        discarded: state.dispatcher.clear(),
    })
}
