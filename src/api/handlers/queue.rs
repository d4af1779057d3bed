use axum::{Json, extract::State};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::QUEUE_TAG;
use crate::jobs::QueueOverview;
use crate::state::AppState;

pub fn queue_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_queue))
}

/// GET /api/queue - Pending jobs and the active job
#[utoipa::path(
    get,
    path = "/queue",
    tag = QUEUE_TAG,
    responses(
        (status = 200, description = "Queue overview", body = QueueOverview)
    )
)]
async fn get_queue(State(state): State<AppState>) -> Json<QueueOverview> {
    Json(state.queue.overview().await)
}
