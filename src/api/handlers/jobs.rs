//! Job status and cancellation handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::JOB_TAG;
use crate::api::dto::{CancellationRequest, CancellationResponse};
use crate::error::AppResult;
use crate::state::AppState;
use crate::store::JobStatusSnapshot;

pub fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(get_job_status))
        .routes(routes!(set_cancellation))
}

/// GET /api/jobs/{tenant_id}/{job_type}/status - Current job status
#[utoipa::path(
    get,
    path = "/{tenant_id}/{job_type}/status",
    tag = JOB_TAG,
    params(
        ("tenant_id" = String, Path, description = "Tenant the job belongs to"),
        ("job_type" = String, Path, description = "Job type, e.g. seo")
    ),
    responses(
        (status = 200, description = "Live or last persisted status", body = JobStatusSnapshot),
        (status = 400, description = "Invalid tenant or job type")
    )
)]
async fn get_job_status(
    State(state): State<AppState>,
    Path((tenant_id, job_type)): Path<(String, String)>,
) -> AppResult<Json<JobStatusSnapshot>> {
    let status = state.queue.get_status(&tenant_id, &job_type).await?;
    Ok(Json(status))
}

/// PUT /api/jobs/{tenant_id}/{job_type}/cancellation - Set or clear the cancel flag
#[utoipa::path(
    put,
    path = "/{tenant_id}/{job_type}/cancellation",
    tag = JOB_TAG,
    params(
        ("tenant_id" = String, Path, description = "Tenant the job belongs to"),
        ("job_type" = String, Path, description = "Job type, e.g. seo")
    ),
    request_body = CancellationRequest,
    responses(
        (status = 200, description = "Flag stored; observed at the next batch boundary", body = CancellationResponse),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Status store unavailable")
    )
)]
async fn set_cancellation(
    State(state): State<AppState>,
    Path((tenant_id, job_type)): Path<(String, String)>,
    payload: Result<Json<CancellationRequest>, JsonRejection>,
) -> AppResult<Json<CancellationResponse>> {
    let Json(request) = payload?;
    let cancelled = state
        .queue
        .set_cancelled(&tenant_id, &job_type, request.cancelled)
        .await?;

    Ok(Json(CancellationResponse {
        tenant_id,
        job_type,
        cancelled,
    }))
}
