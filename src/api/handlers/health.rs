//! Health check endpoint handlers.
//!
//! Readiness depends on the status store answering a ping and the job queue
//! still accepting work.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{ComponentHealth, HealthResponse, HealthStatus};
use crate::state::AppState;

/// # Routes
/// - `GET /health` - Component report
/// - `GET /health/ready` - Readiness check
/// - `GET /health/live` - Liveness check
pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health_check))
        .routes(routes!(readiness_check))
        .routes(routes!(liveness_check))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = HEALTH_TAG
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    checks.insert("store".to_string(), check_store(&state).await);
    checks.insert("queue".to_string(), check_queue(&state));
    checks.insert("dispatcher".to_string(), check_dispatcher(&state));

    let status = checks
        .values()
        .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: crate::pkg_version().to_string(),
            timestamp: jiff::Timestamp::now().to_string(),
            checks,
        }),
    )
}

#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    ),
    tag = HEALTH_TAG
)]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let store = check_store(&state).await;
    let queue = check_queue(&state);

    match store.status.worst(queue.status) {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = HEALTH_TAG
)]
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

async fn check_store(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    let backend = state.store.backend_name();

    match state.store.ping().await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            message: Some(format!("{} backend reachable", backend)),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, backend, "Status store ping failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some(format!("{} backend unreachable", backend)),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            }
        }
    }
}

fn check_queue(state: &AppState) -> ComponentHealth {
    if state.queue.is_stopped() {
        ComponentHealth {
            status: HealthStatus::Unhealthy,
            message: Some("Job queue stopped".to_string()),
            response_time_ms: None,
        }
    } else {
        ComponentHealth {
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: None,
        }
    }
}

fn check_dispatcher(state: &AppState) -> ComponentHealth {
    let stats = state.dispatcher.stats();
    let queued: usize = stats.lanes.values().map(|lane| lane.queued).sum();
    ComponentHealth {
        status: HealthStatus::Healthy,
        message: Some(format!(
            "{} calls, {:.1}% successful, {} waiting",
            stats.total_calls, stats.success_rate, queued
        )),
        response_time_ms: None,
    }
}
