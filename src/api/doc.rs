use utoipa::OpenApi;

pub const JOB_TAG: &str = "Jobs";
pub const QUEUE_TAG: &str = "Queue";
pub const DISPATCHER_TAG: &str = "Dispatcher";
pub const HEALTH_TAG: &str = "Health";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "batchwork",
        description = "Status and control surface for the batch job queue and the rate-limited dispatcher",
    ),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::dispatcher::Lane,
            crate::store::JobStatusSnapshot,
            crate::jobs::QueueOverview,
            crate::jobs::ActiveJobSummary,
        )
    ),
    tags(
        (name = JOB_TAG, description = "Per-tenant job status and cancellation"),
        (name = QUEUE_TAG, description = "Queue inspection"),
        (name = DISPATCHER_TAG, description = "Dispatcher lanes and statistics"),
        (name = HEALTH_TAG, description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;
