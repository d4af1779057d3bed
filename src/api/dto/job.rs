use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancellationRequest {
    pub cancelled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResponse {
    pub tenant_id: String,
    pub job_type: String,
    pub cancelled: bool,
}

/// Tasks discarded from the dispatcher lanes.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearResponse {
    pub discarded: usize,
}
