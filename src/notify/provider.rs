use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::ReasonEntry;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifier misconfigured: {0}")]
    Config(String),

    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notification rejected with status {status}")]
    Rejected { status: u16 },
}

/// Outcome of a completed job handed to a [`CompletionNotifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub job_id: Uuid,
    pub job_type: String,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_seconds: u64,
    pub skip_reasons: Vec<ReasonEntry>,
    pub fail_reasons: Vec<ReasonEntry>,
}

/// Best-effort alert for long-running jobs. The queue logs errors and
/// carries on.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, tenant_id: &str, summary: &CompletionSummary) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}
