//! Durable job status projection.
//!
//! A [`JobStatusSnapshot`] is keyed by [`JobKey`] and overwritten by merging
//! [`SnapshotPatch`]es. Field names are camelCase on the wire.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Tenant plus job type; at most one job per key is queued or processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobKey {
    pub tenant_id: String,
    pub job_type: String,
}

impl JobKey {
    pub fn new(tenant_id: impl Into<String>, job_type: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            job_type: job_type.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.job_type)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended as `failed`. Item failures never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The tenant's cancellation flag was observed at a batch boundary
    Cancelled,
    /// The processor reported a quota or plan restriction
    Restricted,
    /// The queue stopped before the job started
    Shutdown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Restricted => write!(f, "restricted"),
            FailureKind::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReasonEntry {
    pub item_id: String,
    pub reason: String,
}

/// Progress after the latest finished batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub current: usize,
    pub total: usize,
    pub percent: u8,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    #[schema(value_type = String, format = DateTime)]
    pub started_at: Timestamp,
}

/// Missing fields decode to their idle values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JobStatusSnapshot {
    pub in_progress: bool,
    pub status: JobStatus,
    pub message: Option<String>,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub job_id: Option<Uuid>,
    pub total_items: usize,
    pub processed_items: usize,
    pub successful_items: usize,
    pub failed_items: usize,
    pub skipped_items: usize,
    pub skip_reasons: Vec<ReasonEntry>,
    pub fail_reasons: Vec<ReasonEntry>,
    pub progress: Option<JobProgress>,
    /// Free-form label of the step the worker is in, e.g. "batch 2/5"
    pub phase: Option<String>,
    pub failure: Option<FailureKind>,
    /// Filled from the separate cancellation entry on read
    #[serde(default)]
    pub cancelled: bool,
    pub attempt: u32,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub queued_at: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub started_at: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub failed_at: Option<Timestamp>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub updated_at: Option<Timestamp>,
    /// Queue position reported by live status queries; 0 while processing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl JobStatusSnapshot {
    /// The view returned for a key nothing was ever submitted under.
    pub fn idle() -> Self {
        Self {
            in_progress: false,
            status: JobStatus::Idle,
            message: None,
            job_id: None,
            total_items: 0,
            processed_items: 0,
            successful_items: 0,
            failed_items: 0,
            skipped_items: 0,
            skip_reasons: Vec::new(),
            fail_reasons: Vec::new(),
            progress: None,
            phase: None,
            failure: None,
            cancelled: false,
            attempt: 0,
            queued_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            updated_at: None,
            position: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for JobStatusSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Partial update merged into a stored snapshot.
///
/// `None` leaves a field untouched. Clearable fields use `Option<Option<_>>`
/// so `Some(None)` erases the stored value. `progress` replaces the whole
/// sub-object.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPatch {
    pub in_progress: Option<bool>,
    pub status: Option<JobStatus>,
    pub message: Option<Option<String>>,
    pub job_id: Option<Uuid>,
    pub total_items: Option<usize>,
    pub processed_items: Option<usize>,
    pub successful_items: Option<usize>,
    pub failed_items: Option<usize>,
    pub skipped_items: Option<usize>,
    pub skip_reasons: Option<Vec<ReasonEntry>>,
    pub fail_reasons: Option<Vec<ReasonEntry>>,
    pub progress: Option<Option<JobProgress>>,
    pub phase: Option<Option<String>>,
    pub failure: Option<Option<FailureKind>>,
    pub attempt: Option<u32>,
    pub queued_at: Option<Option<Timestamp>>,
    pub started_at: Option<Option<Timestamp>>,
    pub completed_at: Option<Option<Timestamp>>,
    pub failed_at: Option<Option<Timestamp>>,
}

impl SnapshotPatch {
    /// Merges into `snapshot` and stamps `updated_at`.
    ///
    /// A snapshot left in progress never keeps a terminal timestamp.
    pub fn apply_to(self, snapshot: &mut JobStatusSnapshot, now: Timestamp) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut snapshot.in_progress, self.in_progress);
        set(&mut snapshot.status, self.status);
        set(&mut snapshot.message, self.message);
        if self.job_id.is_some() {
            snapshot.job_id = self.job_id;
        }
        set(&mut snapshot.total_items, self.total_items);
        set(&mut snapshot.processed_items, self.processed_items);
        set(&mut snapshot.successful_items, self.successful_items);
        set(&mut snapshot.failed_items, self.failed_items);
        set(&mut snapshot.skipped_items, self.skipped_items);
        set(&mut snapshot.skip_reasons, self.skip_reasons);
        set(&mut snapshot.fail_reasons, self.fail_reasons);
        set(&mut snapshot.progress, self.progress);
        set(&mut snapshot.phase, self.phase);
        set(&mut snapshot.failure, self.failure);
        set(&mut snapshot.attempt, self.attempt);
        set(&mut snapshot.queued_at, self.queued_at);
        set(&mut snapshot.started_at, self.started_at);
        set(&mut snapshot.completed_at, self.completed_at);
        set(&mut snapshot.failed_at, self.failed_at);

        if snapshot.in_progress {
            snapshot.completed_at = None;
            snapshot.failed_at = None;
        }
        snapshot.updated_at = Some(now);
        snapshot.position = None;
    }
}
