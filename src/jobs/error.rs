use thiserror::Error;

use crate::store::{JobKey, StoreError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid {field}: {reason}")]
    InvalidKey { field: String, reason: String },

    #[error("Job {key} has no items")]
    EmptyJob { key: JobKey },

    #[error("Job queue is stopped")]
    QueueStopped,

    #[error("Status store error: {0}")]
    Store(#[from] StoreError),
}

pub type JobResult<T> = Result<T, JobError>;
