use thiserror::Error;

use crate::config::error::ConfigError;
use crate::jobs::JobError;
use crate::store::StoreError;

/// Application-wide error type surfaced by the HTTP layer and the CLI.
///
/// Internal failures carry their source for logging, but only a sanitized
/// message ever reaches a status poller (see the `IntoResponse` impl in
/// `api::middleware::error_handler`).
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// The engine refused the operation in its current state (e.g. stopped queue)
    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    /// Status store operation error
    #[error("Status store operation failed: {operation}")]
    Store {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::ValidationError { field, message } => AppError::Validation {
                field,
                reason: message,
            },
            other => AppError::Configuration {
                key: "settings".to_string(),
                source: other.into(),
            },
        }
    }
}

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::InvalidKey { field, reason } => AppError::Validation { field, reason },
            JobError::EmptyJob { .. } => AppError::BadRequest {
                message: error.to_string(),
            },
            JobError::QueueStopped => AppError::Unavailable {
                message: error.to_string(),
            },
            JobError::Store(source) => AppError::Store {
                operation: "job status".to_string(),
                source,
            },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        AppError::Store {
            operation: "status store".to_string(),
            source: error,
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_validation_maps_to_validation() {
        let err: AppError = JobError::InvalidKey {
            field: "tenant_id".to_string(),
            reason: "must not be empty".to_string(),
        }
        .into();

        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "tenant_id"),
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_stopped_queue_maps_to_unavailable() {
        let err: AppError = JobError::QueueStopped.into();
        assert!(matches!(err, AppError::Unavailable { .. }));
    }

    #[test]
    fn test_anyhow_maps_to_internal() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AppError::Internal { .. }));
        assert_eq!(err.to_string(), "Internal error");
    }
}
