use thiserror::Error;

use super::Lane;

/// Outcome of a dispatched task that did not produce its own result.
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// The task ran past the lane deadline and was dropped
    #[error("{lane} lane call timed out after {timeout_ms}ms")]
    Timeout { lane: Lane, timeout_ms: u64 },

    /// The task was discarded by `clear()` before it started
    #[error("{lane} lane task discarded before start")]
    Cleared { lane: Lane },

    #[error(transparent)]
    Task(E),
}

impl<E> DispatchError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout { .. })
    }
}
