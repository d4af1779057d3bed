//! Application state for Axum web framework.

use crate::dispatcher::RateLimitedDispatcher;
use crate::jobs::JobQueue;
use crate::store::JobStatusStore;

/// Shared services handed to every request handler.
///
/// Cloning is cheap; every field is a handle over shared state.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub dispatcher: RateLimitedDispatcher,
    /// The status store behind `queue`, used for readiness checks
    pub store: JobStatusStore,
}

impl AppState {
    pub fn new(queue: JobQueue, dispatcher: RateLimitedDispatcher) -> Self {
        Self {
            store: queue.store().clone(),
            queue,
            dispatcher,
        }
    }
}
