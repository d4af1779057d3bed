//! Per-tenant batch job engine.
//!
//! Callers submit a list of [`WorkItem`]s for a `(tenant, job type)` pair with
//! a [`Processing`] strategy. A single worker drains jobs in submission
//! order, runs each job's items in fixed-size parallel batches and persists a
//! [`JobStatusSnapshot`](crate::store::JobStatusSnapshot) after every batch.
//!
//! ```ignore
//! let receipt = queue
//!     .submit("shop-a", "seo", items, Processing::from_fn(|item| async move {
//!         Ok(ItemOutcome::Success(None))
//!     }))
//!     .await?;
//! ```

pub mod error;
mod executor;
pub mod models;
mod queue;
pub mod types;

pub use error::{JobError, JobResult};
pub use models::{ActiveJobSummary, JobCounters, QueueOverview, ReasonLog, SubmitReceipt};
pub use queue::JobQueue;
pub use types::{
    FnProcessor, ItemOutcome, ItemProcessor, ProcessError, Processing, TwoPhaseProcessor, WorkItem,
};
