use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dispatcher::DispatchError;

/// One unit of work inside a job. The payload is opaque to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    #[serde(default)]
    pub params: Value,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            params,
        }
    }
}

/// Result of processing a single item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Carries generated data forward to the apply phase
    Success(Option<Value>),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    /// Counted as a failed item; siblings keep running
    #[error("{0}")]
    Item(String),

    /// Quota or plan restriction; halts the whole job
    #[error("{0}")]
    Restriction(String),
}

impl From<DispatchError<ProcessError>> for ProcessError {
    fn from(error: DispatchError<ProcessError>) -> Self {
        match error {
            DispatchError::Task(inner) => inner,
            other => ProcessError::Item(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &WorkItem) -> Result<ItemOutcome, ProcessError>;
}

/// Generate-then-apply processing. `apply` only runs after `generate`
/// returned [`ItemOutcome::Success`].
#[async_trait]
pub trait TwoPhaseProcessor: Send + Sync {
    async fn generate(&self, item: &WorkItem) -> Result<ItemOutcome, ProcessError>;

    async fn apply(&self, item: &WorkItem, data: Option<Value>) -> Result<ItemOutcome, ProcessError>;
}

/// Adapts an async closure into an [`ItemProcessor`].
pub struct FnProcessor<F>(F);

impl<F, Fut> FnProcessor<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ItemOutcome, ProcessError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> ItemProcessor for FnProcessor<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ItemOutcome, ProcessError>> + Send,
{
    async fn process(&self, item: &WorkItem) -> Result<ItemOutcome, ProcessError> {
        (self.0)(item.clone()).await
    }
}

/// How the items of one job are processed.
#[derive(Clone)]
pub enum Processing {
    Single(Arc<dyn ItemProcessor>),
    TwoPhase(Arc<dyn TwoPhaseProcessor>),
}

impl Processing {
    pub fn single(processor: impl ItemProcessor + 'static) -> Self {
        Processing::Single(Arc::new(processor))
    }

    pub fn two_phase(processor: impl TwoPhaseProcessor + 'static) -> Self {
        Processing::TwoPhase(Arc::new(processor))
    }

    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ItemOutcome, ProcessError>> + Send + 'static,
    {
        Processing::single(FnProcessor::new(f))
    }

    pub(crate) async fn run(&self, item: &WorkItem) -> Result<ItemOutcome, ProcessError> {
        match self {
            Processing::Single(processor) => processor.process(item).await,
            Processing::TwoPhase(processor) => match processor.generate(item).await? {
                ItemOutcome::Success(data) => processor.apply(item, data).await,
                other => Ok(other),
            },
        }
    }
}

impl fmt::Debug for Processing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processing::Single(_) => f.write_str("Processing::Single"),
            Processing::TwoPhase(_) => f.write_str("Processing::TwoPhase"),
        }
    }
}
