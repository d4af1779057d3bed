//! Per-tenant FIFO job queue with a single background worker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::error::{JobError, JobResult};
use super::executor::{self, AttemptEnd};
use super::models::{ActiveJobSummary, Job, QueueOverview, SubmitReceipt};
use super::types::{Processing, WorkItem};
use crate::config::QueueConfig;
use crate::notify::CompletionNotifier;
use crate::store::{FailureKind, JobKey, JobStatusSnapshot, JobStatusStore};

pub(crate) struct ActiveJob {
    pub(crate) job_id: Uuid,
    pub(crate) key: JobKey,
    pub(crate) view: JobStatusSnapshot,
}

#[derive(Default)]
pub(crate) struct QueueState {
    pub(crate) pending: VecDeque<Job>,
    pub(crate) active: Option<ActiveJob>,
}

impl QueueState {
    fn existing(&self, key: &JobKey) -> Option<SubmitReceipt> {
        if let Some(active) = self.active.as_ref().filter(|active| active.key == *key) {
            return Some(SubmitReceipt {
                accepted: false,
                job_id: active.job_id,
                queue_position: 0,
                total_items: active.view.total_items,
            });
        }

        self.pending
            .iter()
            .position(|job| job.key == *key)
            .map(|index| SubmitReceipt {
                accepted: false,
                job_id: self.pending[index].id,
                queue_position: index + 1,
                total_items: self.pending[index].counters.total,
            })
    }
}

pub(crate) struct Inner {
    pub(crate) config: QueueConfig,
    pub(crate) store: JobStatusStore,
    pub(crate) notifier: Option<Arc<dyn CompletionNotifier>>,
    pub(crate) state: Mutex<QueueState>,
    wake: Notify,
    shutdown: CancellationToken,
    stopped: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Background batch engine. At most one job per [`JobKey`] is queued or
/// processing, and one job runs at a time across all tenants.
///
/// Cheap to clone; clones share the same queue and worker.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    pub fn new(
        config: QueueConfig,
        store: JobStatusStore,
        notifier: Option<Arc<dyn CompletionNotifier>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                notifier,
                state: Mutex::new(QueueState::default()),
                wake: Notify::new(),
                shutdown: CancellationToken::new(),
                stopped: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &JobStatusStore {
        &self.inner.store
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Spawns the worker unless it is already running.
    pub async fn start(&self) -> JobResult<()> {
        if self.is_stopped() {
            return Err(JobError::QueueStopped);
        }

        let mut worker = self.inner.worker.lock().await;
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let queue = self.clone();
        *worker = Some(tokio::spawn(async move { queue.run_worker().await }));
        tracing::info!("Job queue worker started");
        Ok(())
    }

    /// Lets the active job finish, fails every pending job as `shutdown`
    /// and waits for the worker to exit.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.cancel();

        let handle = self.inner.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Job queue worker terminated abnormally");
            }
        }

        let abandoned: Vec<Job> = self.inner.state.lock().await.pending.drain(..).collect();
        for job in &abandoned {
            tracing::warn!(job_id = %job.id, key = %job.key, "Pending job dropped at shutdown");
            let patch = executor::failed_patch(
                job,
                FailureKind::Shutdown,
                "Queue stopped before the job could run".to_string(),
            );
            self.inner.store.upsert(&job.key, patch).await;
        }

        tracing::info!(abandoned = abandoned.len(), "Job queue stopped");
    }

    pub async fn submit(
        &self,
        tenant_id: &str,
        job_type: &str,
        items: Vec<WorkItem>,
        processing: Processing,
    ) -> JobResult<SubmitReceipt> {
        let key = validate_key(tenant_id, job_type)?;
        if items.is_empty() {
            return Err(JobError::EmptyJob { key });
        }
        if self.is_stopped() {
            return Err(JobError::QueueStopped);
        }

        let receipt = {
            let mut state = self.inner.state.lock().await;
            // stop() drains pending under this lock; a job pushed after that would never run
            if self.is_stopped() {
                return Err(JobError::QueueStopped);
            }
            if let Some(existing) = state.existing(&key) {
                tracing::info!(
                    key = %key,
                    job_id = %existing.job_id,
                    position = existing.queue_position,
                    "Duplicate submission rejected"
                );
                return Ok(existing);
            }

            let job = Job::new(
                key.clone(),
                items,
                processing,
                self.inner.config.max_attempts_for(&key.job_type),
                self.inner.config.reason_log_capacity,
            );
            let position = state.pending.len() + 1;
            let receipt = SubmitReceipt {
                accepted: true,
                job_id: job.id,
                queue_position: position,
                total_items: job.counters.total,
            };

            // Written under the lock so the worker cannot overtake it
            let patch = executor::queued_patch(&job, format!("Queued at position {}", position));
            self.inner.store.upsert(&key, patch).await;
            state.pending.push_back(job);
            receipt
        };

        tracing::info!(
            key = %key,
            job_id = %receipt.job_id,
            items = receipt.total_items,
            position = receipt.queue_position,
            "Job queued"
        );

        self.inner.wake.notify_one();
        self.start().await?;
        Ok(receipt)
    }

    /// Live view of the active or pending job for the key, else the last
    /// terminal snapshot, else idle.
    pub async fn get_status(&self, tenant_id: &str, job_type: &str) -> JobResult<JobStatusSnapshot> {
        let key = validate_key(tenant_id, job_type)?;

        let live = {
            let state = self.inner.state.lock().await;
            match state.active.as_ref().filter(|active| active.key == key) {
                Some(active) => {
                    let mut view = active.view.clone();
                    view.position = Some(0);
                    Some(view)
                }
                None => state
                    .pending
                    .iter()
                    .position(|job| job.key == key)
                    .map(|index| state.pending[index].queued_view(index + 1)),
            }
        };

        let mut snapshot = match live {
            Some(view) => view,
            None => {
                let stored = self.inner.store.get(&key).await;
                if stored.is_terminal() {
                    return Ok(stored);
                }
                if stored.status.is_active() {
                    tracing::debug!(key = %key, status = %stored.status, "Ignoring orphaned snapshot");
                }
                JobStatusSnapshot::idle()
            }
        };
        snapshot.cancelled = self.inner.store.is_cancelled(&key).await;
        Ok(snapshot)
    }

    /// Sets or clears the cooperative cancellation flag.
    pub async fn set_cancelled(&self, tenant_id: &str, job_type: &str, cancelled: bool) -> JobResult<bool> {
        let key = validate_key(tenant_id, job_type)?;
        self.inner.store.set_cancelled(&key, cancelled).await?;
        tracing::info!(key = %key, cancelled, "Cancellation flag updated");
        Ok(cancelled)
    }

    pub async fn overview(&self) -> QueueOverview {
        let state = self.inner.state.lock().await;
        QueueOverview {
            pending: state.pending.len(),
            pending_keys: state.pending.iter().map(|job| job.key.clone()).collect(),
            active: state.active.as_ref().map(|active| ActiveJobSummary {
                job_id: active.job_id,
                key: active.key.clone(),
                attempt: active.view.attempt,
                processed_items: active.view.processed_items,
                total_items: active.view.total_items,
            }),
        }
    }

    async fn run_worker(self) {
        let shutdown = self.inner.shutdown.clone();

        while !shutdown.is_cancelled() {
            let next = {
                let mut state = self.inner.state.lock().await;
                let job = state.pending.pop_front();
                if let Some(job) = &job {
                    let mut view = job.queued_view(0);
                    view.position = None;
                    state.active = Some(ActiveJob {
                        job_id: job.id,
                        key: job.key.clone(),
                        view,
                    });
                }
                job
            };

            let Some(job) = next else {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = self.inner.wake.notified() => {}
                }
                continue;
            };

            let span = tracing::info_span!(
                "job",
                job_id = %job.id,
                tenant_id = %job.key.tenant_id,
                job_type = %job.key.job_type,
                attempt = job.attempt,
            );
            let end = executor::run(&self.inner, job).instrument(span.clone()).await;

            let notify = {
                let mut state = self.inner.state.lock().await;
                state.active = None;
                match end {
                    AttemptEnd::Requeue(job) => {
                        state.pending.push_back(job);
                        None
                    }
                    AttemptEnd::Notify { tenant_id, summary } => Some((tenant_id, summary)),
                    AttemptEnd::Finished => None,
                }
            };

            // The key is free for resubmission while the notifier runs
            if let Some((tenant_id, summary)) = notify {
                executor::notify(&self.inner, &tenant_id, &summary)
                    .instrument(span)
                    .await;
            }
        }

        tracing::debug!("Job queue worker exiting");
    }
}

fn validate_key(tenant_id: &str, job_type: &str) -> JobResult<JobKey> {
    for (field, value) in [("tenant_id", tenant_id), ("job_type", job_type)] {
        let reason = if value.trim().is_empty() {
            "must not be empty"
        } else if value.contains(':') {
            "must not contain ':'"
        } else {
            continue;
        };
        return Err(JobError::InvalidKey {
            field: field.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(JobKey::new(tenant_id, job_type))
}
