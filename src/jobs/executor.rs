//! Runs one attempt of a job: batches, progress, terminal status.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use jiff::Timestamp;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::models::{Job, JobCounters};
use super::queue::Inner;
use super::types::{ItemOutcome, ProcessError, Processing, WorkItem};
use crate::notify::CompletionSummary;
use crate::store::{
    FailureKind, JobKey, JobProgress, JobStatus, JobStatusSnapshot, SnapshotPatch,
};

enum ItemResult {
    Outcome(ItemOutcome),
    Restricted(String),
}

/// How an attempt ended, as seen by the worker loop.
pub(super) enum AttemptEnd {
    /// Terminal status written; nothing left to do
    Finished,
    /// Failed items go back to the queue as the next attempt
    Requeue(Job),
    /// Completed past the notify threshold; notify once the job left the active slot
    Notify { tenant_id: String, summary: CompletionSummary },
}

#[derive(Default)]
struct BatchReport {
    outcomes: Vec<(WorkItem, ItemOutcome)>,
    restriction: Option<(WorkItem, String)>,
}

/// Runs `job` to the end of the current attempt.
pub(super) async fn run(inner: &Inner, mut job: Job) -> AttemptEnd {
    let key = job.key.clone();
    let batch_size = inner.config.batch_size_for(&key.job_type);
    let delay = inner.config.inter_batch_delay();

    if job.attempt == 1 {
        inner.store.clear_cancelled(&key).await;
    }

    let now = Timestamp::now();
    let started = *job.started.get_or_insert_with(Instant::now);
    let started_at = *job.started_at.get_or_insert(now);

    let items = std::mem::take(&mut job.items);
    let batches: Vec<Vec<WorkItem>> = items.chunks(batch_size).map(<[_]>::to_vec).collect();
    let total_batches = batches.len();

    tracing::info!(
        items = items.len(),
        batches = total_batches,
        batch_size,
        "Job started"
    );

    let mut view = JobStatusSnapshot::idle();
    persist(
        inner,
        &key,
        &mut view,
        SnapshotPatch {
            in_progress: Some(true),
            status: Some(JobStatus::Processing),
            message: Some(Some(format!("Processing {} items", items.len()))),
            job_id: Some(job.id),
            phase: Some(Some(format!("batch 0/{}", total_batches))),
            progress: Some(None),
            failure: Some(None),
            attempt: Some(job.attempt),
            queued_at: Some(Some(job.queued_at)),
            started_at: Some(Some(started_at)),
            ..counters_patch(&job)
        },
    )
    .await;

    let mut retry_items = Vec::new();
    for (index, batch) in batches.into_iter().enumerate() {
        if inner.store.is_cancelled(&key).await {
            tracing::info!(batch = index + 1, "Cancellation observed");
            let message = format!(
                "Cancelled after {} of {} items",
                job.counters.processed, job.counters.total
            );
            persist(inner, &key, &mut view, failed_patch(&job, FailureKind::Cancelled, message)).await;
            return AttemptEnd::Finished;
        }

        let report = run_batch(&job.processing, batch).await;
        for (item, outcome) in report.outcomes {
            job.counters.record(&outcome);
            match outcome {
                ItemOutcome::Success(_) => {}
                ItemOutcome::Skipped(reason) => job.skip_log.push(&item.id, reason),
                ItemOutcome::Failed(reason) => {
                    tracing::debug!(item_id = %item.id, reason = %reason, "Item failed");
                    job.fail_log.push(&item.id, reason);
                    retry_items.push(item);
                }
            }
        }

        if let Some((item, message)) = report.restriction {
            tracing::warn!(item_id = %item.id, reason = %message, "Restriction halted job");
            job.counters.record(&ItemOutcome::Failed(message.clone()));
            job.fail_log.push(&item.id, message.clone());
            persist(inner, &key, &mut view, failed_patch(&job, FailureKind::Restricted, message)).await;
            return AttemptEnd::Finished;
        }

        persist(
            inner,
            &key,
            &mut view,
            SnapshotPatch {
                phase: Some(Some(format!("batch {}/{}", index + 1, total_batches))),
                progress: Some(Some(progress(
                    &job.counters,
                    started,
                    started_at,
                    inner.config.default_item_estimate_secs,
                ))),
                ..counters_patch(&job)
            },
        )
        .await;

        if index + 1 < total_batches && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    if !retry_items.is_empty() && job.can_retry() {
        {
            let ids: HashSet<&str> = retry_items.iter().map(|item| item.id.as_str()).collect();
            job.fail_log.forget(&ids);
        }
        job.counters.rollback_failed();
        job.attempt += 1;
        let retrying = retry_items.len();
        job.items = retry_items;

        tracing::info!(
            retrying,
            next_attempt = job.attempt,
            max_attempts = job.max_attempts,
            "Requeueing failed items"
        );
        let message = format!(
            "Retrying {} failed items (attempt {}/{})",
            retrying, job.attempt, job.max_attempts
        );
        persist(inner, &key, &mut view, queued_patch(&job, message)).await;
        return AttemptEnd::Requeue(job);
    }

    let duration = started.elapsed();
    let counters = job.counters;
    let message = format!(
        "Completed {} items: {} succeeded, {} failed, {} skipped in {}s",
        counters.total,
        counters.successful,
        counters.failed,
        counters.skipped,
        duration.as_secs()
    );
    persist(
        inner,
        &key,
        &mut view,
        SnapshotPatch {
            in_progress: Some(false),
            status: Some(JobStatus::Completed),
            message: Some(Some(message)),
            phase: Some(None),
            progress: Some(Some(progress(&counters, started, started_at, 0))),
            completed_at: Some(Some(Timestamp::now())),
            ..counters_patch(&job)
        },
    )
    .await;

    tracing::info!(
        successful = counters.successful,
        failed = counters.failed,
        skipped = counters.skipped,
        duration_secs = duration.as_secs(),
        "Job completed"
    );

    if duration <= inner.config.notify_threshold() || inner.notifier.is_none() {
        return AttemptEnd::Finished;
    }

    AttemptEnd::Notify {
        tenant_id: key.tenant_id,
        summary: CompletionSummary {
            job_id: job.id,
            job_type: key.job_type,
            successful: counters.successful,
            failed: counters.failed,
            skipped: counters.skipped,
            duration_seconds: duration.as_secs(),
            skip_reasons: job.skip_log.to_vec(),
            fail_reasons: job.fail_log.to_vec(),
        },
    }
}

/// Best-effort completion notification; failures are only logged.
pub(super) async fn notify(inner: &Inner, tenant_id: &str, summary: &CompletionSummary) {
    let Some(notifier) = &inner.notifier else {
        return;
    };
    if let Err(e) = notifier.notify(tenant_id, summary).await {
        tracing::warn!(error = %e, notifier = notifier.name(), "Completion notification failed");
    }
}

/// Runs every item of a batch as its own task. A restriction aborts the
/// tasks still running.
async fn run_batch(processing: &Processing, batch: Vec<WorkItem>) -> BatchReport {
    let mut tasks = JoinSet::new();
    for item in batch {
        let processing = processing.clone();
        tasks.spawn(async move {
            let result = AssertUnwindSafe(processing.run(&item)).catch_unwind().await;
            let result = match result {
                Ok(Ok(outcome)) => ItemResult::Outcome(outcome),
                Ok(Err(ProcessError::Item(reason))) => ItemResult::Outcome(ItemOutcome::Failed(reason)),
                Ok(Err(ProcessError::Restriction(message))) => ItemResult::Restricted(message),
                Err(panic) => ItemResult::Outcome(ItemOutcome::Failed(format!(
                    "Item processing panicked: {}",
                    panic_message(&*panic)
                ))),
            };
            (item, result)
        });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((item, ItemResult::Outcome(outcome))) => report.outcomes.push((item, outcome)),
            Ok((item, ItemResult::Restricted(message))) => {
                tasks.abort_all();
                report.restriction = Some((item, message));
                break;
            }
            Err(e) => tracing::warn!(error = %e, "Item task ended without a result"),
        }
    }
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn progress(
    counters: &JobCounters,
    started: Instant,
    started_at: Timestamp,
    item_estimate_secs: u64,
) -> JobProgress {
    let elapsed = started.elapsed();
    let remaining_items = counters.remaining();
    let remaining_seconds = if counters.processed == 0 {
        remaining_items as u64 * item_estimate_secs
    } else {
        (elapsed.as_secs_f64() / counters.processed as f64 * remaining_items as f64).round() as u64
    };

    JobProgress {
        current: counters.processed,
        total: counters.total,
        percent: counters.percent(),
        elapsed_seconds: elapsed.as_secs(),
        remaining_seconds,
        started_at,
    }
}

/// Persists a patch and mirrors it into the live view served to pollers.
async fn persist(inner: &Inner, key: &JobKey, view: &mut JobStatusSnapshot, patch: SnapshotPatch) {
    patch.clone().apply_to(view, Timestamp::now());
    {
        let mut state = inner.state.lock().await;
        if let Some(active) = state.active.as_mut().filter(|active| active.key == *key) {
            active.view = view.clone();
        }
    }
    inner.store.upsert(key, patch).await;
}

fn counters_patch(job: &Job) -> SnapshotPatch {
    SnapshotPatch {
        total_items: Some(job.counters.total),
        processed_items: Some(job.counters.processed),
        successful_items: Some(job.counters.successful),
        failed_items: Some(job.counters.failed),
        skipped_items: Some(job.counters.skipped),
        skip_reasons: Some(job.skip_log.to_vec()),
        fail_reasons: Some(job.fail_log.to_vec()),
        ..SnapshotPatch::default()
    }
}

pub(super) fn queued_patch(job: &Job, message: String) -> SnapshotPatch {
    SnapshotPatch {
        in_progress: Some(true),
        status: Some(JobStatus::Queued),
        message: Some(Some(message)),
        job_id: Some(job.id),
        progress: Some(None),
        phase: Some(None),
        failure: Some(None),
        attempt: Some(job.attempt),
        queued_at: Some(Some(job.queued_at)),
        started_at: Some(job.started_at),
        completed_at: Some(None),
        failed_at: Some(None),
        ..counters_patch(job)
    }
}

pub(super) fn failed_patch(job: &Job, failure: FailureKind, message: String) -> SnapshotPatch {
    SnapshotPatch {
        in_progress: Some(false),
        status: Some(JobStatus::Failed),
        message: Some(Some(message)),
        job_id: Some(job.id),
        phase: Some(None),
        failure: Some(Some(failure)),
        attempt: Some(job.attempt),
        failed_at: Some(Some(Timestamp::now())),
        ..counters_patch(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_remaining_uses_estimate_before_first_item() {
        let counters = JobCounters::new(4);
        let progress = progress(&counters, Instant::now(), Timestamp::now(), 5);
        assert_eq!(progress.remaining_seconds, 20);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn test_remaining_extrapolates_average() {
        let counters = JobCounters {
            total: 10,
            processed: 5,
            successful: 5,
            ..JobCounters::default()
        };
        let started = Instant::now() - Duration::from_secs(10);
        let progress = progress(&counters, started, Timestamp::now(), 5);
        assert_eq!(progress.remaining_seconds, 10);
        assert_eq!(progress.elapsed_seconds, 10);
        assert_eq!(progress.percent, 50);
    }

    #[tokio::test]
    async fn test_batch_isolates_panics_and_errors() {
        let processing = Processing::from_fn(|item: WorkItem| async move {
            match item.id.as_str() {
                "boom" => panic!("processor bug"),
                "bad" => Err(ProcessError::Item("upstream 500".to_string())),
                _ => Ok(ItemOutcome::Success(None)),
            }
        });
        let batch = ["ok", "boom", "bad"]
            .into_iter()
            .map(|id| WorkItem::new(id, serde_json::Value::Null))
            .collect();

        let report = run_batch(&processing, batch).await;
        assert!(report.restriction.is_none());
        assert_eq!(report.outcomes.len(), 3);

        let reason = |id: &str| {
            report
                .outcomes
                .iter()
                .find(|(item, _)| item.id == id)
                .map(|(_, outcome)| outcome.clone())
                .unwrap()
        };
        assert_eq!(reason("ok"), ItemOutcome::Success(None));
        assert!(matches!(reason("boom"), ItemOutcome::Failed(ref r) if r.contains("processor bug")));
        assert_eq!(reason("bad"), ItemOutcome::Failed("upstream 500".to_string()));
    }
}
