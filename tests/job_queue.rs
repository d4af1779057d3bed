//! End-to-end runs of the job queue through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use batchwork::config::{DispatcherConfig, LaneConfig, QueueConfig};
use batchwork::dispatcher::{Lane, RateLimitedDispatcher};
use batchwork::jobs::{
    ItemOutcome, JobError, JobQueue, ProcessError, Processing, TwoPhaseProcessor, WorkItem,
};
use batchwork::store::{FailureKind, JobStatus, JobStatusSnapshot, JobStatusStore, MemoryBackend};
use serde_json::{Value, json};

fn queue() -> JobQueue {
    let config = QueueConfig {
        inter_batch_delay_ms: 0,
        ..QueueConfig::default()
    };
    JobQueue::new(config, JobStatusStore::new(Arc::new(MemoryBackend::new())), None)
}

fn items(n: usize) -> Vec<WorkItem> {
    (1..=n)
        .map(|i| WorkItem::new(format!("item-{}", i), json!({ "index": i })))
        .collect()
}

async fn wait_terminal(queue: &JobQueue, tenant_id: &str, job_type: &str) -> JobStatusSnapshot {
    for _ in 0..500 {
        let status = queue.get_status(tenant_id, job_type).await.unwrap();
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{}/{} never finished", tenant_id, job_type);
}

/// Generates through the bulk lane; odd items have nothing to generate.
struct DescriptionWriter {
    dispatcher: RateLimitedDispatcher,
    applied: AtomicUsize,
}

#[async_trait]
impl TwoPhaseProcessor for DescriptionWriter {
    async fn generate(&self, item: &WorkItem) -> Result<ItemOutcome, ProcessError> {
        let index = item.params["index"].as_u64().unwrap_or_default();
        let text = self
            .dispatcher
            .submit(Lane::Bulk, async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, ProcessError>(format!("description {}", index))
            })
            .await?;

        if index % 2 == 1 {
            Ok(ItemOutcome::Skipped("already has a description".to_string()))
        } else {
            Ok(ItemOutcome::Success(Some(Value::String(text))))
        }
    }

    async fn apply(&self, _item: &WorkItem, data: Option<Value>) -> Result<ItemOutcome, ProcessError> {
        assert!(data.is_some());
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(ItemOutcome::Success(None))
    }
}

#[tokio::test]
async fn two_phase_job_through_dispatcher() {
    let queue = queue();
    let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig::default());
    let writer = Arc::new(DescriptionWriter {
        dispatcher: dispatcher.clone(),
        applied: AtomicUsize::new(0),
    });

    let receipt = queue
        .submit("shop-a", "descriptions", items(6), Processing::TwoPhase(writer.clone()))
        .await
        .unwrap();
    assert!(receipt.accepted);

    let status = wait_terminal(&queue, "shop-a", "descriptions").await;
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.successful_items, 3);
    assert_eq!(status.skipped_items, 3);
    assert_eq!(status.failed_items, 0);
    assert_eq!(status.skip_reasons.len(), 3);
    assert_eq!(writer.applied.load(Ordering::SeqCst), 3);

    let stats = dispatcher.stats();
    assert_eq!(stats.total_calls, 6);
    assert_eq!(stats.successful_calls, 6);
    assert!(dispatcher.is_idle());
}

#[tokio::test]
async fn dispatcher_timeout_counts_as_item_failure() {
    let queue = queue();
    let lane = LaneConfig {
        concurrency: 2,
        rate_per_interval: 50,
        interval_ms: 1_000,
        timeout_ms: 50,
    };
    let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig {
        interactive: lane,
        normal: lane,
        bulk: lane,
    });

    let processing = Processing::from_fn(move |item: WorkItem| {
        let dispatcher = dispatcher.clone();
        async move {
            let slow = item.id == "item-2";
            dispatcher
                .submit(Lane::Normal, async move {
                    if slow {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<_, ProcessError>(ItemOutcome::Success(None))
                })
                .await
                .map_err(ProcessError::from)
        }
    });

    queue.submit("shop-b", "alt-text", items(3), processing).await.unwrap();

    let status = wait_terminal(&queue, "shop-b", "alt-text").await;
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.successful_items, 2);
    assert_eq!(status.failed_items, 1);
    assert_eq!(status.fail_reasons[0].item_id, "item-2");
    assert!(status.fail_reasons[0].reason.contains("timed out"));
}

#[tokio::test]
async fn job_types_of_one_tenant_run_independently_in_order() {
    let queue = queue();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let recorder = |tag: &'static str| {
        let order = order.clone();
        Processing::from_fn(move |_item: WorkItem| {
            let order = order.clone();
            async move {
                order.lock().unwrap().push(tag);
                Ok(ItemOutcome::Success(None))
            }
        })
    };

    let first = queue.submit("shop-c", "seo", items(2), recorder("seo")).await.unwrap();
    let second = queue
        .submit("shop-c", "alt-text", items(2), recorder("alt-text"))
        .await
        .unwrap();
    assert!(first.accepted && second.accepted);
    assert_ne!(first.job_id, second.job_id);

    let seo = wait_terminal(&queue, "shop-c", "seo").await;
    let alt = wait_terminal(&queue, "shop-c", "alt-text").await;
    assert_eq!(seo.successful_items, 2);
    assert_eq!(alt.successful_items, 2);
    assert_eq!(*order.lock().unwrap(), vec!["seo", "seo", "alt-text", "alt-text"]);
}

#[tokio::test]
async fn cancel_request_stops_a_running_job() {
    let queue = queue();
    let started = Arc::new(AtomicUsize::new(0));

    let counter = started.clone();
    let processing = Processing::from_fn(move |_item: WorkItem| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(ItemOutcome::Success(None))
        }
    });

    queue.submit("shop-d", "seo", items(10), processing).await.unwrap();
    while started.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(queue.set_cancelled("shop-d", "seo", true).await.unwrap());

    let status = wait_terminal(&queue, "shop-d", "seo").await;
    assert_eq!(status.status, JobStatus::Failed);
    assert_eq!(status.failure, Some(FailureKind::Cancelled));
    assert!(status.cancelled);
    assert!(started.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn unknown_key_is_idle_and_stopped_queue_refuses_work() {
    let queue = queue();

    let idle = queue.get_status("shop-e", "seo").await.unwrap();
    assert_eq!(idle.status, JobStatus::Idle);
    assert!(!idle.in_progress);
    assert!(idle.message.is_none());

    queue.stop().await;
    let result = queue
        .submit(
            "shop-e",
            "seo",
            items(1),
            Processing::from_fn(|_item: WorkItem| async { Ok(ItemOutcome::Success(None)) }),
        )
        .await;
    assert!(matches!(result, Err(JobError::QueueStopped)));
    assert!(matches!(queue.start().await, Err(JobError::QueueStopped)));
}
