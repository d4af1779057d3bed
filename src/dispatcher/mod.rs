//! Multi-lane rate limiting for calls to the external generation service.
//!
//! Each [`Lane`] bounds concurrency, start rate and per-call timeout on its
//! own, so bulk background work cannot starve interactive requests. The
//! dispatcher never retries; callers decide what a timeout means.

mod error;
mod lane;
mod stats;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use utoipa::ToSchema;

pub use error::DispatchError;
pub use stats::{DispatcherStats, LaneStats};

use crate::config::DispatcherConfig;
use lane::LaneRuntime;
use stats::DispatchCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Interactive,
    Normal,
    Bulk,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Interactive, Lane::Normal, Lane::Bulk];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Interactive => "interactive",
            Lane::Normal => "normal",
            Lane::Bulk => "bulk",
        }
    }

    fn index(self) -> usize {
        match self {
            Lane::Interactive => 0,
            Lane::Normal => 1,
            Lane::Bulk => 2,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-lane dispatcher. Cheap to clone; clones share lanes and counters.
#[derive(Clone)]
pub struct RateLimitedDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    lanes: [LaneRuntime; 3],
    counters: DispatchCounters,
    // Pinged whenever a lane counter drops
    idle: Notify,
}

/// Holds one unit of a lane counter until dropped.
struct Tracked<'a> {
    counter: &'a AtomicUsize,
    idle: &'a Notify,
}

impl<'a> Tracked<'a> {
    fn new(counter: &'a AtomicUsize, idle: &'a Notify) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter, idle }
    }
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

impl RateLimitedDispatcher {
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                lanes: [
                    LaneRuntime::new(Lane::Interactive, config.interactive),
                    LaneRuntime::new(Lane::Normal, config.normal),
                    LaneRuntime::new(Lane::Bulk, config.bulk),
                ],
                counters: DispatchCounters::new(),
                idle: Notify::new(),
            }),
        }
    }

    fn lane(&self, lane: Lane) -> &LaneRuntime {
        &self.inner.lanes[lane.index()]
    }

    /// Runs `task` once the lane admits it, bounded by the lane timeout.
    pub async fn submit<F, T, E>(&self, lane: Lane, task: F) -> Result<T, DispatchError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.submit_metered(lane, task, |_| None).await
    }

    /// Like [`submit`](Self::submit); `meter` reports the units a successful
    /// result consumed (tokens, credits) for the dispatcher totals.
    pub async fn submit_metered<F, T, E, M>(
        &self,
        lane: Lane,
        task: F,
        meter: M,
    ) -> Result<T, DispatchError<E>>
    where
        F: Future<Output = Result<T, E>>,
        M: FnOnce(&T) -> Option<u64>,
    {
        let runtime = self.lane(lane);
        let counters = &self.inner.counters;
        counters.record_submitted();

        let waiting = Tracked::new(&runtime.queued, &self.inner.idle);
        let Some(_permit) = runtime.admit().await else {
            drop(waiting);
            counters.record_cleared();
            tracing::debug!(lane = %lane, "Queued task discarded");
            return Err(DispatchError::Cleared { lane });
        };
        drop(waiting);

        let _running = Tracked::new(&runtime.in_flight, &self.inner.idle);
        match tokio::time::timeout(runtime.config.timeout(), task).await {
            Ok(Ok(value)) => {
                counters.record_success();
                if let Some(units) = meter(&value) {
                    counters.record_units(units);
                }
                Ok(value)
            }
            Ok(Err(e)) => {
                counters.record_failure();
                Err(DispatchError::Task(e))
            }
            Err(_) => {
                counters.record_timeout();
                tracing::warn!(
                    lane = %lane,
                    timeout_ms = runtime.config.timeout_ms,
                    "Dispatched call timed out"
                );
                Err(DispatchError::Timeout {
                    lane,
                    timeout_ms: runtime.config.timeout_ms,
                })
            }
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        let lanes = self
            .inner
            .lanes
            .iter()
            .map(|runtime| (runtime.lane.as_str().to_string(), runtime.stats()))
            .collect::<BTreeMap<_, _>>();
        self.inner.counters.snapshot(lanes)
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lanes.iter().all(LaneRuntime::is_idle)
    }

    /// Resolves once every lane has nothing queued and nothing running.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Discards every task still waiting for admission in all lanes and
    /// returns how many were waiting. Running tasks are unaffected.
    pub fn clear(&self) -> usize {
        let discarded: usize = self.inner.lanes.iter().map(LaneRuntime::clear).sum();
        tracing::warn!(discarded, "Dispatcher queues cleared");
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaneConfig;
    use std::time::{Duration, Instant};

    fn lane_config(concurrency: usize, rate: u32, timeout_ms: u64) -> LaneConfig {
        LaneConfig {
            concurrency,
            rate_per_interval: rate,
            interval_ms: 1_000,
            timeout_ms,
        }
    }

    #[tokio::test]
    async fn test_interactive_lane_respects_rate_and_concurrency() {
        let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig::default());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let started = Instant::now();
        let calls = (0..20).map(|i| {
            let running = running.clone();
            let peak = peak.clone();
            dispatcher.submit(Lane::Interactive, async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, std::convert::Infallible>(i)
            })
        });
        let results = futures::future::join_all(calls).await;
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        // 10 starts per second: the 11th start waits for the first window to pass
        assert!(elapsed >= Duration::from_millis(1_000), "elapsed {:?}", elapsed);

        let stats = dispatcher.stats();
        assert_eq!(stats.total_calls, 20);
        assert_eq!(stats.successful_calls, 20);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_not_retried() {
        let config = DispatcherConfig {
            normal: lane_config(2, 10, 50),
            ..DispatcherConfig::default()
        };
        let dispatcher = RateLimitedDispatcher::new(&config);
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let result = dispatcher
            .submit(Lane::Normal, async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, String>(())
            })
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::Timeout {
                lane: Lane::Normal,
                timeout_ms: 50
            })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.stats().timed_out_calls, 1);
    }

    #[tokio::test]
    async fn test_task_error_and_metering() {
        let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig::default());

        let failed = dispatcher
            .submit(Lane::Bulk, async { Err::<u64, _>("quota".to_string()) })
            .await;
        assert!(matches!(failed, Err(DispatchError::Task(ref e)) if e == "quota"));

        let tokens = dispatcher
            .submit_metered(
                Lane::Bulk,
                async { Ok::<u64, String>(120) },
                |tokens| Some(*tokens),
            )
            .await
            .unwrap();
        assert_eq!(tokens, 120);

        let stats = dispatcher.stats();
        assert_eq!(stats.failed_calls, 1);
        assert_eq!(stats.successful_calls, 1);
        assert_eq!(stats.consumed_units, 120);
        assert_eq!(stats.success_rate, 50.0);
    }

    #[tokio::test]
    async fn test_bulk_lane_does_not_block_interactive() {
        let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig::default());

        let bulk = dispatcher.clone();
        let slow = tokio::spawn(async move {
            bulk.submit(Lane::Bulk, async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok::<_, String>(())
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        dispatcher
            .submit(Lane::Interactive, async { Ok::<_, String>(()) })
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));

        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_clear_discards_waiting_tasks_only() {
        let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig::default());

        let first = dispatcher.clone();
        let running = tokio::spawn(async move {
            first
                .submit(Lane::Bulk, async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, String>("done")
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let waiting: Vec<_> = (0..3)
            .map(|_| {
                let d = dispatcher.clone();
                tokio::spawn(async move {
                    d.submit(Lane::Bulk, async { Ok::<_, String>("late") }).await
                })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(dispatcher.stats().lanes["bulk"].queued, 3);
        assert_eq!(dispatcher.clear(), 3);

        for handle in waiting {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(DispatchError::Cleared { lane: Lane::Bulk })));
        }
        assert_eq!(running.await.unwrap().unwrap(), "done");
        assert_eq!(dispatcher.stats().cleared_calls, 3);
    }

    #[tokio::test]
    async fn test_drain_waits_for_all_lanes() {
        let dispatcher = RateLimitedDispatcher::new(&DispatcherConfig::default());
        let finished = Arc::new(AtomicUsize::new(0));

        for lane in Lane::ALL {
            let d = dispatcher.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                d.submit(lane, async move {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                })
                .await
            });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        dispatcher.drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(dispatcher.is_idle());
    }
}
