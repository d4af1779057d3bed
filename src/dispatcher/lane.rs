//! Admission control for a single lane.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Lane;
use super::stats::LaneStats;
use crate::config::LaneConfig;

/// A task is admitted once it holds a concurrency permit (FIFO) and a start
/// slot in the sliding rate window.
pub(crate) struct LaneRuntime {
    pub(crate) lane: Lane,
    pub(crate) config: LaneConfig,
    permits: Semaphore,
    starts: Mutex<VecDeque<Instant>>,
    // Replaced on every clear; waiters holding the old token give up
    generation: Mutex<CancellationToken>,
    pub(crate) queued: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
}

impl LaneRuntime {
    pub(crate) fn new(lane: Lane, config: LaneConfig) -> Self {
        Self {
            lane,
            permits: Semaphore::new(config.concurrency.max(1)),
            starts: Mutex::new(VecDeque::with_capacity(config.rate_per_interval as usize)),
            generation: Mutex::new(CancellationToken::new()),
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            config,
        }
    }

    fn current_generation(&self) -> CancellationToken {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits for a permit and a rate slot. `None` when the lane was cleared first.
    pub(crate) async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        let generation = self.current_generation();

        let permit = tokio::select! {
            biased;
            _ = generation.cancelled() => return None,
            permit = self.permits.acquire() => permit.ok()?,
        };

        while let Some(wait) = self.take_start_slot() {
            tokio::select! {
                biased;
                _ = generation.cancelled() => return None,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Some(permit)
    }

    /// Records a start and returns `None`, or returns how long until the
    /// oldest start leaves the window.
    fn take_start_slot(&self) -> Option<Duration> {
        let window = self.config.interval();
        let limit = self.config.rate_per_interval.max(1) as usize;
        let now = Instant::now();

        let mut starts = self.starts.lock().unwrap_or_else(PoisonError::into_inner);
        while starts
            .front()
            .is_some_and(|start| now.duration_since(*start) >= window)
        {
            starts.pop_front();
        }

        if starts.len() < limit {
            starts.push_back(now);
            return None;
        }

        starts
            .front()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
    }

    /// Cancels every waiter of the current generation and returns how many
    /// were queued at that moment.
    pub(crate) fn clear(&self) -> usize {
        let waiting = self.queued.load(Ordering::SeqCst);
        let previous = {
            let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *generation, CancellationToken::new())
        };
        previous.cancel();
        waiting
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.queued.load(Ordering::SeqCst) == 0 && self.in_flight.load(Ordering::SeqCst) == 0
    }

    pub(crate) fn stats(&self) -> LaneStats {
        LaneStats {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            concurrency: self.config.concurrency,
            rate_per_interval: self.config.rate_per_interval,
            interval_ms: self.config.interval_ms,
            timeout_ms: self.config.timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(concurrency: usize, rate: u32, interval_ms: u64) -> LaneRuntime {
        LaneRuntime::new(
            Lane::Normal,
            LaneConfig {
                concurrency,
                rate_per_interval: rate,
                interval_ms,
                timeout_ms: 1_000,
            },
        )
    }

    #[tokio::test]
    async fn test_rate_window_blocks_after_limit() {
        let runtime = lane(5, 2, 100);

        assert!(runtime.take_start_slot().is_none());
        assert!(runtime.take_start_slot().is_none());
        let wait = runtime.take_start_slot().expect("third start must wait");
        assert!(wait <= Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(runtime.take_start_slot().is_none());
    }

    #[tokio::test]
    async fn test_clear_releases_waiters() {
        let runtime = lane(1, 10, 1_000);
        let held = runtime.admit().await.expect("first admission");

        let cleared = async {
            tokio::task::yield_now().await;
            runtime.clear()
        };
        let (waiter, _) = tokio::join!(runtime.admit(), cleared);

        assert!(waiter.is_none());
        drop(held);
        assert!(runtime.admit().await.is_some());
    }
}
