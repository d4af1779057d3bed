//! Aggregate call counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub(crate) struct DispatchCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cleared: AtomicU64,
    consumed_units: AtomicU64,
    started_at: Instant,
}

impl DispatchCounters {
    pub(crate) fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            cleared: AtomicU64::new(0),
            consumed_units: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cleared(&self) {
        self.cleared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_units(&self, units: u64) {
        self.consumed_units.fetch_add(units, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, lanes: BTreeMap<String, LaneStats>) -> DispatcherStats {
        let successful = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let timed_out = self.timed_out.load(Ordering::Relaxed);
        let finished = successful + failed + timed_out;

        DispatcherStats {
            total_calls: self.total.load(Ordering::Relaxed),
            successful_calls: successful,
            failed_calls: failed,
            timed_out_calls: timed_out,
            cleared_calls: self.cleared.load(Ordering::Relaxed),
            consumed_units: self.consumed_units.load(Ordering::Relaxed),
            success_rate: if finished == 0 {
                100.0
            } else {
                successful as f64 * 100.0 / finished as f64
            },
            uptime_seconds: self.started_at.elapsed().as_secs(),
            lanes,
        }
    }
}

/// Point-in-time view of one lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaneStats {
    pub in_flight: usize,
    pub queued: usize,
    pub concurrency: usize,
    pub rate_per_interval: u32,
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

/// Dispatcher-wide totals since construction.
///
/// `success_rate` is a percentage of finished calls (successes, failures
/// and timeouts); it reads 100 before any call has finished.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub timed_out_calls: u64,
    pub cleared_calls: u64,
    pub consumed_units: u64,
    pub success_rate: f64,
    pub uptime_seconds: u64,
    pub lanes: BTreeMap<String, LaneStats>,
}
