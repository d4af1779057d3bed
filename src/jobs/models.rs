use std::collections::{HashSet, VecDeque};

use jiff::Timestamp;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::{ItemOutcome, Processing, WorkItem};
use crate::store::{JobKey, JobStatus, JobStatusSnapshot, ReasonEntry};

/// Keeps the newest `capacity` reasons.
#[derive(Debug, Clone)]
pub struct ReasonLog {
    capacity: usize,
    entries: VecDeque<ReasonEntry>,
}

impl ReasonLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item_id: impl Into<String>, reason: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ReasonEntry {
            item_id: item_id.into(),
            reason: reason.into(),
        });
    }

    /// Drops entries for items that are going to be attempted again.
    pub fn forget(&mut self, item_ids: &HashSet<&str>) {
        self.entries.retain(|e| !item_ids.contains(e.item_id.as_str()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ReasonEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Success(_) => self.successful += 1,
            ItemOutcome::Skipped(_) => self.skipped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Rolls back the failed tally before failed items are attempted again.
    pub fn rollback_failed(&mut self) -> usize {
        let failed = self.failed;
        self.processed -= failed;
        self.failed = 0;
        failed
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed * 100) / self.total).min(100) as u8
    }
}

/// A queued or running job. Only the worker mutates it once enqueued.
pub struct Job {
    pub id: Uuid,
    pub key: JobKey,
    pub items: Vec<WorkItem>,
    pub processing: Processing,
    pub attempt: u32,
    pub max_attempts: u32,
    pub counters: JobCounters,
    pub skip_log: ReasonLog,
    pub fail_log: ReasonLog,
    pub queued_at: Timestamp,
    /// Wall clock of the first attempt's start
    pub started_at: Option<Timestamp>,
    pub started: Option<tokio::time::Instant>,
}

impl Job {
    pub fn new(
        key: JobKey,
        items: Vec<WorkItem>,
        processing: Processing,
        max_attempts: u32,
        reason_log_capacity: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            counters: JobCounters::new(items.len()),
            key,
            items,
            processing,
            attempt: 1,
            max_attempts,
            skip_log: ReasonLog::new(reason_log_capacity),
            fail_log: ReasonLog::new(reason_log_capacity),
            queued_at: Timestamp::now(),
            started_at: None,
            started: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// View reported while the job waits at `position` (1-based).
    pub fn queued_view(&self, position: usize) -> JobStatusSnapshot {
        JobStatusSnapshot {
            in_progress: true,
            status: JobStatus::Queued,
            message: Some(format!("Queued at position {}", position)),
            job_id: Some(self.id),
            total_items: self.counters.total,
            processed_items: self.counters.processed,
            successful_items: self.counters.successful,
            failed_items: self.counters.failed,
            skipped_items: self.counters.skipped,
            skip_reasons: self.skip_log.to_vec(),
            fail_reasons: self.fail_log.to_vec(),
            attempt: self.attempt,
            queued_at: Some(self.queued_at),
            started_at: self.started_at,
            position: Some(position),
            ..JobStatusSnapshot::idle()
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub accepted: bool,
    #[schema(value_type = String, format = Uuid)]
    pub job_id: Uuid,
    /// 1-based position in the pending queue; 0 while processing
    pub queue_position: usize,
    pub total_items: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJobSummary {
    #[schema(value_type = String, format = Uuid)]
    pub job_id: Uuid,
    pub key: JobKey,
    pub attempt: u32,
    pub processed_items: usize,
    pub total_items: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueOverview {
    pub pending: usize,
    pub pending_keys: Vec<JobKey>,
    pub active: Option<ActiveJobSummary>,
}
