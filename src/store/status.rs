//! Per-tenant job status persistence.

use std::sync::Arc;

use jiff::Timestamp;
use tokio::sync::Mutex;

use crate::store::snapshot::{JobKey, JobStatusSnapshot, SnapshotPatch};
use crate::store::{StatusBackend, StoreError};

const CANCEL_MARKER: &[u8] = b"1";

/// Snapshot reads and merges over a [`StatusBackend`].
///
/// Failures of the worker-facing operations are logged and swallowed so a
/// flaky store never stalls a job. The cancellation flag lives in its own
/// entry; snapshot merges cannot overwrite an external cancel request.
#[derive(Clone)]
pub struct JobStatusStore {
    backend: Arc<dyn StatusBackend>,
    // Serializes read-merge-write within this process
    write_lock: Arc<Mutex<()>>,
}

impl JobStatusStore {
    pub fn new(backend: Arc<dyn StatusBackend>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn status_key(key: &JobKey) -> String {
        format!("status:{}:{}", key.tenant_id, key.job_type)
    }

    fn cancel_key(key: &JobKey) -> String {
        format!("cancel:{}:{}", key.tenant_id, key.job_type)
    }

    /// Merges `patch` into the stored snapshot, logging on failure.
    pub async fn upsert(&self, key: &JobKey, patch: SnapshotPatch) {
        if let Err(e) = self.try_upsert(key, patch).await {
            tracing::warn!(
                error = %e,
                tenant_id = %key.tenant_id,
                job_type = %key.job_type,
                "Failed to persist job status"
            );
        }
    }

    pub async fn try_upsert(
        &self,
        key: &JobKey,
        patch: SnapshotPatch,
    ) -> Result<JobStatusSnapshot, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = match self.backend.get(&Self::status_key(key)).await? {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                // Merge onto a fresh snapshot so one bad entry cannot block every later write
                tracing::warn!(error = %e, key = %key, "Discarding undecodable job status");
                JobStatusSnapshot::idle()
            }),
            None => JobStatusSnapshot::idle(),
        };
        patch.apply_to(&mut snapshot, Timestamp::now());

        let bytes = serde_json::to_vec(&snapshot)?;
        self.backend.set(&Self::status_key(key), bytes).await?;

        Ok(snapshot)
    }

    /// Latest snapshot, or the idle default on a miss or a store error.
    pub async fn get(&self, key: &JobKey) -> JobStatusSnapshot {
        let mut snapshot = match self.load(key).await {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Failed to read job status");
                JobStatusSnapshot::idle()
            }
        };
        snapshot.cancelled = self.is_cancelled(key).await;
        snapshot
    }

    async fn load(&self, key: &JobKey) -> Result<Option<JobStatusSnapshot>, StoreError> {
        match self.backend.get(&Self::status_key(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads the cancellation flag; a store error reads as "not cancelled".
    pub async fn is_cancelled(&self, key: &JobKey) -> bool {
        match self.backend.get(&Self::cancel_key(key)).await {
            Ok(value) => value.is_some_and(|v| v == CANCEL_MARKER),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Failed to read cancellation flag");
                false
            }
        }
    }

    /// Writes the flag; errors go back to the caller.
    pub async fn set_cancelled(&self, key: &JobKey, cancelled: bool) -> Result<(), StoreError> {
        let cancel_key = Self::cancel_key(key);
        if cancelled {
            self.backend.set(&cancel_key, CANCEL_MARKER.to_vec()).await
        } else {
            self.backend.remove(&cancel_key).await
        }
    }

    pub async fn clear_cancelled(&self, key: &JobKey) {
        if let Err(e) = self.set_cancelled(key, false).await {
            tracing::warn!(error = %e, key = %key, "Failed to clear cancellation flag");
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping().await
    }
}
