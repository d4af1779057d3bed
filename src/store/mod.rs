//! Job status persistence.
//!
//! [`JobStatusStore`] merges per-tenant [`JobStatusSnapshot`]s over a
//! pluggable [`StatusBackend`]:
//!
//! - `memory` - process-local `DashMap`, the default
//! - `redis` - shared Redis through a bb8 pool, entries expire after `ttl_seconds`
//!
//! ```toml
//! [store]
//! backend = "redis"
//! key_prefix = "batchwork"
//!
//! [store.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 10
//! ttl_seconds = 604800
//! ```

mod error;
mod memory;
mod redis;
pub mod snapshot;
mod status;
mod traits;

use std::sync::Arc;

pub use error::StoreError;
pub use memory::MemoryBackend;
pub use redis::RedisBackend;
pub use snapshot::{
    FailureKind, JobKey, JobProgress, JobStatus, JobStatusSnapshot, ReasonEntry, SnapshotPatch,
};
pub use status::JobStatusStore;
pub use traits::StatusBackend;

use crate::config::{StoreBackend, StoreConfig};

/// Connects the backend selected by `config`.
pub async fn build_backend(config: &StoreConfig) -> Result<Arc<dyn StatusBackend>, StoreError> {
    let backend: Arc<dyn StatusBackend> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryBackend::new()),
        StoreBackend::Redis => Arc::new(RedisBackend::new(&config.redis, &config.key_prefix).await?),
    };

    tracing::info!(backend = backend.name(), "Status store backend ready");
    Ok(backend)
}
