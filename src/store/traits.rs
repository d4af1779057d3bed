//! StatusBackend trait definition.

use async_trait::async_trait;

use crate::store::StoreError;

/// Raw key-value storage behind [`JobStatusStore`](crate::store::JobStatusStore).
///
/// Backends store opaque bytes; expiry policy is the backend's own concern.
#[async_trait]
pub trait StatusBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Round-trip check used by the readiness check.
    async fn ping(&self) -> Result<(), StoreError>;

    fn name(&self) -> &'static str;
}
