use anyhow::Result;
use async_trait::async_trait;
use shared::record::Record;

/// Backing store a screen controller commits to.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    async fn list(&self) -> Result<Vec<R>>;
    /// Persists `record` and returns the key the store assigned to it.
    async fn insert(&self, record: R) -> Result<R::Key>;
    async fn update(&self, key: R::Key, patch: R::Patch) -> Result<()>;
    async fn delete(&self, key: R::Key) -> Result<()>;
}
