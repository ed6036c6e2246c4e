use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::SummaryRecord;

/// Durable summary storage, keyed by video id. The source of truth.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, video_id: &str) -> Result<Option<SummaryRecord>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the video already has a summary.
    async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError>;

    async fn exists(&self, video_id: &str) -> Result<bool, StoreError>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<SummaryRecord>, StoreError>;
}
