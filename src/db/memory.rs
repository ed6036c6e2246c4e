use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::db::ResultStore;
use crate::error::StoreError;
use crate::models::SummaryRecord;

/// Process-local [`ResultStore`], for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, SummaryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SummaryRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn get(&self, video_id: &str) -> Result<Option<SummaryRecord>, StoreError> {
        Ok(self.read().get(video_id).cloned())
    }

    async fn insert(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.video_id) {
            return Err(StoreError::AlreadyExists(record.video_id.clone()));
        }
        records.insert(record.video_id.clone(), record.clone());
        Ok(())
    }

    async fn exists(&self, video_id: &str) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(video_id))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SummaryRecord>, StoreError> {
        let mut records: Vec<_> = self.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}
