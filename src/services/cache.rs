use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::models::SummaryRecord;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

struct CacheEntry {
    record: SummaryRecord,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Short-lived in-memory projection of the result store.
///
/// Entries expire `ttl` after their last `put`. Expired entries read as
/// absent and are dropped on the next write.
pub struct FreshnessCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl FreshnessCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, video_id: &str) -> Option<SummaryRecord> {
        let now = Instant::now();
        self.read()
            .get(video_id)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.record.clone())
    }

    pub fn exists(&self, video_id: &str) -> bool {
        let now = Instant::now();
        self.read()
            .get(video_id)
            .is_some_and(|entry| entry.is_fresh(now))
    }

    /// Last writer wins.
    pub fn put(&self, video_id: &str, record: SummaryRecord) {
        let now = Instant::now();
        let mut entries = self.write();
        entries.retain(|_, entry| entry.is_fresh(now));
        entries.insert(
            video_id.to_string(),
            CacheEntry {
                record,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Number of entries held, stale ones included until the next write.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
