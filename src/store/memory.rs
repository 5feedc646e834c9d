//! In-process session backend
//!
//! Volatile and cleared on restart. Uses Moka for concurrent access with a
//! per-entry time-to-live. Only valid when a single instance serves all
//! requests.

use moka::future::Cache;
use std::time::Duration;

pub struct MemoryBackend {
    entries: Cache<String, Vec<u8>>,
}

impl MemoryBackend {
    /// Create a backend whose entries expire `ttl` after their last write
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder().time_to_live(ttl).build();
        Self { entries }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).await
    }

    pub async fn set(&self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_string(), value).await;
    }

    /// Remove and return in one step
    pub async fn take(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(key).await
    }

    pub async fn remove(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}
