//! Persistence capability.
//!
//! A backend stores [`CacheEntry`] rows by key. `get` applies the TTL predicate
//! (`expires > now`) itself; `upsert` fully replaces any row with the same key.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::cache::CacheEntry;
use crate::error::Result;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the row for `key` only if it is still live at `now`.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>>;

    /// Inserts or replaces the row keyed by `entry.key` in one operation.
    async fn upsert(&self, entry: CacheEntry) -> Result<()>;
}

// == Memory Backend ==
/// HashMap-backed store. Expired rows stay until overwritten.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical rows, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live_at(now))
            .cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::StoredHeaderValue;
    use chrono::Duration;

    fn entry(key: &str, status: u16, expires_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            encoded_body: b"envelope".to_vec(),
            status,
            headers: vec![(
                "content-type".to_string(),
                StoredHeaderValue::Text("application/json".to_string()),
            )],
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_get_live_entry() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        backend.upsert(entry("k1", 200, now + Duration::seconds(10))).await.unwrap();

        let found = backend.get("k1", now).await.unwrap().unwrap();
        assert_eq!(found.status, 200);
    }

    #[tokio::test]
    async fn test_memory_expired_row_is_absent_but_kept() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        backend.upsert(entry("k1", 200, now)).await.unwrap();

        assert!(backend.get("k1", now).await.unwrap().is_none());
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_upsert_replaces() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        backend.upsert(entry("k1", 200, now + Duration::seconds(10))).await.unwrap();
        backend.upsert(entry("k1", 203, now + Duration::seconds(10))).await.unwrap();

        assert_eq!(backend.len().await, 1);
        assert_eq!(backend.get("k1", now).await.unwrap().unwrap().status, 203);
    }

    #[tokio::test]
    async fn test_memory_missing_key() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty().await);
        assert!(backend.get("nope", Utc::now()).await.unwrap().is_none());
    }
}
