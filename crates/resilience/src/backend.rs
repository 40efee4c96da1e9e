//! Cache storage backends.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::CacheError;

/// A single cached value with its expiry and invalidation tags.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// Cached payload.
    pub value: Value,
    /// When the entry was written.
    pub created_at: Instant,
    /// Time to live; `None` never expires.
    pub ttl: Option<Duration>,
    /// Tags the entry can be invalidated by.
    pub tags: HashSet<String>,
}

impl CacheEntry {
    /// Whether the entry is past its TTL at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.created_at) >= ttl,
            None => false,
        }
    }
}

/// Storage behind a [`Cache`](crate::Cache).
///
/// Implementations may be in-process or remote; the cache only relies on
/// this contract. Concurrent writers to the same key race last-write-wins.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Write a value, replacing any previous entry for the key.
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &[String],
    ) -> Result<(), CacheError>;

    /// Remove one key. Returns whether an entry was present.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry carrying `tag`. Returns how many were removed.
    async fn invalidate(&self, tag: &str) -> Result<usize, CacheError>;

    /// Drop expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;

    /// Number of stored entries, expired or not.
    async fn len(&self) -> usize;
}

/// Default maximum entries before eviction.
const DEFAULT_MAX_ENTRIES: usize = 5000;

/// In-process backend on a sharded concurrent map.
///
/// Writers to different keys contend only when they land on the same shard.
/// When the entry count exceeds `max_entries`, expired entries are dropped
/// first, then the oldest entries.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl MemoryBackend {
    /// Create a backend bounded to `max_entries`.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Snapshot of an entry, including expired ones.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn evict_if_needed(&self) {
        if self.entries.len() <= self.max_entries {
            return;
        }

        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().created_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    trace!("Evicting cache entry {}", key);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &[String],
    ) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value,
                created_at: Instant::now(),
                ttl,
                tags: tags.iter().cloned().collect(),
            },
        );
        self.evict_if_needed();
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn invalidate(&self, tag: &str) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.tags.contains(tag));
        let removed = before.saturating_sub(self.entries.len());
        debug!("Invalidated {} cache entries tagged '{}'", removed, tag);
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_ttl() {
        let backend = MemoryBackend::new(10);
        backend
            .set("k", json!(1), Some(Duration::from_secs(5)), &[])
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!(1)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert_eq!(backend.len().await, 0);
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let backend = MemoryBackend::new(10);
        backend.set("k", json!("v"), None, &[]).await.unwrap();
        assert!(!backend.entry("k").unwrap().is_expired(Instant::now() + Duration::from_secs(86_400)));
    }

    #[tokio::test]
    async fn test_invalidate_by_tag() {
        let backend = MemoryBackend::new(10);
        backend.set("price:BTC", json!(1), None, &tags(&["price", "symbol:BTC"])).await.unwrap();
        backend.set("price:ETH", json!(2), None, &tags(&["price", "symbol:ETH"])).await.unwrap();
        backend.set("alerts:bob", json!(3), None, &tags(&["alerts"])).await.unwrap();

        assert_eq!(backend.invalidate("symbol:BTC").await.unwrap(), 1);
        assert_eq!(backend.invalidate("price").await.unwrap(), 1);
        assert_eq!(backend.len().await, 1);
        assert!(backend.get("alerts:bob").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_oldest_when_full() {
        let backend = MemoryBackend::new(2);
        backend.set("a", json!(1), None, &[]).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        backend.set("b", json!(2), None, &[]).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        backend.set("c", json!(3), None, &[]).await.unwrap();

        assert_eq!(backend.len().await, 2);
        assert!(backend.get("a").await.unwrap().is_none());
        assert!(backend.get("c").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let backend = MemoryBackend::new(10);
        backend.set("short", json!(1), Some(Duration::from_secs(1)), &[]).await.unwrap();
        backend.set("long", json!(2), Some(Duration::from_secs(60)), &[]).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        assert_eq!(backend.len().await, 1);
    }
}
