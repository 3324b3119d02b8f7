//! Cache store seam and the in-process implementation.
//!
//! The cache store is a plain key-value store with optional per-key TTL. It offers no
//! transactions, no multi-key atomicity and no compare-and-swap; callers must not rely on any.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const METRIC_CACHE_EVICT_TOTAL: &str = "socio_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache value could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheStoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key-value cache with per-key TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    /// Store `value` under `key`. `None` keeps the entry until it is deleted or evicted.
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError>;

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError>;

    /// Keys currently stored under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheStoreError>;
}

#[derive(Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Entries are split by lifetime: expiring views share the bounded LRU, entries stored
/// without a TTL live until deleted and are never evicted.
#[derive(Debug)]
struct Entries {
    expiring: LruCache<String, StoredValue>,
    pinned: HashMap<String, String>,
}

/// In-process cache store with LRU eviction and lazy TTL expiry.
///
/// Expired entries are never returned; they are dropped on the next access or listing.
/// Capacity bounds only the entries stored with a TTL.
pub struct MemoryCacheStore {
    entries: RwLock<Entries>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(Entries {
                expiring: LruCache::new(config.memory_capacity_non_zero()),
                pinned: HashMap::new(),
            }),
        }
    }

    /// Number of stored entries, including expired ones not yet collected.
    pub fn len(&self) -> usize {
        let entries = rw_read(&self.entries, "len");
        entries.expiring.len() + entries.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, "get");
        if let Some(value) = entries.pinned.get(key) {
            return Ok(Some(value.clone()));
        }
        let expired = match entries.expiring.get(key) {
            Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.expiring.pop(key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        let mut entries = rw_write(&self.entries, "put");
        let Some(ttl) = ttl else {
            entries.expiring.pop(key);
            entries.pinned.insert(key.to_string(), value);
            return Ok(());
        };

        entries.pinned.remove(key);
        let stored = StoredValue {
            value,
            expires_at: Some(Instant::now() + ttl),
        };
        let evicted = entries.expiring.push(key.to_string(), stored);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut entries = rw_write(&self.entries, "delete");
        entries.expiring.pop(key);
        entries.pinned.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheStoreError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, "list");
        let mut live: Vec<String> = entries
            .pinned
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        let mut expired = Vec::new();
        for (key, stored) in entries.expiring.iter() {
            if !key.starts_with(prefix) {
                continue;
            }
            if stored.is_expired(now) {
                expired.push(key.clone());
            } else {
                live.push(key.clone());
            }
        }
        for key in expired {
            entries.expiring.pop(&key);
        }
        live.sort();
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let store = MemoryCacheStore::default();

        assert!(store.get("eventos:detail:1").await.unwrap().is_none());

        store
            .put("eventos:detail:1", "{\"id\":1}".to_string(), None)
            .await
            .unwrap();
        assert_eq!(
            store.get("eventos:detail:1").await.unwrap().as_deref(),
            Some("{\"id\":1}")
        );

        store.delete("eventos:detail:1").await.unwrap();
        assert!(store.get("eventos:detail:1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryCacheStore::default();
        store
            .put("k", "v".to_string(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn list_filters_prefix_and_expired() {
        let store = MemoryCacheStore::default();
        store
            .put("eventos:list:a", "1".to_string(), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        store
            .put("eventos:list:b", "1".to_string(), None)
            .await
            .unwrap();
        store
            .put("eventos:detail:1", "1".to_string(), None)
            .await
            .unwrap();

        assert_eq!(
            store.list("eventos:list:").await.unwrap(),
            vec!["eventos:list:a".to_string(), "eventos:list:b".to_string()]
        );

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            store.list("eventos:list:").await.unwrap(),
            vec!["eventos:list:b".to_string()]
        );
    }

    #[tokio::test]
    async fn lru_eviction_drops_oldest() {
        let config = CacheConfig {
            memory_capacity: 2,
            ..Default::default()
        };
        let store = MemoryCacheStore::new(&config);
        let ttl = Some(Duration::from_secs(60));

        store.put("a", "1".to_string(), ttl).await.unwrap();
        store.put("b", "2".to_string(), ttl).await.unwrap();
        store.put("c", "3".to_string(), ttl).await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn entries_without_ttl_survive_eviction() {
        let config = CacheConfig {
            memory_capacity: 2,
            ..Default::default()
        };
        let store = MemoryCacheStore::new(&config);
        let ttl = Some(Duration::from_secs(60));

        store
            .put("likes:noticias:1", "{\"count\":1}".to_string(), None)
            .await
            .unwrap();
        for id in 0..5 {
            store
                .put(&format!("noticias:detail:{id}"), "{}".to_string(), ttl)
                .await
                .unwrap();
        }

        assert_eq!(
            store.get("likes:noticias:1").await.unwrap().as_deref(),
            Some("{\"count\":1}")
        );
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn rewriting_with_ttl_moves_entry_into_lru() {
        let store = MemoryCacheStore::default();

        store.put("k", "pinned".to_string(), None).await.unwrap();
        store
            .put("k", "expiring".to_string(), Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("expiring"));
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = MemoryCacheStore::default();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.put("k", "v".to_string(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
