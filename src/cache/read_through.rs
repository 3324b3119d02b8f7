//! Read-through accessor over a [`CacheStore`].
//!
//! A cached value is returned when present and well-formed. Otherwise the loader runs and its
//! result is written back with the view's TTL. Cache failures never fail a read: an unreachable
//! store or a corrupt entry is treated as a miss and the loaded value overwrites the entry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::CacheStore;

const METRIC_CACHE_HIT_TOTAL: &str = "socio_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "socio_cache_miss_total";
const METRIC_CACHE_CORRUPT_TOTAL: &str = "socio_cache_corrupt_total";
const METRIC_CACHE_STORE_ERROR_TOTAL: &str = "socio_cache_store_error_total";

/// Read-through accessor shared by the query services.
#[derive(Clone)]
pub struct ReadThrough {
    config: CacheConfig,
    cache: Arc<dyn CacheStore>,
}

impl ReadThrough {
    pub fn new(config: CacheConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self { config, cache }
    }

    /// Return the cached value under `key`, or load, cache and return it.
    ///
    /// Loader errors propagate unchanged and nothing is cached for them.
    pub async fn get<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return loader().await;
        }

        let key = key.to_string();
        let kind = key_kind(&key);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT_TOTAL, "kind" => kind).increment(1);
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    counter!(METRIC_CACHE_CORRUPT_TOTAL, "kind" => kind).increment(1);
                    warn!(key = %key, error = %err, "Corrupt cache entry; reloading");
                }
            },
            Ok(None) => {}
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => "get").increment(1);
                warn!(key = %key, error = %err, "Cache read failed; falling back to loader");
            }
        }

        counter!(METRIC_CACHE_MISS_TOTAL, "kind" => kind).increment(1);
        let value = loader().await?;
        self.store(&key, &value, ttl).await;
        Ok(value)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to serialize value for cache");
                return;
            }
        };

        if let Err(err) = self.cache.put(key, raw, ttl).await {
            counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => "put").increment(1);
            warn!(key = %key, error = %err, "Cache write failed; value served uncached");
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

/// Label for metrics: the view kind segment of a key.
fn key_kind(key: &str) -> &'static str {
    let mut parts = key.split(super::keys::DELIMITER);
    let first = parts.next().unwrap_or_default();
    match (first, parts.next()) {
        ("comentarios", _) => "thread",
        ("likes", _) => "likes",
        ("shares", _) => "shares",
        ("registrations", _) => "registrations",
        (_, Some("list")) => "list",
        (_, Some("detail")) => "detail",
        _ => "other",
    }
}
