//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::cache::{CacheStore, CacheStoreError};

use super::error::InfraError;

const SCAN_BATCH: usize = 100;

/// Cache store over a multiplexed Redis connection.
///
/// `ConnectionManager` reconnects on its own, so a failed call surfaces as a
/// [`CacheStoreError`] and the next call retries the connection.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(url)
            .map_err(|err| InfraError::cache_backend(format!("invalid redis url: {err}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::cache_backend(format!("redis connect failed: {err}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(CacheStoreError::backend)
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        match expiry_seconds(ttl) {
            Some(seconds) => conn.set_ex::<_, _, ()>(key, value, seconds).await,
            None => conn.set::<_, _, ()>(key, value).await,
        }
        .map_err(CacheStoreError::backend)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(CacheStoreError::backend)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheStoreError> {
        let pattern = format!("{}*", escape_glob(prefix));
        // SCAN instead of KEYS so large keyspaces do not block the server.
        let found = scan_all(|cursor| {
            let mut conn = self.conn.clone();
            let pattern = pattern.clone();
            async move {
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async::<_, (u64, Vec<String>)>(&mut conn)
                    .await
                    .map_err(CacheStoreError::backend)
            }
        })
        .await?;

        debug!(prefix = %prefix, count = found.len(), "Redis prefix scan");
        Ok(found)
    }
}

/// `SET EX` takes whole seconds and rejects zero: partial seconds round up.
fn expiry_seconds(ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| {
        let whole = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        whole.max(1)
    })
}

/// Follow a SCAN cursor until the server returns 0. Keys may repeat across pages.
async fn scan_all<F, Fut>(mut next_page: F) -> Result<Vec<String>, CacheStoreError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<(u64, Vec<String>), CacheStoreError>>,
{
    let mut cursor = 0;
    let mut found = Vec::new();
    loop {
        let (next_cursor, keys) = next_page(cursor).await?;
        found.extend(keys);
        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
