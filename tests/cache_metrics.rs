mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use socio::cache::{
    CacheConfig, CacheKey, CacheStore, CacheStoreError, ListQuery, MemoryCacheStore, ReadThrough,
};
use socio::domain::types::{Collection, DerivedCounter};

use support::{Harness, event};

struct UnreachableCache;

#[async_trait]
impl CacheStore for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheStoreError> {
        Err(CacheStoreError::backend("connection refused"))
    }

    async fn put(
        &self,
        _key: &str,
        _value: String,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::backend("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheStoreError> {
        Err(CacheStoreError::backend("connection refused"))
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<String>, CacheStoreError> {
        Err(CacheStoreError::backend("connection refused"))
    }
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Read-through miss, hit and corrupt entry
    let harness = Harness::new();
    harness
        .repos
        .insert_content(Collection::Events, event(1, "Asamblea", 0));
    let queries = &harness.services.queries;
    queries
        .list(Collection::Events, ListQuery::published(1, 12))
        .await
        .expect("miss");
    queries
        .list(Collection::Events, ListQuery::published(1, 12))
        .await
        .expect("hit");
    harness
        .seed_cache(&CacheKey::detail(Collection::Events, 1).to_string(), "not json")
        .await;
    queries
        .detail(Collection::Events, 1)
        .await
        .expect("corrupt entry reloads");

    // Unreachable cache store
    let reader = ReadThrough::new(CacheConfig::default(), Arc::new(UnreachableCache));
    let value = reader
        .get(&CacheKey::detail(Collection::News, 3), None, || async {
            Ok::<_, std::convert::Infallible>(3_u32)
        })
        .await
        .expect("loader result");
    assert_eq!(value, 3);

    // LRU eviction
    let small = MemoryCacheStore::new(&CacheConfig {
        memory_capacity: 1,
        ..CacheConfig::default()
    });
    small
        .put("a", "1".to_string(), Some(Duration::from_secs(60)))
        .await
        .expect("first put");
    small
        .put("b", "2".to_string(), Some(Duration::from_secs(60)))
        .await
        .expect("second put evicts");

    // Invalidation and counter resync
    harness
        .services
        .commands
        .archive(Collection::Events, 1)
        .await
        .expect("archive");
    harness
        .services
        .counters
        .resync(DerivedCounter::Participants, None)
        .await
        .expect("resync");

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "socio_cache_hit_total",
        "socio_cache_miss_total",
        "socio_cache_corrupt_total",
        "socio_cache_store_error_total",
        "socio_cache_evict_total",
        "socio_cache_invalidated_keys_total",
        "socio_cache_invalidate_ms",
        "socio_counter_resync_ms",
    ] {
        assert!(names.contains(expected), "missing metric `{expected}`");
    }
}
