//! Cache invalidator for executing invalidation plans.
//!
//! Deletion failures are logged and swallowed: there is no retry queue and the entry still
//! expires through its TTL.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::events::MutationEvent;
use super::planner::InvalidationPlan;
use super::registry::InvalidationRegistry;
use super::store::CacheStore;
use crate::domain::types::Collection;

const METRIC_CACHE_INVALIDATE_MS: &str = "socio_cache_invalidate_ms";
const METRIC_CACHE_INVALIDATED_KEYS_TOTAL: &str = "socio_cache_invalidated_keys_total";
const METRIC_CACHE_STORE_ERROR_TOTAL: &str = "socio_cache_store_error_total";

/// Outcome of one executed plan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationOutcome {
    pub deleted: usize,
    pub failed: usize,
}

/// Turns mutation events into cache deletions.
///
/// The invalidator:
/// 1. Builds a plan from the events and the registry
/// 2. Expands sweep prefixes by listing the cache store
/// 3. Deletes every planned key concurrently
pub struct CacheInvalidator {
    config: CacheConfig,
    cache: Arc<dyn CacheStore>,
    registry: Arc<InvalidationRegistry>,
}

impl CacheInvalidator {
    pub fn new(
        config: CacheConfig,
        cache: Arc<dyn CacheStore>,
        registry: Arc<InvalidationRegistry>,
    ) -> Self {
        Self {
            config,
            cache,
            registry,
        }
    }

    /// Invalidate everything a single committed mutation stales.
    #[instrument(skip(self, event), fields(event_kind = %event.kind, collection = %event.collection, subject_id = event.subject_id))]
    pub async fn invalidate(&self, event: &MutationEvent) -> InvalidationOutcome {
        let plan = self.plan(std::slice::from_ref(event));
        self.execute(plan).await
    }

    /// Build the plan for a batch of events without executing it.
    pub fn plan(&self, events: &[MutationEvent]) -> InvalidationPlan {
        InvalidationPlan::from_events(&self.registry, events, self.config.sweep_list_prefix)
    }

    /// Add every well-known list view of `collection` to `plan`.
    pub fn include_lists(&self, plan: &mut InvalidationPlan, collection: Collection) {
        plan.include_lists(&self.registry, collection, self.config.sweep_list_prefix);
    }

    /// Execute a plan against the cache store.
    pub async fn execute(&self, plan: InvalidationPlan) -> InvalidationOutcome {
        if plan.is_empty() {
            return InvalidationOutcome::default();
        }

        let started_at = Instant::now();
        info!(
            plan = %plan,
            registry_version = self.registry.version(),
            "Cache invalidation starting"
        );

        let InvalidationPlan {
            mut keys,
            sweep_prefixes,
            ..
        } = plan;

        for prefix in &sweep_prefixes {
            match self.cache.list(prefix).await {
                Ok(found) => {
                    debug!(prefix = %prefix, count = found.len(), "Sweeping cache prefix");
                    keys.extend(found);
                }
                Err(err) => {
                    counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => "list").increment(1);
                    warn!(prefix = %prefix, error = %err, "Cache prefix listing failed; sweep skipped");
                }
            }
        }

        let results = join_all(keys.iter().map(|key| async move {
            let result = self.cache.delete(key).await;
            (key, result)
        }))
        .await;

        let mut outcome = InvalidationOutcome::default();
        for (key, result) in results {
            match result {
                Ok(()) => outcome.deleted += 1,
                Err(err) => {
                    outcome.failed += 1;
                    counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => "delete").increment(1);
                    warn!(
                        key = %key,
                        error = %err,
                        "Cache delete failed; entry left to expire by TTL"
                    );
                }
            }
        }

        counter!(METRIC_CACHE_INVALIDATED_KEYS_TOTAL).increment(outcome.deleted as u64);
        histogram!(METRIC_CACHE_INVALIDATE_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        info!(
            deleted = outcome.deleted,
            failed = outcome.failed,
            "Cache invalidation complete"
        );

        outcome
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<InvalidationRegistry> {
        &self.registry
    }
}
