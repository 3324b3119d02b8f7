//! Like and share tallies.
//!
//! The tally under `likes:<ns>:<id>` / `shares:<ns>:<id>` is the authoritative home of these
//! counters. Updates are read-modify-write of the whole value without compare-and-swap, so
//! two concurrent updates of one subject can lose the earlier writer's change.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::stores::Stores;
use crate::cache::{CacheKey, CacheStore, CacheTrigger};
use crate::domain::engagement::{EngagementTally, ToggleOutcome};
use crate::domain::types::Collection;

#[derive(Clone)]
pub struct EngagementService {
    cache: Arc<dyn CacheStore>,
    trigger: Arc<CacheTrigger>,
}

impl EngagementService {
    pub fn new(stores: &Stores, trigger: Arc<CacheTrigger>) -> Self {
        Self {
            cache: stores.cache.clone(),
            trigger,
        }
    }

    /// Add or remove `actor`'s like.
    pub async fn toggle(
        &self,
        collection: Collection,
        subject_id: i64,
        actor: &str,
    ) -> Result<ToggleOutcome, AppError> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(AppError::validation("actor identity is required"));
        }

        let key = CacheKey::likes(collection, subject_id).to_string();
        let mut tally = self.load(&key).await?;
        let outcome = tally.toggle(actor);
        self.save(&key, &tally).await?;

        info!(
            collection = %collection,
            subject_id,
            count = outcome.count,
            did_like = outcome.did_like,
            "Like toggled"
        );
        self.trigger.like_toggled(collection, subject_id).await;

        Ok(outcome)
    }

    /// Record a share and return the new share count.
    pub async fn record_share(
        &self,
        collection: Collection,
        subject_id: i64,
        actor: Option<&str>,
    ) -> Result<u64, AppError> {
        let key = CacheKey::shares(collection, subject_id).to_string();
        let mut tally = self.load(&key).await?;
        let count = tally.record_share(actor.map(str::trim).filter(|a| !a.is_empty()));
        self.save(&key, &tally).await?;

        info!(collection = %collection, subject_id, count, "Share recorded");
        self.trigger.shared(collection, subject_id).await;

        Ok(count)
    }

    /// Like count and whether `actor` currently likes the subject.
    pub async fn likes(
        &self,
        collection: Collection,
        subject_id: i64,
        actor: Option<&str>,
    ) -> Result<ToggleOutcome, AppError> {
        let key = CacheKey::likes(collection, subject_id).to_string();
        let tally = self.load(&key).await?;
        Ok(tally.snapshot_for(actor))
    }

    async fn load(&self, key: &str) -> Result<EngagementTally, AppError> {
        let Some(raw) = self.cache.get(key).await? else {
            return Ok(EngagementTally::default());
        };

        match serde_json::from_str(&raw) {
            Ok(tally) => Ok(tally),
            Err(err) => {
                warn!(key = %key, error = %err, "Malformed engagement tally; starting from empty");
                Ok(EngagementTally::default())
            }
        }
    }

    async fn save(&self, key: &str, tally: &EngagementTally) -> Result<(), AppError> {
        let raw = serde_json::to_string(tally).map_err(crate::cache::CacheStoreError::from)?;
        self.cache.put(key, raw, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheInvalidator, InvalidationRegistry, MemoryCacheStore};

    fn create_service() -> (EngagementService, Arc<MemoryCacheStore>) {
        let cache = Arc::new(MemoryCacheStore::default());
        let config = CacheConfig::default();
        let invalidator = Arc::new(CacheInvalidator::new(
            config.clone(),
            cache.clone(),
            Arc::new(InvalidationRegistry::standard()),
        ));
        let trigger = Arc::new(CacheTrigger::new(config, invalidator));
        let service = EngagementService {
            cache: cache.clone(),
            trigger,
        };
        (service, cache)
    }

    #[tokio::test]
    async fn toggle_alternates_like_state() {
        let (service, cache) = create_service();
        cache
            .put(
                "likes:noticias:42",
                r#"{"count":5,"users":["a","b","c","d","e"]}"#.into(),
                None,
            )
            .await
            .unwrap();

        let first = service.toggle(Collection::News, 42, "a").await.unwrap();
        assert_eq!(first, ToggleOutcome { count: 4, did_like: false });

        let second = service.toggle(Collection::News, 42, "a").await.unwrap();
        assert_eq!(second, ToggleOutcome { count: 5, did_like: true });
    }

    #[tokio::test]
    async fn toggle_clears_detail_and_engagement_lists() {
        let (service, cache) = create_service();
        cache.put("noticias:detail:7", "{}".into(), None).await.unwrap();
        cache
            .put("noticias:list:published:all:none:1:10", "{}".into(), None)
            .await
            .unwrap();

        service.toggle(Collection::News, 7, "socia-1").await.unwrap();

        assert!(cache.get("noticias:detail:7").await.unwrap().is_none());
        assert!(
            cache
                .get("noticias:list:published:all:none:1:10")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn malformed_tally_restarts_from_empty() {
        let (service, cache) = create_service();
        cache.put("likes:eventos:3", "oops".into(), None).await.unwrap();

        let outcome = service.toggle(Collection::Events, 3, "b").await.unwrap();

        assert_eq!(outcome, ToggleOutcome { count: 1, did_like: true });
    }

    #[tokio::test]
    async fn blank_actor_is_rejected() {
        let (service, _cache) = create_service();
        let err = service.toggle(Collection::Events, 3, "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn shares_count_up() {
        let (service, _cache) = create_service();

        service
            .record_share(Collection::Products, 2, Some("x"))
            .await
            .unwrap();
        let count = service
            .record_share(Collection::Products, 2, None)
            .await
            .unwrap();

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn likes_snapshot_reports_actor_state() {
        let (service, _cache) = create_service();
        service.toggle(Collection::News, 1, "ana").await.unwrap();

        let snapshot = service.likes(Collection::News, 1, Some("ana")).await.unwrap();
        let anonymous = service.likes(Collection::News, 1, None).await.unwrap();

        assert_eq!(snapshot, ToggleOutcome { count: 1, did_like: true });
        assert_eq!(anonymous, ToggleOutcome { count: 1, did_like: false });
    }
}
