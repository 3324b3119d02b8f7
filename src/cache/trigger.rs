//! Cache trigger service.
//!
//! Write paths call the trigger after their primary-store write committed. Invalidation runs
//! inline, so the next read after the write observes fresh data.

use std::sync::Arc;

use tracing::debug;

use super::config::CacheConfig;
use super::events::{MutationEvent, MutationKind};
use super::invalidator::{CacheInvalidator, InvalidationOutcome};
use crate::domain::types::{Collection, ModerationAction};

/// Cache trigger for invalidating derived state after writes.
///
/// # Usage
///
/// ```ignore
/// // After a successful archive:
/// trigger.archived(Collection::Events, event_id).await;
/// ```
pub struct CacheTrigger {
    config: CacheConfig,
    invalidator: Arc<CacheInvalidator>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, invalidator: Arc<CacheInvalidator>) -> Self {
        Self {
            config,
            invalidator,
        }
    }

    /// Invalidate for one mutation.
    pub async fn trigger(
        &self,
        kind: MutationKind,
        collection: Collection,
        subject_id: i64,
    ) -> InvalidationOutcome {
        if !self.config.enabled {
            debug!(event_kind = %kind, "Cache trigger skipped: cache disabled");
            return InvalidationOutcome::default();
        }

        let event = MutationEvent::new(kind, collection, subject_id);
        self.invalidator.invalidate(&event).await
    }

    /// Invalidate for a batch of mutations as one plan.
    pub async fn trigger_batch(&self, events: &[MutationEvent]) -> InvalidationOutcome {
        if !self.config.enabled || events.is_empty() {
            return InvalidationOutcome::default();
        }

        let plan = self.invalidator.plan(events);
        self.invalidator.execute(plan).await
    }

    /// Invalidate after a counter resync: the collection's lists once, plus the detail of
    /// every subject whose counter changed.
    pub async fn counters_resynced(
        &self,
        collection: Collection,
        changed: &[i64],
    ) -> InvalidationOutcome {
        if !self.config.enabled {
            return InvalidationOutcome::default();
        }

        let events: Vec<MutationEvent> = changed
            .iter()
            .map(|id| MutationEvent::new(MutationKind::CounterResync, collection, *id))
            .collect();
        let mut plan = self.invalidator.plan(&events);
        self.invalidator.include_lists(&mut plan, collection);
        self.invalidator.execute(plan).await
    }

    pub async fn like_toggled(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::LikeToggle, collection, subject_id)
            .await;
    }

    pub async fn shared(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::Share, collection, subject_id)
            .await;
    }

    pub async fn comment_moderated(
        &self,
        collection: Collection,
        subject_id: i64,
        comment_id: i64,
        action: ModerationAction,
    ) {
        self.trigger(
            MutationKind::CommentModerate { comment_id, action },
            collection,
            subject_id,
        )
        .await;
    }

    pub async fn comment_deleted(&self, collection: Collection, subject_id: i64, comment_id: i64) {
        self.trigger(
            MutationKind::CommentDelete { comment_id },
            collection,
            subject_id,
        )
        .await;
    }

    pub async fn archived(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::Archive, collection, subject_id)
            .await;
    }

    pub async fn unarchived(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::Unarchive, collection, subject_id)
            .await;
    }

    pub async fn content_edited(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::ContentEdit, collection, subject_id)
            .await;
    }

    pub async fn content_deleted(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::ContentDelete, collection, subject_id)
            .await;
    }

    pub async fn counter_bumped(&self, collection: Collection, subject_id: i64) {
        self.trigger(MutationKind::CounterBump, collection, subject_id)
            .await;
    }
}
