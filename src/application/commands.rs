//! Write paths.
//!
//! Every command writes the primary store first and invalidates only after that write
//! succeeded. A failed write returns before any cache key is touched.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::counters::CountSource;
use crate::application::error::AppError;
use crate::application::repos::{
    CommentsRepo, ContentPatch, ContentRepo, CounterRepo, RegistrationsRepo,
};
use crate::application::stores::Stores;
use crate::cache::{CacheKey, CacheStore, CacheTrigger};
use crate::domain::entities::{CommentRecord, RegistrationRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{
    CommentStatus, Collection, ContentStatus, DerivedCounter, ModerationAction,
};

#[derive(Clone)]
pub struct ContentCommands {
    content: Arc<dyn ContentRepo>,
    comments: Arc<dyn CommentsRepo>,
    counters: Arc<dyn CounterRepo>,
    trigger: Arc<CacheTrigger>,
}

impl ContentCommands {
    pub fn new(stores: &Stores, trigger: Arc<CacheTrigger>) -> Self {
        Self {
            content: stores.content.clone(),
            comments: stores.comments.clone(),
            counters: stores.counters.clone(),
            trigger,
        }
    }

    pub async fn archive(&self, collection: Collection, id: i64) -> Result<(), AppError> {
        self.set_status(collection, id, ContentStatus::Archived).await?;
        self.trigger.archived(collection, id).await;
        Ok(())
    }

    pub async fn unarchive(&self, collection: Collection, id: i64) -> Result<(), AppError> {
        self.set_status(collection, id, ContentStatus::Published).await?;
        self.trigger.unarchived(collection, id).await;
        Ok(())
    }

    pub async fn edit(
        &self,
        collection: Collection,
        id: i64,
        patch: ContentPatch,
    ) -> Result<(), AppError> {
        let patch = normalize_patch(patch)?;
        if !self.content.update_content(collection, id, &patch).await? {
            return Err(DomainError::not_found(collection.namespace(), id).into());
        }

        info!(collection = %collection, id, "Content edited");
        self.trigger.content_edited(collection, id).await;
        Ok(())
    }

    pub async fn delete(&self, collection: Collection, id: i64) -> Result<(), AppError> {
        if !self.content.delete_content(collection, id).await? {
            return Err(DomainError::not_found(collection.namespace(), id).into());
        }

        info!(collection = %collection, id, "Content deleted");
        self.trigger.content_deleted(collection, id).await;
        Ok(())
    }

    /// Apply a moderation decision and return the updated comment.
    pub async fn moderate_comment(
        &self,
        comment_id: i64,
        action: ModerationAction,
    ) -> Result<CommentRecord, AppError> {
        let mut comment = self.find_comment(comment_id).await?;
        let previous = comment.status;
        let next = action.resulting_status();

        if !self.comments.set_comment_status(comment_id, next).await? {
            return Err(DomainError::not_found("comment", comment_id).into());
        }
        comment.status = next;

        let delta = match (previous == CommentStatus::Approved, next == CommentStatus::Approved) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        };
        self.adjust_comment_count(&comment, delta).await;

        info!(
            comment_id,
            collection = %comment.collection,
            subject_id = comment.subject_id,
            status = next.as_str(),
            "Comment moderated"
        );
        self.trigger
            .comment_moderated(comment.collection, comment.subject_id, comment_id, action)
            .await;
        Ok(comment)
    }

    pub async fn delete_comment(&self, comment_id: i64) -> Result<(), AppError> {
        let comment = self.find_comment(comment_id).await?;
        if !self.comments.delete_comment(comment_id).await? {
            return Err(DomainError::not_found("comment", comment_id).into());
        }

        if comment.status == CommentStatus::Approved {
            self.adjust_comment_count(&comment, -1).await;
        }

        info!(comment_id, subject_id = comment.subject_id, "Comment deleted");
        self.trigger
            .comment_deleted(comment.collection, comment.subject_id, comment_id)
            .await;
        Ok(())
    }

    async fn set_status(
        &self,
        collection: Collection,
        id: i64,
        status: ContentStatus,
    ) -> Result<(), AppError> {
        if !self.content.set_status(collection, id, status).await? {
            return Err(DomainError::not_found(collection.namespace(), id).into());
        }
        info!(collection = %collection, id, status = status.as_str(), "Content status changed");
        Ok(())
    }

    async fn find_comment(&self, comment_id: i64) -> Result<CommentRecord, AppError> {
        self.comments
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::not_found("comment", comment_id)))
    }

    /// Optimistic counter update; drift is repaired by the synchronizer.
    async fn adjust_comment_count(&self, comment: &CommentRecord, delta: i64) {
        let Some(counter) = DerivedCounter::for_comments(comment.collection) else {
            return;
        };
        if delta == 0 {
            return;
        }
        if let Err(err) = self
            .counters
            .adjust_count(counter, comment.subject_id, delta)
            .await
        {
            warn!(
                subject_id = comment.subject_id,
                counter = %counter,
                error = %err,
                "Comment counter adjustment failed; left for resync"
            );
        }
    }
}

fn normalize_patch(patch: ContentPatch) -> Result<ContentPatch, AppError> {
    let title = match patch.title {
        Some(title) => {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(DomainError::validation("title must not be empty").into());
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    if title.is_none() && patch.summary.is_none() && patch.category.is_none() {
        return Err(DomainError::validation("edit changes no field").into());
    }

    Ok(ContentPatch {
        title,
        summary: patch.summary.map(|s| s.trim().to_string()),
        category: patch
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    })
}

/// Event registrations with an optimistic participant increment.
#[derive(Clone)]
pub struct RegistrationCommands {
    content: Arc<dyn ContentRepo>,
    registrations: Arc<dyn RegistrationsRepo>,
    counters: Arc<dyn CounterRepo>,
    cache: Arc<dyn CacheStore>,
    trigger: Arc<CacheTrigger>,
    source: CountSource,
}

impl RegistrationCommands {
    pub fn new(stores: &Stores, trigger: Arc<CacheTrigger>, source: CountSource) -> Self {
        Self {
            content: stores.content.clone(),
            registrations: stores.registrations.clone(),
            counters: stores.counters.clone(),
            cache: stores.cache.clone(),
            trigger,
            source,
        }
    }

    pub async fn register(
        &self,
        event_id: i64,
        member_id: i64,
    ) -> Result<RegistrationRecord, AppError> {
        let event = self
            .content
            .find_content(Collection::Events, event_id)
            .await?
            .ok_or_else(|| AppError::from(DomainError::not_found("event", event_id)))?;

        if event.status != ContentStatus::Published {
            return Err(DomainError::validation("registrations are closed for this event").into());
        }
        if let (Some(capacity), Some(current)) = (event.capacity, event.current_participants)
            && current >= capacity
        {
            return Err(DomainError::validation("event is full").into());
        }

        let record = self
            .registrations
            .insert_registration(event_id, member_id)
            .await?;

        if let Err(err) = self
            .counters
            .adjust_count(DerivedCounter::Participants, event_id, 1)
            .await
        {
            warn!(event_id, error = %err, "Participant increment failed; left for resync");
        }
        if self.source == CountSource::LegacyList {
            self.append_legacy(event_id, member_id).await;
        }

        info!(event_id, member_id, registration_id = record.id, "Member registered");
        self.trigger
            .counter_bumped(Collection::Events, event_id)
            .await;
        Ok(record)
    }

    /// Keep the KV-backed registration list in step when it is the count source.
    async fn append_legacy(&self, event_id: i64, member_id: i64) {
        let key = CacheKey::registrations(event_id).to_string();
        let mut members: Vec<i64> = match self.cache.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(key = %key, error = %err, "Malformed registration list; rebuilding");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(key = %key, error = %err, "Registration list unavailable; skipped");
                return;
            }
        };
        if members.contains(&member_id) {
            return;
        }
        members.push(member_id);

        let raw = match serde_json::to_string(&members) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %key, error = %err, "Registration list not serializable");
                return;
            }
        };
        if let Err(err) = self.cache.put(&key, raw, None).await {
            warn!(key = %key, error = %err, "Registration list write failed");
        }
    }
}
