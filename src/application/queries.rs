//! Read paths served through the cache.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::error::AppError;
use crate::application::repos::{CommentsRepo, ContentRepo};
use crate::application::stores::Stores;
use crate::cache::{CacheKey, CacheStore, InvalidationRegistry, ListQuery, ReadThrough};
use crate::domain::engagement::EngagementTally;
use crate::domain::entities::{CommentRecord, ContentCard, ContentRecord, ListPage};
use crate::domain::error::DomainError;
use crate::domain::types::Collection;

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct ContentQueries {
    content: Arc<dyn ContentRepo>,
    comments: Arc<dyn CommentsRepo>,
    cache: Arc<dyn CacheStore>,
    reader: ReadThrough,
    registry: Arc<InvalidationRegistry>,
}

impl ContentQueries {
    pub fn new(stores: &Stores, reader: ReadThrough, registry: Arc<InvalidationRegistry>) -> Self {
        Self {
            content: stores.content.clone(),
            comments: stores.comments.clone(),
            cache: stores.cache.clone(),
            reader,
            registry,
        }
    }

    /// One page of a list view.
    pub async fn list(
        &self,
        collection: Collection,
        query: ListQuery,
    ) -> Result<ListPage<ContentCard>, AppError> {
        if query.page == 0 {
            return Err(AppError::validation("page starts at 1"));
        }
        if query.page_size == 0 || query.page_size > MAX_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let key = CacheKey::list(collection, query.clone());
        let ttl = self.reader.config().list_ttl();
        self.reader
            .get(&key, ttl, || async {
                let page = self.content.list_content(collection, &query).await?;
                let mut cards = page.map(ContentCard::from);
                if self.registry.lists_render_engagement(collection) {
                    for card in &mut cards.items {
                        card.likes = Some(self.like_count(collection, card.content.id).await);
                    }
                }
                Ok::<_, AppError>(cards)
            })
            .await
    }

    /// A single content row. Missing rows are not cached.
    pub async fn detail(&self, collection: Collection, id: i64) -> Result<ContentRecord, AppError> {
        let key = CacheKey::detail(collection, id);
        let ttl = self.reader.config().detail_ttl();
        self.reader
            .get(&key, ttl, || async {
                let record = self.content.find_content(collection, id).await?;
                record.ok_or_else(|| {
                    AppError::from(DomainError::not_found(collection.namespace(), id))
                })
            })
            .await
    }

    /// Approved comments of a subject, oldest first.
    pub async fn comment_thread(
        &self,
        collection: Collection,
        subject_id: i64,
    ) -> Result<Vec<CommentRecord>, AppError> {
        let key = CacheKey::comment_thread(collection, subject_id);
        let ttl = self.reader.config().thread_ttl();
        self.reader
            .get(&key, ttl, || async {
                let comments: Vec<CommentRecord> = self
                    .comments
                    .list_approved(collection, subject_id)
                    .await?;
                Ok::<_, AppError>(comments)
            })
            .await
    }

    /// Like count shown on list cards. Unreadable tallies render as zero.
    async fn like_count(&self, collection: Collection, id: i64) -> u64 {
        let key = CacheKey::likes(collection, id).to_string();
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<EngagementTally>(&raw) {
                Ok(tally) => tally.count,
                Err(err) => {
                    warn!(key = %key, error = %err, "Malformed like tally; rendering zero");
                    0
                }
            },
            Ok(None) => 0,
            Err(err) => {
                debug!(key = %key, error = %err, "Like tally unavailable; rendering zero");
                0
            }
        }
    }
}
