//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::ListQuery;
use crate::domain::entities::{CommentRecord, ContentRecord, ListPage, RegistrationRecord};
use crate::domain::types::{CommentStatus, Collection, ContentStatus, DerivedCounter};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Editable fields of a content row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn list_content(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<ListPage<ContentRecord>, RepoError>;

    async fn find_content(
        &self,
        collection: Collection,
        id: i64,
    ) -> Result<Option<ContentRecord>, RepoError>;

    /// Returns `false` when no row matched.
    async fn set_status(
        &self,
        collection: Collection,
        id: i64,
        status: ContentStatus,
    ) -> Result<bool, RepoError>;

    async fn update_content(
        &self,
        collection: Collection,
        id: i64,
        patch: &ContentPatch,
    ) -> Result<bool, RepoError>;

    async fn delete_content(&self, collection: Collection, id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_approved(
        &self,
        collection: Collection,
        subject_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;

    async fn set_comment_status(&self, id: i64, status: CommentStatus) -> Result<bool, RepoError>;

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait RegistrationsRepo: Send + Sync {
    async fn insert_registration(
        &self,
        event_id: i64,
        member_id: i64,
    ) -> Result<RegistrationRecord, RepoError>;
}

/// Access to stored derived counters and the detail records they count.
#[async_trait]
pub trait CounterRepo: Send + Sync {
    /// Every subject row carrying the counter, ascending by id.
    async fn subject_ids(&self, counter: DerivedCounter) -> Result<Vec<i64>, RepoError>;

    /// Stored counter value; `None` when the subject row does not exist.
    async fn stored_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
    ) -> Result<Option<i64>, RepoError>;

    /// Authoritative count of detail records referencing the subject.
    async fn count_details(&self, counter: DerivedCounter, subject_id: i64)
    -> Result<i64, RepoError>;

    /// Single-row update of the stored counter.
    async fn write_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
        value: i64,
    ) -> Result<bool, RepoError>;

    /// Atomic single-row `counter = counter + delta`, never below zero.
    async fn adjust_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
        delta: i64,
    ) -> Result<bool, RepoError>;
}
