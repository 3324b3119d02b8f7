//! Store handles shared by every service.
//!
//! [`PrimaryStore`] is the raw statement interface of the authoritative relational store; the
//! typed repositories are built on top of it. [`Stores`] bundles the handles so services are
//! wired by constructor injection.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::repos::{
    CommentsRepo, ContentRepo, CounterRepo, RegistrationsRepo, RepoError,
};
use crate::cache::CacheStore;

/// A result row, decoded as a JSON object keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Positional statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlParam::Null, Into::into)
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub changed: u64,
    /// Id of the last row returned by `RETURNING id`, when present.
    pub last_id: Option<i64>,
}

/// Authoritative relational store. Each call is a single statement; no cross-statement
/// transaction is exposed.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, RepoError>;

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<ExecOutcome, RepoError>;

    async fn first(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Row>, RepoError> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }
}

/// Primary-store repositories plus the cache store.
#[derive(Clone)]
pub struct Stores {
    pub content: Arc<dyn ContentRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub registrations: Arc<dyn RegistrationsRepo>,
    pub counters: Arc<dyn CounterRepo>,
    pub cache: Arc<dyn CacheStore>,
}

impl Stores {
    /// Use one repository implementation for every primary-store seam.
    pub fn from_repositories<R>(repos: Arc<R>, cache: Arc<dyn CacheStore>) -> Self
    where
        R: ContentRepo + CommentsRepo + RegistrationsRepo + CounterRepo + 'static,
    {
        Self {
            content: repos.clone(),
            comments: repos.clone(),
            registrations: repos.clone(),
            counters: repos,
            cache,
        }
    }
}
