//! Cache key definitions.
//!
//! Every cache key is produced here from typed parameters. Callers never format keys by
//! hand, otherwise invalidation would miss the entries they create.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::types::{Collection, ContentStatus};

/// Segment delimiter shared by every key.
pub const DELIMITER: char = ':';

const COMMENTS_NAMESPACE: &str = "comentarios";
const LIKES_NAMESPACE: &str = "likes";
const SHARES_NAMESPACE: &str = "shares";
const REGISTRATIONS_NAMESPACE: &str = "registrations";

/// Ordering applied to a list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListSort {
    /// Storage default ordering (newest first).
    #[default]
    None,
    /// Highest derived counter first.
    Popular,
    /// Most recently published first.
    Recent,
    Title,
}

impl ListSort {
    pub fn as_str(self) -> &'static str {
        match self {
            ListSort::None => "none",
            ListSort::Popular => "popular",
            ListSort::Recent => "recent",
            ListSort::Title => "title",
        }
    }
}

/// Semantic parameters of a list view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
    /// `None` lists every status.
    pub status: Option<ContentStatus>,
    /// `None` lists every category.
    pub category: Option<String>,
    pub sort: ListSort,
    /// One-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl ListQuery {
    pub fn published(page: u32, page_size: u32) -> Self {
        Self {
            status: Some(ContentStatus::Published),
            category: None,
            sort: ListSort::None,
            page,
            page_size,
        }
    }

    pub fn with_status(mut self, status: Option<ContentStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sort(mut self, sort: ListSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Every cache entry the platform writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    List {
        collection: Collection,
        query: ListQuery,
    },
    Detail {
        collection: Collection,
        id: i64,
    },
    CommentThread {
        collection: Collection,
        id: i64,
    },
    Likes {
        collection: Collection,
        id: i64,
    },
    Shares {
        collection: Collection,
        id: i64,
    },
    /// Legacy KV-backed registration list for an event.
    Registrations {
        event_id: i64,
    },
}

impl CacheKey {
    pub fn list(collection: Collection, query: ListQuery) -> Self {
        Self::List { collection, query }
    }

    pub fn detail(collection: Collection, id: i64) -> Self {
        Self::Detail { collection, id }
    }

    pub fn comment_thread(collection: Collection, id: i64) -> Self {
        Self::CommentThread { collection, id }
    }

    pub fn likes(collection: Collection, id: i64) -> Self {
        Self::Likes { collection, id }
    }

    pub fn shares(collection: Collection, id: i64) -> Self {
        Self::Shares { collection, id }
    }

    pub fn registrations(event_id: i64) -> Self {
        Self::Registrations { event_id }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = DELIMITER;
        match self {
            CacheKey::List { collection, query } => write!(
                f,
                "{ns}{d}list{d}{status}{d}{category}{d}{sort}{d}{page}{d}{size}",
                ns = collection.namespace(),
                status = query.status.map_or("all", ContentStatus::as_str),
                category = query
                    .category
                    .as_deref()
                    .map_or_else(|| "all".to_string(), encode_segment),
                sort = query.sort.as_str(),
                page = query.page,
                size = query.page_size,
            ),
            CacheKey::Detail { collection, id } => {
                write!(f, "{}{d}detail{d}{id}", collection.namespace())
            }
            CacheKey::CommentThread { collection, id } => write!(
                f,
                "{COMMENTS_NAMESPACE}{d}{}{d}{id}",
                collection.namespace()
            ),
            CacheKey::Likes { collection, id } => {
                write!(f, "{LIKES_NAMESPACE}{d}{}{d}{id}", collection.namespace())
            }
            CacheKey::Shares { collection, id } => {
                write!(f, "{SHARES_NAMESPACE}{d}{}{d}{id}", collection.namespace())
            }
            CacheKey::Registrations { event_id } => {
                write!(f, "{REGISTRATIONS_NAMESPACE}{d}{event_id}")
            }
        }
    }
}

/// Prefix shared by every list view of a collection.
pub fn list_prefix(collection: Collection) -> String {
    format!("{}{DELIMITER}list{DELIMITER}", collection.namespace())
}

/// Normalize a free-form segment so it can never introduce an extra delimiter.
fn encode_segment(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "all".to_string();
    }
    trimmed
        .chars()
        .map(|c| match c {
            DELIMITER => '_',
            c if c.is_whitespace() => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
