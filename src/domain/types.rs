//! Shared domain enumerations aligned with persisted database values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Content collections whose list and detail views are cached.
///
/// The namespace doubles as the cache key prefix, so it must stay stable across deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Events,
    News,
    Products,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Events, Collection::News, Collection::Products];

    pub fn namespace(self) -> &'static str {
        match self {
            Collection::Events => "eventos",
            Collection::News => "noticias",
            Collection::Products => "productos",
        }
    }

    /// Backing table in the primary store.
    pub fn table(self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::News => "news",
            Collection::Products => "products",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "eventos" | "events" => Ok(Collection::Events),
            "noticias" | "news" => Ok(Collection::News),
            "productos" | "products" => Ok(Collection::Products),
            other => Err(format!("unknown collection `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
    Archived,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
    Hidden,
}

impl CommentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Pending => "pending",
            CommentStatus::Approved => "approved",
            CommentStatus::Rejected => "rejected",
            CommentStatus::Hidden => "hidden",
        }
    }
}

/// Moderator decision applied to a single comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
    Hide,
}

impl ModerationAction {
    pub fn resulting_status(self) -> CommentStatus {
        match self {
            ModerationAction::Approve => CommentStatus::Approved,
            ModerationAction::Reject => CommentStatus::Rejected,
            ModerationAction::Hide => CommentStatus::Hidden,
        }
    }
}

/// Stored integer defined as a count over detail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedCounter {
    /// `events.current_participants = count(registrations)`.
    Participants,
    /// `news.comment_count = count(approved comments)`.
    Comments,
}

impl DerivedCounter {
    pub const ALL: [DerivedCounter; 2] = [DerivedCounter::Participants, DerivedCounter::Comments];

    pub fn as_str(self) -> &'static str {
        match self {
            DerivedCounter::Participants => "participants",
            DerivedCounter::Comments => "comments",
        }
    }

    /// Collection whose rows carry the counter.
    pub fn collection(self) -> Collection {
        match self {
            DerivedCounter::Participants => Collection::Events,
            DerivedCounter::Comments => Collection::News,
        }
    }

    /// Counter kept on comment parents of `collection`, if any.
    pub fn for_comments(collection: Collection) -> Option<Self> {
        (collection == DerivedCounter::Comments.collection()).then_some(DerivedCounter::Comments)
    }
}

impl fmt::Display for DerivedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivedCounter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "participants" => Ok(DerivedCounter::Participants),
            "comments" => Ok(DerivedCounter::Comments),
            other => Err(format!("unknown counter `{other}`")),
        }
    }
}
