//! Mutation events.
//!
//! A mutation event describes one committed change. It is built inside a write path right
//! after the primary-store write succeeded, handed to the invalidator, and dropped. Events are
//! never queued or persisted.

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{Collection, ModerationAction};

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A like was added or removed on the subject.
    LikeToggle,
    /// The subject was shared.
    Share,
    /// A comment under the subject was moderated.
    CommentModerate {
        comment_id: i64,
        action: ModerationAction,
    },
    /// A comment under the subject was deleted.
    CommentDelete { comment_id: i64 },
    Archive,
    Unarchive,
    ContentEdit,
    ContentDelete,
    /// A derived counter was optimistically incremented at write time.
    CounterBump,
    /// A derived counter was rewritten by the synchronizer.
    CounterResync,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::LikeToggle => "like_toggle",
            MutationKind::Share => "share",
            MutationKind::CommentModerate { .. } => "comment_moderate",
            MutationKind::CommentDelete { .. } => "comment_delete",
            MutationKind::Archive => "archive",
            MutationKind::Unarchive => "unarchive",
            MutationKind::ContentEdit => "content_edit",
            MutationKind::ContentDelete => "content_delete",
            MutationKind::CounterBump => "counter_bump",
            MutationKind::CounterResync => "counter_resync",
        }
    }

    /// Whether the change can alter membership or ordering of list views.
    pub fn affects_list_membership(self) -> bool {
        matches!(
            self,
            MutationKind::Archive
                | MutationKind::Unarchive
                | MutationKind::ContentEdit
                | MutationKind::ContentDelete
                | MutationKind::CounterBump
                | MutationKind::CounterResync
        )
    }

    /// Whether only an engagement counter changed.
    pub fn is_engagement(self) -> bool {
        matches!(self, MutationKind::LikeToggle | MutationKind::Share)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed change to one subject of a collection.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    /// Unique identifier, used to merge duplicate events into one plan.
    pub id: Uuid,
    pub kind: MutationKind,
    pub collection: Collection,
    pub subject_id: i64,
    pub timestamp: OffsetDateTime,
}

impl MutationEvent {
    pub fn new(kind: MutationKind, collection: Collection, subject_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            collection,
            subject_id,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_creation() {
        let event = MutationEvent::new(MutationKind::Archive, Collection::Events, 12);

        assert_eq!(event.kind, MutationKind::Archive);
        assert_eq!(event.collection, Collection::Events);
        assert_eq!(event.subject_id, 12);
        assert!(!event.id.is_nil());
    }

    #[test]
    fn events_get_distinct_ids() {
        let a = MutationEvent::new(MutationKind::Share, Collection::News, 1);
        let b = MutationEvent::new(MutationKind::Share, Collection::News, 1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn list_affecting_kinds() {
        assert!(MutationKind::Archive.affects_list_membership());
        assert!(MutationKind::ContentEdit.affects_list_membership());
        assert!(!MutationKind::LikeToggle.affects_list_membership());
        assert!(!MutationKind::CommentDelete { comment_id: 1 }.affects_list_membership());
    }

    #[test]
    fn kind_names_are_stable() {
        let kind = MutationKind::CommentModerate {
            comment_id: 3,
            action: ModerationAction::Approve,
        };
        assert_eq!(kind.to_string(), "comment_moderate");
    }
}
