//! Engagement tallies (likes and shares).
//!
//! A tally is a per-actor membership set plus a counter, stored as a single JSON value in
//! the cache store, which is its only home. Writers read the whole value, modify it and write
//! it back without compare-and-swap, so the last writer wins: two actors toggling the same
//! subject at once can lose one membership change. Engagement numbers are not business data
//! and this loss is accepted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Serialized shape: `{"count": 5, "users": ["a", "b", "c", "d", "e"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementTally {
    pub count: u64,
    #[serde(default)]
    pub users: BTreeSet<String>,
}

/// Result of a like toggle as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub count: u64,
    pub did_like: bool,
}

impl EngagementTally {
    pub fn from_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users: BTreeSet<String> = users.into_iter().map(Into::into).collect();
        Self {
            count: users.len() as u64,
            users,
        }
    }

    /// Flip the actor's membership and adjust the counter accordingly.
    pub fn toggle(&mut self, actor: &str) -> ToggleOutcome {
        if self.users.remove(actor) {
            self.count = self.count.saturating_sub(1);
            ToggleOutcome {
                count: self.count,
                did_like: false,
            }
        } else {
            self.users.insert(actor.to_string());
            self.count += 1;
            ToggleOutcome {
                count: self.count,
                did_like: true,
            }
        }
    }

    /// Shares only grow. Anonymous shares bump the counter without touching the set.
    pub fn record_share(&mut self, actor: Option<&str>) -> u64 {
        if let Some(actor) = actor {
            self.users.insert(actor.to_string());
        }
        self.count += 1;
        self.count
    }

    pub fn snapshot_for(&self, actor: Option<&str>) -> ToggleOutcome {
        ToggleOutcome {
            count: self.count,
            did_like: actor.is_some_and(|actor| self.users.contains(actor)),
        }
    }
}
