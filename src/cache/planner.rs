//! Invalidation plan generation.
//!
//! Maps mutation events to the exact set of cache keys they stale, merging several events
//! into one deduplicated plan.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::domain::types::Collection;

use super::events::{MutationEvent, MutationKind};
use super::keys::{CacheKey, list_prefix};
use super::registry::InvalidationRegistry;

/// Keys to delete for a batch of mutation events.
#[derive(Debug, Default)]
pub struct InvalidationPlan {
    /// Keys deleted one by one.
    pub keys: BTreeSet<String>,
    /// Prefixes whose every listed key is deleted as well.
    pub sweep_prefixes: BTreeSet<String>,
    /// Events merged into this plan.
    pub event_ids: Vec<Uuid>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ events: {}, keys: {}, sweeps: {} }}",
            self.event_ids.len(),
            self.keys.len(),
            self.sweep_prefixes.len(),
        )
    }
}

impl InvalidationPlan {
    pub fn from_event(
        registry: &InvalidationRegistry,
        event: &MutationEvent,
        sweep_lists: bool,
    ) -> Self {
        Self::from_events(registry, std::slice::from_ref(event), sweep_lists)
    }

    /// Merge events into one plan.
    ///
    /// - Deduplicates by event ID
    /// - Point keys come from the subject of each event
    /// - List keys come from the registry, added once per collection
    pub fn from_events(
        registry: &InvalidationRegistry,
        events: &[MutationEvent],
        sweep_lists: bool,
    ) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();
        let mut list_collections = BTreeSet::new();

        for event in events.iter().filter(|e| seen_ids.insert(e.id)) {
            plan.event_ids.push(event.id);
            let collection = event.collection;
            let subject = event.subject_id;

            match event.kind {
                MutationKind::LikeToggle | MutationKind::Share => {
                    plan.insert(CacheKey::detail(collection, subject));
                    if registry.lists_render_engagement(collection) {
                        list_collections.insert(collection);
                    }
                }
                MutationKind::CommentModerate { .. } | MutationKind::CommentDelete { .. } => {
                    plan.insert(CacheKey::comment_thread(collection, subject));
                    plan.insert(CacheKey::detail(collection, subject));
                }
                MutationKind::ContentDelete => {
                    plan.insert(CacheKey::detail(collection, subject));
                    plan.insert(CacheKey::comment_thread(collection, subject));
                    plan.insert(CacheKey::likes(collection, subject));
                    plan.insert(CacheKey::shares(collection, subject));
                    if collection == Collection::Events {
                        plan.insert(CacheKey::registrations(subject));
                    }
                    list_collections.insert(collection);
                }
                kind if kind.affects_list_membership() => {
                    plan.insert(CacheKey::detail(collection, subject));
                    list_collections.insert(collection);
                }
                _ => {
                    plan.insert(CacheKey::detail(collection, subject));
                }
            }
        }

        for collection in list_collections {
            plan.include_lists(registry, collection, sweep_lists);
        }

        plan
    }

    /// Add every well-known list view of `collection`.
    pub fn include_lists(
        &mut self,
        registry: &InvalidationRegistry,
        collection: Collection,
        sweep_lists: bool,
    ) {
        self.keys.extend(registry.list_keys(collection));
        if sweep_lists {
            self.sweep_prefixes.insert(list_prefix(collection));
        }
    }

    fn insert(&mut self, key: CacheKey) {
        self.keys.insert(key.to_string());
    }

    /// Check if the plan has any actions to execute.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.sweep_prefixes.is_empty()
    }
}
