//! Invalidation registry.
//!
//! Holds the well-known list views of every collection. Write paths invalidate against this
//! registry instead of naming keys inline, so adding a list view is a one-place change.
//! Views outside the registry are only bounded by their TTL unless prefix sweeping is on.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::domain::types::{Collection, ContentStatus};

use super::keys::{CacheKey, ListQuery, ListSort};

/// Bump whenever the standard view set changes.
pub const REGISTRY_VERSION: u32 = 1;

/// A family of list views: the cartesian product of its parameter sets.
#[derive(Debug, Clone)]
pub struct ListViewTemplate {
    pub statuses: Vec<Option<ContentStatus>>,
    pub categories: Vec<Option<String>>,
    pub sorts: Vec<ListSort>,
    pub pages: RangeInclusive<u32>,
    pub page_sizes: Vec<u32>,
}

impl ListViewTemplate {
    /// Published, every category, default sort, the given pages and page size.
    pub fn published(pages: RangeInclusive<u32>, page_size: u32) -> Self {
        Self {
            statuses: vec![Some(ContentStatus::Published)],
            categories: vec![None],
            sorts: vec![ListSort::None],
            pages,
            page_sizes: vec![page_size],
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<Option<ContentStatus>>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<ListSort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_categories(mut self, categories: Vec<Option<String>>) -> Self {
        self.categories = categories;
        self
    }

    fn queries(&self) -> Vec<ListQuery> {
        let mut queries = Vec::new();
        for status in &self.statuses {
            for category in &self.categories {
                for sort in &self.sorts {
                    for page in self.pages.clone() {
                        for page_size in &self.page_sizes {
                            queries.push(ListQuery {
                                status: *status,
                                category: category.clone(),
                                sort: *sort,
                                page,
                                page_size: *page_size,
                            });
                        }
                    }
                }
            }
        }
        queries
    }
}

/// Registered views of one collection.
#[derive(Debug, Clone)]
pub struct CollectionViews {
    pub templates: Vec<ListViewTemplate>,
    /// List cards show engagement counters, so likes and shares also stale the lists.
    pub lists_render_engagement: bool,
}

#[derive(Debug, Clone)]
pub struct InvalidationRegistry {
    version: u32,
    views: BTreeMap<Collection, CollectionViews>,
}

impl InvalidationRegistry {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            views: BTreeMap::new(),
        }
    }

    /// The platform's default list views.
    pub fn standard() -> Self {
        Self::new(REGISTRY_VERSION)
            .register(
                Collection::Events,
                CollectionViews {
                    templates: vec![
                        ListViewTemplate::published(1..=3, 12)
                            .with_statuses(vec![
                                Some(ContentStatus::Published),
                                Some(ContentStatus::Archived),
                            ])
                            .with_sorts(vec![ListSort::None, ListSort::Popular]),
                    ],
                    lists_render_engagement: false,
                },
            )
            .register(
                Collection::News,
                CollectionViews {
                    templates: vec![
                        ListViewTemplate::published(1..=3, 10)
                            .with_sorts(vec![ListSort::None, ListSort::Recent]),
                    ],
                    lists_render_engagement: true,
                },
            )
            .register(
                Collection::Products,
                CollectionViews {
                    templates: vec![ListViewTemplate::published(1..=2, 24)],
                    lists_render_engagement: false,
                },
            )
    }

    pub fn register(mut self, collection: Collection, views: CollectionViews) -> Self {
        self.views.insert(collection, views);
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Every well-known list key of `collection`, deduplicated and sorted.
    pub fn list_keys(&self, collection: Collection) -> Vec<String> {
        let Some(views) = self.views.get(&collection) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = views
            .templates
            .iter()
            .flat_map(ListViewTemplate::queries)
            .map(|query| CacheKey::list(collection, query).to_string())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn lists_render_engagement(&self, collection: Collection) -> bool {
        self.views
            .get(&collection)
            .is_some_and(|views| views.lists_render_engagement)
    }
}

impl Default for InvalidationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_event_views_include_default_listing() {
        let registry = InvalidationRegistry::standard();
        let keys = registry.list_keys(Collection::Events);

        assert!(keys.contains(&"eventos:list:published:all:none:1:12".to_string()));
        assert!(keys.contains(&"eventos:list:archived:all:popular:3:12".to_string()));
        // 2 statuses x 1 category x 2 sorts x 3 pages x 1 size
        assert_eq!(keys.len(), 12);
    }

    #[test]
    fn keys_are_deduplicated_across_templates() {
        let registry = InvalidationRegistry::new(2).register(
            Collection::Products,
            CollectionViews {
                templates: vec![
                    ListViewTemplate::published(1..=2, 24),
                    ListViewTemplate::published(2..=3, 24),
                ],
                lists_render_engagement: false,
            },
        );

        assert_eq!(registry.list_keys(Collection::Products).len(), 3);
        assert_eq!(registry.version(), 2);
    }

    #[test]
    fn unregistered_collection_has_no_keys() {
        let registry = InvalidationRegistry::new(1);
        assert!(registry.list_keys(Collection::News).is_empty());
        assert!(!registry.lists_render_engagement(Collection::News));
    }

    #[test]
    fn category_templates_expand() {
        let registry = InvalidationRegistry::new(1).register(
            Collection::Products,
            CollectionViews {
                templates: vec![
                    ListViewTemplate::published(1..=1, 24)
                        .with_categories(vec![None, Some("libros".to_string())]),
                ],
                lists_render_engagement: false,
            },
        );

        assert_eq!(
            registry.list_keys(Collection::Products),
            vec![
                "productos:list:published:all:none:1:24".to_string(),
                "productos:list:published:libros:none:1:24".to_string(),
            ]
        );
    }

    #[test]
    fn news_lists_render_engagement() {
        let registry = InvalidationRegistry::standard();
        assert!(registry.lists_render_engagement(Collection::News));
        assert!(!registry.lists_render_engagement(Collection::Events));
    }
}
