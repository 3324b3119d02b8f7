//! Derived-state cache.
//!
//! Read paths go through [`ReadThrough`]; write paths call [`CacheTrigger`] after the primary
//! store committed, and the [`CacheInvalidator`] deletes every key the mutation stales.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "redis"
//! list_ttl = 300
//! detail_ttl = 600
//! thread_ttl = 300
//! sweep_list_prefix = false
//! ```

mod config;
mod events;
mod invalidator;
mod keys;
mod lock;
mod planner;
mod read_through;
mod registry;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use events::{MutationEvent, MutationKind};
pub use invalidator::{CacheInvalidator, InvalidationOutcome};
pub use keys::{CacheKey, DELIMITER, ListQuery, ListSort, list_prefix};
pub use planner::InvalidationPlan;
pub use read_through::ReadThrough;
pub use registry::{CollectionViews, InvalidationRegistry, ListViewTemplate, REGISTRY_VERSION};
pub use store::{CacheStore, CacheStoreError, MemoryCacheStore};
pub use trigger::CacheTrigger;
