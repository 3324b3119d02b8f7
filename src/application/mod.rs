//! Application services.

pub mod commands;
pub mod counters;
pub mod engagement;
pub mod error;
pub mod queries;
pub mod repos;
pub mod stores;

use std::sync::Arc;

use crate::cache::{CacheConfig, CacheInvalidator, CacheTrigger, InvalidationRegistry, ReadThrough};

use self::commands::{ContentCommands, RegistrationCommands};
use self::counters::{CountSource, CounterSynchronizer};
use self::engagement::EngagementService;
use self::queries::ContentQueries;
use self::stores::Stores;

/// Every service, wired from one [`Stores`] context.
#[derive(Clone)]
pub struct Services {
    pub queries: ContentQueries,
    pub commands: ContentCommands,
    pub registrations: RegistrationCommands,
    pub engagement: EngagementService,
    pub counters: CounterSynchronizer,
    pub invalidator: Arc<CacheInvalidator>,
}

impl Services {
    pub fn new(
        stores: &Stores,
        cache_config: CacheConfig,
        registry: Arc<InvalidationRegistry>,
        participants_source: CountSource,
    ) -> Self {
        let invalidator = Arc::new(CacheInvalidator::new(
            cache_config.clone(),
            stores.cache.clone(),
            registry.clone(),
        ));
        let trigger = Arc::new(CacheTrigger::new(cache_config.clone(), invalidator.clone()));
        let reader = ReadThrough::new(cache_config, stores.cache.clone());

        Self {
            queries: ContentQueries::new(stores, reader, registry),
            commands: ContentCommands::new(stores, trigger.clone()),
            registrations: RegistrationCommands::new(
                stores,
                trigger.clone(),
                participants_source,
            ),
            engagement: EngagementService::new(stores, trigger.clone()),
            counters: CounterSynchronizer::new(stores, trigger, participants_source),
            invalidator,
        }
    }
}
