//! Counter synchronizer.
//!
//! Derived counters are incremented optimistically at write time and drift when a write
//! half-fails. `resync` recomputes them from the authoritative detail records, writes them back
//! one row at a time and invalidates the collection's list views once per run.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::application::error::AppError;
use crate::application::repos::{CounterRepo, RepoError};
use crate::application::stores::Stores;
use crate::cache::{CacheKey, CacheStore, CacheTrigger};
use crate::domain::error::DomainError;
use crate::domain::types::DerivedCounter;

const METRIC_COUNTER_RESYNC_MS: &str = "socio_counter_resync_ms";

/// Where participant counts are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSource {
    /// `count(*)` over the registrations table.
    #[default]
    Primary,
    /// Length of the JSON member list under `registrations:<event_id>`.
    LegacyList,
}

impl FromStr for CountSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "primary" => Ok(CountSource::Primary),
            "legacy_list" => Ok(CountSource::LegacyList),
            other => Err(format!("unknown count source `{other}`")),
        }
    }
}

/// One subject that could not be synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectFailure {
    pub subject_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    pub counter: DerivedCounter,
    /// Subjects whose counter was written.
    pub updated: usize,
    /// Subjects whose stored value differed from the recomputed count.
    pub changed: Vec<i64>,
    pub errors: Vec<SubjectFailure>,
}

impl ResyncReport {
    fn new(counter: DerivedCounter) -> Self {
        Self {
            counter,
            updated: 0,
            changed: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
enum SubjectError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("subject row disappeared")]
    Missing,
    #[error("legacy list unreadable: {0}")]
    Legacy(String),
}

#[derive(Clone)]
pub struct CounterSynchronizer {
    counters: Arc<dyn CounterRepo>,
    cache: Arc<dyn CacheStore>,
    trigger: Arc<CacheTrigger>,
    source: CountSource,
}

impl CounterSynchronizer {
    pub fn new(stores: &Stores, trigger: Arc<CacheTrigger>, source: CountSource) -> Self {
        Self {
            counters: stores.counters.clone(),
            cache: stores.cache.clone(),
            trigger,
            source,
        }
    }

    /// Recompute `counter` for one subject, or for every subject when `subject_id` is `None`.
    ///
    /// A failing subject is recorded in the report and the loop continues. Only listing the
    /// subjects, or a missing single subject, fails the whole call.
    #[instrument(skip(self, counter), fields(counter = %counter))]
    pub async fn resync(
        &self,
        counter: DerivedCounter,
        subject_id: Option<i64>,
    ) -> Result<ResyncReport, AppError> {
        let started_at = Instant::now();

        let subjects = match subject_id {
            Some(id) => {
                if self.counters.stored_count(counter, id).await?.is_none() {
                    return Err(
                        DomainError::not_found(counter.collection().namespace(), id).into(),
                    );
                }
                vec![id]
            }
            None => self.counters.subject_ids(counter).await?,
        };

        info!(subjects = subjects.len(), source = ?self.source, "Counter resync starting");

        let mut report = ResyncReport::new(counter);
        for id in subjects {
            match self.resync_one(counter, id).await {
                Ok(changed) => {
                    report.updated += 1;
                    if changed {
                        report.changed.push(id);
                    }
                }
                Err(err) => {
                    warn!(subject_id = id, error = %err, "Counter resync failed for subject");
                    report.errors.push(SubjectFailure {
                        subject_id: id,
                        message: err.to_string(),
                    });
                }
            }
        }

        let outcome = self
            .trigger
            .counters_resynced(counter.collection(), &report.changed)
            .await;

        histogram!(METRIC_COUNTER_RESYNC_MS, "counter" => counter.as_str())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            updated = report.updated,
            changed = report.changed.len(),
            errors = report.errors.len(),
            invalidated = outcome.deleted,
            "Counter resync complete"
        );

        Ok(report)
    }

    /// Write the recomputed count; returns whether it differed from the stored one.
    async fn resync_one(&self, counter: DerivedCounter, id: i64) -> Result<bool, SubjectError> {
        let stored = self
            .counters
            .stored_count(counter, id)
            .await?
            .ok_or(SubjectError::Missing)?;
        let actual = self.count(counter, id).await?;

        if !self.counters.write_count(counter, id, actual).await? {
            return Err(SubjectError::Missing);
        }
        Ok(stored != actual)
    }

    async fn count(&self, counter: DerivedCounter, id: i64) -> Result<i64, SubjectError> {
        match (counter, self.source) {
            (DerivedCounter::Participants, CountSource::LegacyList) => {
                self.count_legacy_list(id).await
            }
            _ => Ok(self.counters.count_details(counter, id).await?),
        }
    }

    async fn count_legacy_list(&self, event_id: i64) -> Result<i64, SubjectError> {
        let key = CacheKey::registrations(event_id).to_string();
        let raw = self
            .cache
            .get(&key)
            .await
            .map_err(|err| SubjectError::Legacy(err.to_string()))?;
        let Some(raw) = raw else {
            return Ok(0);
        };
        let members: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|err| SubjectError::Legacy(err.to_string()))?;
        Ok(members.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{
        CacheConfig, CacheInvalidator, InvalidationRegistry, MemoryCacheStore,
    };

    #[derive(Default)]
    struct StubCounters {
        stored: Mutex<HashMap<i64, i64>>,
        details: HashMap<i64, i64>,
        failing: Option<i64>,
    }

    #[async_trait]
    impl CounterRepo for StubCounters {
        async fn subject_ids(&self, _counter: DerivedCounter) -> Result<Vec<i64>, RepoError> {
            let mut ids: Vec<i64> = self.stored.lock().unwrap().keys().copied().collect();
            ids.sort_unstable();
            Ok(ids)
        }

        async fn stored_count(
            &self,
            _counter: DerivedCounter,
            subject_id: i64,
        ) -> Result<Option<i64>, RepoError> {
            Ok(self.stored.lock().unwrap().get(&subject_id).copied())
        }

        async fn count_details(
            &self,
            _counter: DerivedCounter,
            subject_id: i64,
        ) -> Result<i64, RepoError> {
            if self.failing == Some(subject_id) {
                return Err(RepoError::Timeout);
            }
            Ok(self.details.get(&subject_id).copied().unwrap_or(0))
        }

        async fn write_count(
            &self,
            _counter: DerivedCounter,
            subject_id: i64,
            value: i64,
        ) -> Result<bool, RepoError> {
            let mut stored = self.stored.lock().unwrap();
            match stored.get_mut(&subject_id) {
                Some(slot) => {
                    *slot = value;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn adjust_count(
            &self,
            _counter: DerivedCounter,
            _subject_id: i64,
            _delta: i64,
        ) -> Result<bool, RepoError> {
            Ok(true)
        }
    }

    fn create_synchronizer(
        counters: Arc<StubCounters>,
        source: CountSource,
    ) -> (CounterSynchronizer, Arc<MemoryCacheStore>) {
        let cache = Arc::new(MemoryCacheStore::default());
        let config = CacheConfig::default();
        let invalidator = Arc::new(CacheInvalidator::new(
            config.clone(),
            cache.clone(),
            Arc::new(InvalidationRegistry::standard()),
        ));
        let synchronizer = CounterSynchronizer {
            counters,
            cache: cache.clone(),
            trigger: Arc::new(CacheTrigger::new(config, invalidator)),
            source,
        };
        (synchronizer, cache)
    }

    #[tokio::test]
    async fn partial_failure_is_reported_not_aborted() {
        let counters = Arc::new(StubCounters {
            stored: Mutex::new(HashMap::from([(1, 0), (2, 0), (3, 0)])),
            details: HashMap::from([(1, 4), (2, 1), (3, 2)]),
            failing: Some(2),
        });
        let (synchronizer, _cache) = create_synchronizer(counters.clone(), CountSource::Primary);

        let report = synchronizer
            .resync(DerivedCounter::Participants, None)
            .await
            .unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.changed, vec![1, 3]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].subject_id, 2);
        assert_eq!(counters.stored.lock().unwrap()[&1], 4);
    }

    #[tokio::test]
    async fn missing_single_subject_is_not_found() {
        let (synchronizer, _cache) =
            create_synchronizer(Arc::new(StubCounters::default()), CountSource::Primary);

        let err = synchronizer
            .resync(DerivedCounter::Participants, Some(99))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn legacy_list_source_counts_cached_members() {
        let counters = Arc::new(StubCounters {
            stored: Mutex::new(HashMap::from([(5, 1)])),
            ..Default::default()
        });
        let (synchronizer, cache) =
            create_synchronizer(counters.clone(), CountSource::LegacyList);
        cache
            .put("registrations:5", "[10,11,12]".into(), None)
            .await
            .unwrap();

        let report = synchronizer
            .resync(DerivedCounter::Participants, Some(5))
            .await
            .unwrap();

        assert_eq!(report.changed, vec![5]);
        assert_eq!(counters.stored.lock().unwrap()[&5], 3);
    }

    #[tokio::test]
    async fn malformed_legacy_list_fails_only_that_subject() {
        let counters = Arc::new(StubCounters {
            stored: Mutex::new(HashMap::from([(5, 1), (6, 0)])),
            ..Default::default()
        });
        let (synchronizer, cache) = create_synchronizer(counters, CountSource::LegacyList);
        cache
            .put("registrations:5", "not a list".into(), None)
            .await
            .unwrap();

        let report = synchronizer
            .resync(DerivedCounter::Participants, None)
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.errors[0].subject_id, 5);
    }

    #[test]
    fn count_source_parses() {
        assert_eq!("legacy_list".parse(), Ok(CountSource::LegacyList));
        assert!("kv".parse::<CountSource>().is_err());
    }
}
