//! In-memory primary store shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use socio::application::Services;
use socio::application::counters::CountSource;
use socio::application::repos::{
    CommentsRepo, ContentPatch, ContentRepo, CounterRepo, RegistrationsRepo, RepoError,
};
use socio::application::stores::Stores;
use socio::cache::{
    CacheConfig, CacheStore, InvalidationRegistry, ListQuery, ListSort, MemoryCacheStore,
};
use socio::domain::entities::{CommentRecord, ContentRecord, ListPage, RegistrationRecord};
use socio::domain::types::{CommentStatus, Collection, ContentStatus, DerivedCounter};
use time::OffsetDateTime;

#[derive(Default)]
struct State {
    content: BTreeMap<(Collection, i64), ContentRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    registrations: Vec<RegistrationRecord>,
    next_id: i64,
    fail_writes: bool,
}

/// Primary store fake: every repository seam over one mutex-guarded state.
#[derive(Default)]
pub struct InMemoryRepos {
    state: Mutex<State>,
}

impl InMemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_content(&self, collection: Collection, record: ContentRecord) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(record.id);
        state.content.insert((collection, record.id), record);
    }

    pub fn content(&self, collection: Collection, id: i64) -> Option<ContentRecord> {
        self.state
            .lock()
            .unwrap()
            .content
            .get(&(collection, id))
            .cloned()
    }

    pub fn insert_comment(
        &self,
        id: i64,
        collection: Collection,
        subject_id: i64,
        status: CommentStatus,
    ) {
        self.state.lock().unwrap().comments.insert(
            id,
            CommentRecord {
                id,
                collection,
                subject_id,
                author: format!("autor-{id}"),
                body: "Muy interesante".to_string(),
                status,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
        );
    }

    /// Insert a registration row without touching the stored counter.
    pub fn insert_raw_registration(&self, event_id: i64, member_id: i64) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.registrations.push(RegistrationRecord {
            id,
            event_id,
            member_id,
            created_at: OffsetDateTime::UNIX_EPOCH,
        });
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    fn check_writable(state: &State) -> Result<(), RepoError> {
        if state.fail_writes {
            return Err(RepoError::from_persistence("primary store rejected the write"));
        }
        Ok(())
    }
}

pub fn content(id: i64, title: &str) -> ContentRecord {
    ContentRecord {
        id,
        title: title.to_string(),
        summary: String::new(),
        category: None,
        status: ContentStatus::Published,
        current_participants: None,
        capacity: None,
        comment_count: None,
        published_at: Some(OffsetDateTime::UNIX_EPOCH),
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn event(id: i64, title: &str, participants: i64) -> ContentRecord {
    ContentRecord {
        current_participants: Some(participants),
        ..content(id, title)
    }
}

pub fn article(id: i64, title: &str, comments: i64) -> ContentRecord {
    ContentRecord {
        comment_count: Some(comments),
        ..content(id, title)
    }
}

fn counter_slot(record: &mut ContentRecord, counter: DerivedCounter) -> &mut Option<i64> {
    match counter {
        DerivedCounter::Participants => &mut record.current_participants,
        DerivedCounter::Comments => &mut record.comment_count,
    }
}

#[async_trait]
impl ContentRepo for InMemoryRepos {
    async fn list_content(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<ListPage<ContentRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<ContentRecord> = state
            .content
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, record)| record.clone())
            .filter(|record| query.status.is_none_or(|status| record.status == status))
            .filter(|record| {
                query
                    .category
                    .as_ref()
                    .is_none_or(|category| record.category.as_ref() == Some(category))
            })
            .collect();

        match query.sort {
            ListSort::Popular => rows.sort_by(|a, b| {
                b.current_participants
                    .cmp(&a.current_participants)
                    .then(b.id.cmp(&a.id))
            }),
            ListSort::Title => rows.sort_by(|a, b| a.title.cmp(&b.title)),
            _ => rows.sort_by(|a, b| b.id.cmp(&a.id)),
        }

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();

        Ok(ListPage {
            items,
            page: query.page,
            page_size: query.page_size,
            total,
        })
    }

    async fn find_content(
        &self,
        collection: Collection,
        id: i64,
    ) -> Result<Option<ContentRecord>, RepoError> {
        Ok(self.content(collection, id))
    }

    async fn set_status(
        &self,
        collection: Collection,
        id: i64,
        status: ContentStatus,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        Ok(match state.content.get_mut(&(collection, id)) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        })
    }

    async fn update_content(
        &self,
        collection: Collection,
        id: i64,
        patch: &ContentPatch,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        let Some(record) = state.content.get_mut(&(collection, id)) else {
            return Ok(false);
        };
        if let Some(title) = &patch.title {
            record.title = title.clone();
        }
        if let Some(summary) = &patch.summary {
            record.summary = summary.clone();
        }
        if let Some(category) = &patch.category {
            record.category = Some(category.clone());
        }
        Ok(true)
    }

    async fn delete_content(&self, collection: Collection, id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        Ok(state.content.remove(&(collection, id)).is_some())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepos {
    async fn list_approved(
        &self,
        collection: Collection,
        subject_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .comments
            .values()
            .filter(|c| {
                c.collection == collection
                    && c.subject_id == subject_id
                    && c.status == CommentStatus::Approved
            })
            .cloned()
            .collect())
    }

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.state.lock().unwrap().comments.get(&id).cloned())
    }

    async fn set_comment_status(&self, id: i64, status: CommentStatus) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        Ok(match state.comments.get_mut(&id) {
            Some(comment) => {
                comment.status = status;
                true
            }
            None => false,
        })
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        Ok(state.comments.remove(&id).is_some())
    }
}

#[async_trait]
impl RegistrationsRepo for InMemoryRepos {
    async fn insert_registration(
        &self,
        event_id: i64,
        member_id: i64,
    ) -> Result<RegistrationRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        if state
            .registrations
            .iter()
            .any(|r| r.event_id == event_id && r.member_id == member_id)
        {
            return Err(RepoError::Duplicate {
                constraint: "registrations_event_id_member_id_key".to_string(),
            });
        }
        state.next_id += 1;
        let record = RegistrationRecord {
            id: state.next_id,
            event_id,
            member_id,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        state.registrations.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CounterRepo for InMemoryRepos {
    async fn subject_ids(&self, counter: DerivedCounter) -> Result<Vec<i64>, RepoError> {
        let collection = counter.collection();
        let state = self.state.lock().unwrap();
        Ok(state
            .content
            .keys()
            .filter(|(c, _)| *c == collection)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn stored_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
    ) -> Result<Option<i64>, RepoError> {
        Ok(self
            .content(counter.collection(), subject_id)
            .map(|mut record| counter_slot(&mut record, counter).unwrap_or(0)))
    }

    async fn count_details(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
    ) -> Result<i64, RepoError> {
        let state = self.state.lock().unwrap();
        let count = match counter {
            DerivedCounter::Participants => state
                .registrations
                .iter()
                .filter(|r| r.event_id == subject_id)
                .count(),
            DerivedCounter::Comments => state
                .comments
                .values()
                .filter(|c| {
                    c.collection == counter.collection()
                        && c.subject_id == subject_id
                        && c.status == CommentStatus::Approved
                })
                .count(),
        };
        Ok(count as i64)
    }

    async fn write_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
        value: i64,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        Ok(
            match state.content.get_mut(&(counter.collection(), subject_id)) {
                Some(record) => {
                    *counter_slot(record, counter) = Some(value);
                    true
                }
                None => false,
            },
        )
    }

    async fn adjust_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
        delta: i64,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        Ok(
            match state.content.get_mut(&(counter.collection(), subject_id)) {
                Some(record) => {
                    let slot = counter_slot(record, counter);
                    *slot = Some((slot.unwrap_or(0) + delta).max(0));
                    true
                }
                None => false,
            },
        )
    }
}

pub struct Harness {
    pub services: Services,
    pub repos: Arc<InMemoryRepos>,
    pub cache: Arc<MemoryCacheStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(CacheConfig::default(), CountSource::Primary)
    }

    pub fn with(config: CacheConfig, source: CountSource) -> Self {
        let repos = InMemoryRepos::new();
        let cache = Arc::new(MemoryCacheStore::new(&config));
        let stores = Stores::from_repositories(repos.clone(), cache.clone());
        let services = Services::new(
            &stores,
            config,
            Arc::new(InvalidationRegistry::standard()),
            source,
        );
        Self {
            services,
            repos,
            cache,
        }
    }

    pub async fn seed_cache(&self, key: &str, value: &str) {
        self.cache
            .put(key, value.to_string(), None)
            .await
            .expect("memory cache accepts writes");
    }

    pub async fn cached(&self, key: &str) -> Option<String> {
        self.cache
            .get(key)
            .await
            .expect("memory cache accepts reads")
    }
}
