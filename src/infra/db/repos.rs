//! Typed repositories over any [`PrimaryStore`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::application::repos::{
    CommentsRepo, ContentPatch, ContentRepo, CounterRepo, RegistrationsRepo, RepoError,
};
use crate::application::stores::{PrimaryStore, Row, SqlParam};
use crate::cache::{ListQuery, ListSort};
use crate::domain::entities::{CommentRecord, ContentRecord, ListPage, RegistrationRecord};
use crate::domain::types::{CommentStatus, Collection, ContentStatus, DerivedCounter};

#[derive(Clone)]
pub struct SqlRepositories {
    store: Arc<dyn PrimaryStore>,
}

impl SqlRepositories {
    pub fn new(store: Arc<dyn PrimaryStore>) -> Self {
        Self { store }
    }

    async fn fetch_all<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Vec<T>, RepoError> {
        self.store
            .query(sql, params)
            .await?
            .into_iter()
            .map(decode_row)
            .collect()
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<T>, RepoError> {
        self.store.first(sql, params).await?.map(decode_row).transpose()
    }

    async fn fetch_i64(&self, sql: &str, params: &[SqlParam]) -> Result<Option<i64>, RepoError> {
        let Some(row) = self.store.first(sql, params).await? else {
            return Ok(None);
        };
        match row.get("value") {
            Some(value) if value.is_null() => Ok(Some(0)),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| RepoError::from_persistence(format!("non-integer count `{value}`"))),
            None => Err(RepoError::from_persistence("row has no `value` column")),
        }
    }

    async fn changed(&self, sql: &str, params: &[SqlParam]) -> Result<bool, RepoError> {
        Ok(self.store.execute(sql, params).await?.changed > 0)
    }
}

fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, RepoError> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(RepoError::from_persistence)
}

fn order_clause(collection: Collection, sort: ListSort) -> &'static str {
    match (collection, sort) {
        (Collection::Events, ListSort::Popular) => "current_participants DESC, id DESC",
        (Collection::News, ListSort::Popular) => "comment_count DESC, id DESC",
        (_, ListSort::Recent) => "updated_at DESC, id DESC",
        (_, ListSort::Title) => "title ASC, id ASC",
        _ => "published_at DESC NULLS LAST, id DESC",
    }
}

fn counter_column(counter: DerivedCounter) -> &'static str {
    match counter {
        DerivedCounter::Participants => "current_participants",
        DerivedCounter::Comments => "comment_count",
    }
}

#[async_trait]
impl ContentRepo for SqlRepositories {
    async fn list_content(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<ListPage<ContentRecord>, RepoError> {
        let table = collection.table();
        let filter = "($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR category = $2)";
        let status = SqlParam::from(query.status.map(|s| s.as_str()));
        let category = SqlParam::from(query.category.clone());

        let total = self
            .fetch_i64(
                &format!("SELECT count(*) AS value FROM {table} WHERE {filter}"),
                &[status.clone(), category.clone()],
            )
            .await?
            .unwrap_or(0);

        let sql = format!(
            "SELECT * FROM {table} WHERE {filter} ORDER BY {} LIMIT $3 OFFSET $4",
            order_clause(collection, query.sort)
        );
        let offset = i64::try_from(query.offset())
            .map_err(|_| RepoError::InvalidInput { message: "page out of range".into() })?;
        let items = self
            .fetch_all(
                &sql,
                &[
                    status,
                    category,
                    SqlParam::Int(query.page_size.into()),
                    SqlParam::Int(offset),
                ],
            )
            .await?;

        Ok(ListPage {
            items,
            page: query.page,
            page_size: query.page_size,
            total: u64::try_from(total)
                .map_err(|_| RepoError::from_persistence("count exceeds supported range"))?,
        })
    }

    async fn find_content(
        &self,
        collection: Collection,
        id: i64,
    ) -> Result<Option<ContentRecord>, RepoError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", collection.table());
        self.fetch_optional(&sql, &[id.into()]).await
    }

    async fn set_status(
        &self,
        collection: Collection,
        id: i64,
        status: ContentStatus,
    ) -> Result<bool, RepoError> {
        let sql = format!(
            "UPDATE {} SET status = $2, updated_at = now() WHERE id = $1",
            collection.table()
        );
        self.changed(&sql, &[id.into(), status.as_str().into()])
            .await
    }

    async fn update_content(
        &self,
        collection: Collection,
        id: i64,
        patch: &ContentPatch,
    ) -> Result<bool, RepoError> {
        let sql = format!(
            "UPDATE {} SET title = COALESCE($2, title), summary = COALESCE($3, summary), \
             category = COALESCE($4, category), updated_at = now() WHERE id = $1",
            collection.table()
        );
        self.changed(
            &sql,
            &[
                id.into(),
                patch.title.clone().into(),
                patch.summary.clone().into(),
                patch.category.clone().into(),
            ],
        )
        .await
    }

    async fn delete_content(&self, collection: Collection, id: i64) -> Result<bool, RepoError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", collection.table());
        self.changed(&sql, &[id.into()]).await
    }
}

#[async_trait]
impl CommentsRepo for SqlRepositories {
    async fn list_approved(
        &self,
        collection: Collection,
        subject_id: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.fetch_all(
            "SELECT * FROM comments WHERE collection = $1 AND subject_id = $2 AND status = $3 \
             ORDER BY created_at ASC, id ASC",
            &[
                collection_param(collection),
                subject_id.into(),
                CommentStatus::Approved.as_str().into(),
            ],
        )
        .await
    }

    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        self.fetch_optional("SELECT * FROM comments WHERE id = $1", &[id.into()])
            .await
    }

    async fn set_comment_status(&self, id: i64, status: CommentStatus) -> Result<bool, RepoError> {
        self.changed(
            "UPDATE comments SET status = $2 WHERE id = $1",
            &[id.into(), status.as_str().into()],
        )
        .await
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError> {
        self.changed("DELETE FROM comments WHERE id = $1", &[id.into()])
            .await
    }
}

fn collection_param(collection: Collection) -> SqlParam {
    // Stored with the serde name (`events`, `news`, `products`).
    SqlParam::from(collection.table())
}

#[async_trait]
impl RegistrationsRepo for SqlRepositories {
    async fn insert_registration(
        &self,
        event_id: i64,
        member_id: i64,
    ) -> Result<RegistrationRecord, RepoError> {
        self.fetch_optional(
            "INSERT INTO registrations (event_id, member_id) VALUES ($1, $2) RETURNING *",
            &[event_id.into(), member_id.into()],
        )
        .await?
        .ok_or_else(|| RepoError::from_persistence("insert returned no row"))
    }
}

#[async_trait]
impl CounterRepo for SqlRepositories {
    async fn subject_ids(&self, counter: DerivedCounter) -> Result<Vec<i64>, RepoError> {
        let sql = format!(
            "SELECT id AS value FROM {} ORDER BY id",
            counter.collection().table()
        );
        self.store
            .query(&sql, &[])
            .await?
            .into_iter()
            .map(|row| {
                row.get("value")
                    .and_then(serde_json::Value::as_i64)
                    .ok_or_else(|| RepoError::from_persistence("subject id is not an integer"))
            })
            .collect()
    }

    async fn stored_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
    ) -> Result<Option<i64>, RepoError> {
        let sql = format!(
            "SELECT {} AS value FROM {} WHERE id = $1",
            counter_column(counter),
            counter.collection().table()
        );
        self.fetch_i64(&sql, &[subject_id.into()]).await
    }

    async fn count_details(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
    ) -> Result<i64, RepoError> {
        let (sql, params) = match counter {
            DerivedCounter::Participants => (
                "SELECT count(*) AS value FROM registrations WHERE event_id = $1",
                vec![SqlParam::from(subject_id)],
            ),
            DerivedCounter::Comments => (
                "SELECT count(*) AS value FROM comments \
                 WHERE collection = $2 AND subject_id = $1 AND status = $3",
                vec![
                    SqlParam::from(subject_id),
                    collection_param(counter.collection()),
                    CommentStatus::Approved.as_str().into(),
                ],
            ),
        };
        Ok(self.fetch_i64(sql, &params).await?.unwrap_or(0))
    }

    async fn write_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
        value: i64,
    ) -> Result<bool, RepoError> {
        let sql = format!(
            "UPDATE {} SET {} = $2 WHERE id = $1",
            counter.collection().table(),
            counter_column(counter)
        );
        self.changed(&sql, &[subject_id.into(), value.into()]).await
    }

    async fn adjust_count(
        &self,
        counter: DerivedCounter,
        subject_id: i64,
        delta: i64,
    ) -> Result<bool, RepoError> {
        let column = counter_column(counter);
        let sql = format!(
            "UPDATE {} SET {column} = GREATEST({column} + $2, 0) WHERE id = $1",
            counter.collection().table()
        );
        self.changed(&sql, &[subject_id.into(), delta.into()]).await
    }
}
