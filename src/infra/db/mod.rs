//! Postgres-backed primary store and repository implementations.

mod repos;
mod util;

pub use repos::SqlRepositories;
pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Postgres, Row as _,
    postgres::{PgArguments, PgPool, PgPoolOptions},
    query::{Query, QueryScalar},
};

use crate::application::repos::RepoError;
use crate::application::stores::{ExecOutcome, PrimaryStore, Row, SqlParam};

/// Primary store over a Postgres pool.
///
/// Rows come back as JSON objects built with `to_jsonb`, so statements can be written without
/// compile-time schema checks and decoded with serde on the repository side.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl PrimaryStore for PostgresStore {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, RepoError> {
        // A CTE accepts both plain selects and `INSERT/UPDATE ... RETURNING`.
        let wrapped = format!("WITH t AS ({sql}) SELECT to_jsonb(t) FROM t");
        let mut scalar = sqlx::query_scalar::<_, Value>(&wrapped);
        for param in params {
            scalar = bind_scalar(scalar, param);
        }

        let values = scalar
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        values
            .into_iter()
            .map(|value| match value {
                Value::Object(row) => Ok(row),
                other => Err(RepoError::from_persistence(format!(
                    "expected a row object, got `{other}`"
                ))),
            })
            .collect()
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<ExecOutcome, RepoError> {
        let mut statement = sqlx::query(sql);
        for param in params {
            statement = bind(statement, param);
        }

        if !sql.to_ascii_uppercase().contains("RETURNING") {
            let result = statement
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
            return Ok(ExecOutcome {
                changed: result.rows_affected(),
                last_id: None,
            });
        }

        let rows = statement
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let last_id = match rows.last() {
            Some(row) => Some(row.try_get::<i64, _>("id").map_err(map_sqlx_error)?),
            None => None,
        };

        Ok(ExecOutcome {
            changed: rows.len() as u64,
            last_id,
        })
    }
}

// Nulls bind as text; statements cast them where another type is expected.
fn bind<'q>(
    statement: Query<'q, Postgres, PgArguments>,
    param: &SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Int(value) => statement.bind(*value),
        SqlParam::Text(value) => statement.bind(value.clone()),
        SqlParam::Bool(value) => statement.bind(*value),
        SqlParam::Null => statement.bind(None::<String>),
    }
}

fn bind_scalar<'q>(
    statement: QueryScalar<'q, Postgres, Value, PgArguments>,
    param: &SqlParam,
) -> QueryScalar<'q, Postgres, Value, PgArguments> {
    match param {
        SqlParam::Int(value) => statement.bind(*value),
        SqlParam::Text(value) => statement.bind(value.clone()),
        SqlParam::Bool(value) => statement.bind(*value),
        SqlParam::Null => statement.bind(None::<String>),
    }
}
