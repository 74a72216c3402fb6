//! Row store reading the views over a direct Postgres connection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;
use sqlx::{
    Postgres, QueryBuilder, Row,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use tracing::{debug, warn};

use crate::application::repos::RepoError;

use super::query::{RowStore, ViewQuery};

const BACKEND: &str = "postgres";
const TARGET: &str = "trove::infra::db::postgres";

#[derive(Clone)]
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn select(&self, view_query: &ViewQuery) -> Result<Vec<Value>, RepoError> {
        let started = Instant::now();
        let mut qb = build_select(view_query);

        let result = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
            .and_then(|rows| {
                rows.iter()
                    .map(|row| row.try_get::<Value, _>("row").map_err(map_sqlx_error))
                    .collect::<Result<Vec<_>, _>>()
            });

        histogram!("trove_upstream_request_ms", "backend" => BACKEND)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(rows) => {
                debug!(target: TARGET, view = view_query.view(), rows = rows.len(), "view read")
            }
            Err(err) => {
                counter!("trove_upstream_error_total", "backend" => BACKEND).increment(1);
                warn!(target: TARGET, view = view_query.view(), error = %err, "view read failed");
            }
        }

        result
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

/// Render a view query as a single `to_jsonb` projection so every view comes
/// back as one JSON object per row, whatever its column types.
pub(crate) fn build_select(view_query: &ViewQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT to_jsonb(v) AS row FROM (SELECT ");

    if view_query.columns().is_empty() {
        qb.push("*");
    } else {
        let mut columns = qb.separated(", ");
        for column in view_query.columns() {
            columns.push(quote(column));
        }
    }

    qb.push(" FROM ");
    qb.push(quote(view_query.view()));

    for (index, (column, value)) in view_query.filters().iter().enumerate() {
        qb.push(if index == 0 { " WHERE " } else { " AND " });
        qb.push(quote(column));
        qb.push("::text = ");
        qb.push_bind(value.clone());
    }

    if !view_query.ordering().is_empty() {
        qb.push(" ORDER BY ");
        let mut order = qb.separated(", ");
        for (column, direction) in view_query.ordering() {
            order.push(format!("{} {}", quote(column), direction.as_str().to_uppercase()));
        }
    }

    if let Some(limit) = view_query.row_limit() {
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));
    }

    qb.push(") v");
    qb
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => RepoError::data_access(db.message().to_string()),
        sqlx::Error::PoolTimedOut => {
            RepoError::data_access("timed out waiting for a database connection")
        }
        other => RepoError::from_persistence(other),
    }
}
