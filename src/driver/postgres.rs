//! PostgreSQL storage driver and paginator on sqlx.

use super::{key_text, Filter, PageQuery, PageRequest, PageResult, Paginator, StorageDriver};
use crate::config::PagerConfig;
use crate::entity::Instance;
use crate::error::StorageError;
use crate::sql::{self, Param, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, Postgres};
use sqlx::query::{Query, QueryScalar};
use sqlx::{ConnectOptions, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;

fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: &'q [Param]) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            Param::Json(v) => query.bind(v),
            Param::Text(s) => query.bind(s.as_str()),
            Param::Int(n) => query.bind(*n),
        };
    }
    query
}

fn bind_scalar<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    params: &'q [Param],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for p in params {
        query = match p {
            Param::Json(v) => query.bind(v),
            Param::Text(s) => query.bind(s.as_str()),
            Param::Int(n) => query.bind(*n),
        };
    }
    query
}

pub struct PgDriver {
    pool: PgPool,
    primary_keys: RwLock<HashMap<String, Option<String>>>,
}

impl PgDriver {
    pub fn new(pool: PgPool) -> Self {
        PgDriver {
            pool,
            primary_keys: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_json(&self, q: &QueryBuf) -> Result<Option<Value>, StorageError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_scalar(sqlx::query_scalar::<_, Value>(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, StorageError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(sqlx::query(&q.sql), &q.params).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl StorageDriver for PgDriver {
    async fn create(&self, table: &str, instance: &mut Instance) -> Result<(), StorageError> {
        let pk = self.primary_key_column(table).await?;
        let columns: Vec<&str> = instance
            .fields()
            .keys()
            .map(String::as_str)
            .filter(|c| !(pk.as_deref() == Some(*c) && instance.is_zero(c)))
            .collect();
        let q = sql::insert(table, &columns, instance.clone().into_value());
        if let Some(Value::Object(stored)) = self.fetch_json(&q).await? {
            for (k, v) in stored {
                if instance.get(&k).is_some() {
                    instance.set(k, v);
                }
            }
        }
        Ok(())
    }

    async fn update_where(&self, table: &str, filter: &Filter, instance: &Instance) -> Result<(), StorageError> {
        let columns: Vec<&str> = instance
            .fields()
            .keys()
            .map(String::as_str)
            .filter(|c| *c != filter.column)
            .collect();
        if columns.is_empty() {
            return Ok(());
        }
        let q = sql::update(
            table,
            &columns,
            instance.clone().into_value(),
            &filter.column,
            key_text(&filter.value),
        );
        let affected = self.execute(&q).await?;
        tracing::debug!(table = %table, affected, "update");
        Ok(())
    }

    async fn delete_where(&self, table: &str, filter: &Filter) -> Result<(), StorageError> {
        let q = sql::delete(table, &filter.column, key_text(&filter.value));
        let affected = self.execute(&q).await?;
        tracing::debug!(table = %table, affected, "delete");
        Ok(())
    }

    async fn primary_key_column(&self, table: &str) -> Result<Option<String>, StorageError> {
        if let Some(pk) = self.primary_keys.read().await.get(table) {
            return Ok(pk.clone());
        }
        let q = sql::primary_key_column(table);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let pk: Option<String> = bind_scalar(sqlx::query_scalar::<_, String>(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        self.primary_keys
            .write()
            .await
            .insert(table.to_string(), pk.clone());
        Ok(pk)
    }
}

pub struct PgPager {
    pool: PgPool,
    config: PagerConfig,
}

impl PgPager {
    pub fn new(pool: PgPool, config: PagerConfig) -> Self {
        PgPager { pool, config }
    }

    async fn page(&self, query: &PageQuery, request: &PageRequest) -> Result<PageResult, StorageError> {
        let q = sql::count(&query.index, request);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let total: i64 = bind_scalar(sqlx::query_scalar::<_, i64>(&q.sql), &q.params)
            .fetch_one(&self.pool)
            .await?;

        let q = sql::select_page(&query.index, &query.pagination_field, request);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows: Value = bind_scalar(sqlx::query_scalar::<_, Value>(&q.sql), &q.params)
            .fetch_one(&self.pool)
            .await?;
        let data = match rows {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        };
        Ok(PageResult {
            data,
            page: request.page,
            page_size: request.page_size,
            total: u64::try_from(total).unwrap_or(0),
            error: None,
        })
    }
}

#[async_trait]
impl Paginator for PgPager {
    async fn find(&self, query: PageQuery) -> PageResult {
        let request = PageRequest::from_query(&query, &self.config);
        match self.page(&query, &request).await {
            Ok(page) => page,
            Err(e) => PageResult::failed(&request, e),
        }
    }
}

/// Connect to the `postgres` maintenance database and create the target database if missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StorageError> {
    let (admin_url, db_name) = split_db_name(database_url);
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)?;
    let mut conn = opts.connect().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn split_db_name(url: &str) -> (String, String) {
    let path_start = url.rfind('/').map_or(url.len(), |i| i + 1);
    let db_name = url
        .get(path_start..)
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("")
        .trim();
    let base = url.get(..path_start).unwrap_or(url);
    (format!("{}postgres", base), db_name.to_string())
}
