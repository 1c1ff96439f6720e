//! Example consumer: serves `/members` (also reachable as `/crud`) and `/orders` from PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`

use async_trait::async_trait;
use crudman::driver::ensure_database_exists;
use crudman::{
    common_routes, crud_routes, set_route, AppState, Backend, CrudError, CrudRequest, DefaultManager, Entity,
    FieldRule, Manager, PgDriver, PgPager, Registry, RuleValidator, Settings, Setup, TableType,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Default, Serialize, Deserialize)]
struct Member {
    id: i64,
    nickname: String,
    age: i16,
}

impl Entity for Member {
    fn table_name(&self) -> &str {
        "members"
    }
}

#[derive(Default, Serialize, Deserialize)]
struct Order {
    id: i64,
    name: String,
}

impl Entity for Order {
    fn table_name(&self) -> &str {
        "orders"
    }
}

/// Orders keep the default create/update/delete but answer list with a fixed document.
struct OrderManager {
    inner: DefaultManager,
}

#[async_trait]
impl Manager for OrderManager {
    async fn list(&self, _req: &CrudRequest) -> Value {
        json!({"hello": "world"})
    }

    async fn create(&self, req: &CrudRequest) -> Result<Value, CrudError> {
        self.inner.create(req).await
    }

    async fn update(&self, req: &CrudRequest) -> Result<Value, CrudError> {
        self.inner.update(req).await
    }

    async fn delete(&self, req: &CrudRequest) -> Result<(), CrudError> {
        self.inner.delete(req).await
    }

    fn route(&self) -> &str {
        self.inner.route()
    }

    fn set_route(&mut self, route: String) {
        self.inner.set_route(route)
    }

    fn table_type(&self) -> Option<&TableType> {
        self.inner.table_type()
    }

    fn set_table_type(&mut self, table_type: TableType) {
        self.inner.set_table_type(table_type)
    }

    fn entity(&self) -> Option<&Arc<dyn Entity>> {
        self.inner.entity()
    }

    fn set_entity(&mut self, entity: Arc<dyn Entity>) {
        self.inner.set_entity(entity)
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS members (id BIGSERIAL PRIMARY KEY, nickname VARCHAR(16) NOT NULL, age SMALLINT NOT NULL DEFAULT 0)",
    "CREATE TABLE IF NOT EXISTS orders (id BIGSERIAL PRIMARY KEY, name VARCHAR(16) NOT NULL)",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudman=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(&pool).await?;
    }

    let backend = Backend::new(
        Arc::new(PgDriver::new(pool.clone())),
        Arc::new(PgPager::new(pool, settings.pager)),
    )
    .with_validator(Arc::new(
        RuleValidator::new().rule("nickname", FieldRule::new().required().max_length(16)),
    ));

    let mut registry = Registry::new();
    registry.register(DefaultManager::new(backend.clone(), "id"), Member::default(), [])?;
    let setups: Vec<Box<dyn Setup>> = vec![Box::new(set_route("/crud"))];
    registry.register(DefaultManager::new(backend.clone(), "id"), Member::default(), setups)?;
    registry.register(
        OrderManager {
            inner: DefaultManager::new(backend, "id")
                .with_validator(Arc::new(RuleValidator::new().rule("name", FieldRule::new().required()))),
        },
        Order::default(),
        [],
    )?;

    let app = common_routes().merge(crud_routes(AppState::new(registry), settings.body_limit));
    let listener = TcpListener::bind(&settings.bind).await?;
    tracing::info!("example consumer listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
