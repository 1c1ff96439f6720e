use crate::entity::{Entity, TableType};
use crate::error::CrudError;
use crate::request::CrudRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Per-entity resource handler.
///
/// Custom managers usually hold a [`DefaultManager`](super::DefaultManager)
/// and forward every operation they do not override to it.
#[async_trait]
pub trait Manager: Send + Sync {
    /// List records. Failures are reported inside the returned value.
    async fn list(&self, req: &CrudRequest) -> Value;

    async fn create(&self, req: &CrudRequest) -> Result<Value, CrudError>;

    async fn update(&self, req: &CrudRequest) -> Result<Value, CrudError>;

    async fn delete(&self, req: &CrudRequest) -> Result<(), CrudError>;

    fn route(&self) -> &str;
    fn set_route(&mut self, route: String);
    fn table_type(&self) -> Option<&TableType>;
    fn set_table_type(&mut self, table_type: TableType);
    fn entity(&self) -> Option<&Arc<dyn Entity>>;
    fn set_entity(&mut self, entity: Arc<dyn Entity>);
}

/// One-shot configuration step applied during registration, after the defaults are bound.
pub trait Setup {
    fn apply(&self, manager: &mut dyn Manager);
}

impl<F> Setup for F
where
    F: Fn(&mut dyn Manager),
{
    fn apply(&self, manager: &mut dyn Manager) {
        self(manager)
    }
}

/// Replaces the route derived from the table name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetRoute(pub String);

impl Setup for SetRoute {
    fn apply(&self, manager: &mut dyn Manager) {
        manager.set_route(self.0.clone());
    }
}

pub fn set_route(route: impl Into<String>) -> SetRoute {
    SetRoute(route.into())
}
