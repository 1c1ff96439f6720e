//! Route → manager registry and per-request verb dispatch.

use crate::entity::{Entity, TableType};
use crate::error::{CrudError, RegistryError};
use crate::manager::{Manager, Setup};
use crate::request::CrudRequest;
use axum::http::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of dispatching one request.
#[derive(Debug)]
pub enum Outcome {
    /// No manager owns the path.
    NotFound,
    /// The verb maps to no manager operation.
    Forbidden,
    /// The operation ran; its value or error is passed through unchanged.
    Completed(Result<Value, CrudError>),
}

/// Built once at startup, read-only while serving.
#[derive(Clone, Default)]
pub struct Registry {
    managers: BTreeMap<String, Arc<dyn Manager>>,
    allow_overwrite: bool,
}

impl Registry {
    /// Registry that rejects a second manager on an occupied route.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where a later registration replaces an earlier one on the same route.
    pub fn permissive() -> Self {
        Registry {
            managers: BTreeMap::new(),
            allow_overwrite: true,
        }
    }

    /// Bind `entity` to `manager` under `/<table_name>`, apply `setups` in order, then store it under its final route.
    pub fn register<M, E>(
        &mut self,
        mut manager: M,
        entity: E,
        setups: impl IntoIterator<Item = Box<dyn Setup>>,
    ) -> Result<&mut Self, RegistryError>
    where
        M: Manager + 'static,
        E: Entity + Default + Serialize + DeserializeOwned + 'static,
    {
        let name = entity.table_name().trim_matches('/').to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        manager.set_route(format!("/{}", name));
        manager.set_table_type(TableType::of::<E>());
        manager.set_entity(Arc::new(entity));
        for setup in setups {
            setup.apply(&mut manager);
        }
        let route = manager.route().to_string();
        if self.managers.contains_key(&route) {
            if !self.allow_overwrite {
                return Err(RegistryError::DuplicateRoute(route));
            }
            tracing::warn!(route = %route, "replacing registered manager");
        }
        tracing::info!(route = %route, table = %name, "registered manager");
        self.managers.insert(route, Arc::new(manager));
        Ok(self)
    }

    pub fn get(&self, route: &str) -> Option<Arc<dyn Manager>> {
        self.managers.get(route).cloned()
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.managers.keys().map(String::as_str)
    }

    /// GET → list, POST → create, PUT → update, DELETE → delete.
    pub async fn dispatch(&self, req: &CrudRequest) -> Outcome {
        let Some(manager) = self.managers.get(&req.path) else {
            tracing::debug!(path = %req.path, "no manager for route");
            return Outcome::NotFound;
        };
        tracing::debug!(method = %req.method, path = %req.path, "dispatch");
        let result = match req.method {
            Method::GET => Ok(manager.list(req).await),
            Method::POST => manager.create(req).await,
            Method::PUT => manager.update(req).await,
            Method::DELETE => manager.delete(req).await.map(|()| Value::Null),
            _ => return Outcome::Forbidden,
        };
        Outcome::Completed(result)
    }
}
