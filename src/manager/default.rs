//! Default manager: decodes JSON bodies into dynamic instances, validates, and persists through the storage driver.

use super::traits::Manager;
use crate::driver::{Filter, PageQuery, PageResult, Paginator, StorageDriver};
use crate::entity::{Entity, Instance, TableType};
use crate::error::CrudError;
use crate::request::CrudRequest;
use crate::validation::{AcceptAll, Validator};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Collaborators shared by every default manager of a process.
#[derive(Clone)]
pub struct Backend {
    pub driver: Arc<dyn StorageDriver>,
    pub pager: Arc<dyn Paginator>,
    /// Used by managers that have no validator of their own.
    pub validator: Arc<dyn Validator>,
}

impl Backend {
    pub fn new(driver: Arc<dyn StorageDriver>, pager: Arc<dyn Paginator>) -> Self {
        Backend {
            driver,
            pager,
            validator: Arc::new(AcceptAll),
        }
    }

    /// Convenience for stores that implement both seams, such as `MemoryStore`.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: StorageDriver + Paginator + 'static,
    {
        Backend::new(store.clone(), store)
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }
}

pub struct DefaultManager {
    backend: Backend,
    route: String,
    table_type: Option<TableType>,
    entity: Option<Arc<dyn Entity>>,
    primary_key: String,
    pagination_field: Option<String>,
    validator: Option<Arc<dyn Validator>>,
}

impl DefaultManager {
    /// `primary_key` names the entity field identifying a row on update.
    pub fn new(backend: Backend, primary_key: impl Into<String>) -> Self {
        DefaultManager {
            backend,
            route: String::new(),
            table_type: None,
            entity: None,
            primary_key: primary_key.into(),
            pagination_field: None,
            validator: None,
        }
    }

    /// Validator for this manager only.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Field used to order list pages. Defaults to the primary key.
    pub fn with_pagination_field(mut self, field: impl Into<String>) -> Self {
        self.pagination_field = Some(field.into());
        self
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn pagination_field(&self) -> &str {
        self.pagination_field.as_deref().unwrap_or(&self.primary_key)
    }

    fn bound(&self) -> Result<(&TableType, &Arc<dyn Entity>), CrudError> {
        match (&self.table_type, &self.entity) {
            (Some(t), Some(e)) => Ok((t, e)),
            _ => Err(CrudError::Unbound),
        }
    }

    fn validator(&self) -> &dyn Validator {
        self.validator
            .as_deref()
            .unwrap_or_else(|| self.backend.validator.as_ref())
    }

    /// Content-type check, body decode and validation shared by create and update.
    fn decode(&self, table_type: &TableType, req: &CrudRequest) -> Result<Instance, CrudError> {
        if !req.is_json() {
            return Err(CrudError::UnsupportedMediaType);
        }
        Instance::decode(table_type, &req.body)
    }

    fn validate(&self, instance: &Instance) -> Result<(), CrudError> {
        let value = Value::Object(instance.fields().clone());
        match self.validator().validate(&value) {
            Some(errors) => Err(CrudError::InvalidParams(errors)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Manager for DefaultManager {
    async fn list(&self, req: &CrudRequest) -> Value {
        let page = match self.bound() {
            Ok((table_type, entity)) => {
                let query = PageQuery {
                    index: entity.table_name().to_string(),
                    pagination_field: self.pagination_field().to_string(),
                    fields: table_type.fields(),
                    params: req.query.clone(),
                };
                self.backend.pager.find(query).await
            }
            Err(e) => PageResult {
                error: Some(e.to_string()),
                ..PageResult::default()
            },
        };
        serde_json::to_value(page).unwrap_or(Value::Null)
    }

    async fn create(&self, req: &CrudRequest) -> Result<Value, CrudError> {
        let (table_type, entity) = self.bound()?;
        let mut instance = self.decode(table_type, req)?;
        self.validate(&instance)?;
        tracing::debug!(route = %self.route, table = %entity.table_name(), "create");
        self.backend
            .driver
            .create(entity.table_name(), &mut instance)
            .await?;
        instance.conform(table_type)?;
        Ok(instance.into_value())
    }

    async fn update(&self, req: &CrudRequest) -> Result<Value, CrudError> {
        let (table_type, entity) = self.bound()?;
        let instance = self.decode(table_type, req)?;
        if instance.is_zero(&self.primary_key) {
            return Err(CrudError::MissingPrimaryKey(self.primary_key.clone()));
        }
        self.validate(&instance)?;
        let key = instance
            .get(&self.primary_key)
            .cloned()
            .unwrap_or(Value::Null);
        tracing::debug!(route = %self.route, table = %entity.table_name(), key = %key, "update");
        self.backend
            .driver
            .update_where(entity.table_name(), &Filter::eq(self.primary_key.clone(), key), &instance)
            .await?;
        Ok(instance.into_value())
    }

    async fn delete(&self, req: &CrudRequest) -> Result<(), CrudError> {
        let id = req.query_param("id").unwrap_or("");
        if id.is_empty() {
            return Err(CrudError::MissingId);
        }
        let (_, entity) = self.bound()?;
        let table = entity.table_name();
        let column = self
            .backend
            .driver
            .primary_key_column(table)
            .await?
            .ok_or_else(|| CrudError::PrimaryKeyNotFound(table.to_string()))?;
        tracing::debug!(route = %self.route, table = %table, id = %id, "delete");
        self.backend
            .driver
            .delete_where(table, &Filter::eq(column, Value::String(id.to_string())))
            .await?;
        Ok(())
    }

    fn route(&self) -> &str {
        &self.route
    }

    fn set_route(&mut self, route: String) {
        self.route = route;
    }

    fn table_type(&self) -> Option<&TableType> {
        self.table_type.as_ref()
    }

    fn set_table_type(&mut self, table_type: TableType) {
        self.table_type = Some(table_type);
    }

    fn entity(&self) -> Option<&Arc<dyn Entity>> {
        self.entity.as_ref()
    }

    fn set_entity(&mut self, entity: Arc<dyn Entity>) {
        self.entity = Some(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryStore;
    use crate::error::StorageError;
    use crate::validation::{FieldRule, RuleValidator, ValidationErrors};
    use axum::http::Method;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Serialize, Deserialize)]
    #[allow(non_snake_case)]
    struct Widget {
        ID: u64,
        Name: String,
    }

    impl Entity for Widget {
        fn table_name(&self) -> &str {
            "widgets"
        }
    }

    /// Driver that counts calls and refuses to do anything.
    #[derive(Default)]
    struct Spy {
        calls: AtomicUsize,
        primary_key: Option<String>,
    }

    #[async_trait]
    impl StorageDriver for Spy {
        async fn create(&self, _: &str, _: &mut Instance) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn update_where(&self, _: &str, _: &Filter, _: &Instance) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn delete_where(&self, _: &str, _: &Filter) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn primary_key_column(&self, _: &str) -> Result<Option<String>, StorageError> {
            Ok(self.primary_key.clone())
        }
    }

    fn bind(mut m: DefaultManager) -> DefaultManager {
        m.set_route("/widgets".into());
        m.set_table_type(TableType::of::<Widget>());
        m.set_entity(Arc::new(Widget::default()));
        m
    }

    fn spy_manager(spy: Arc<Spy>) -> DefaultManager {
        let backend = Backend::new(spy, Arc::new(MemoryStore::new()));
        bind(DefaultManager::new(backend, "ID"))
    }

    fn memory_manager() -> (Arc<MemoryStore>, DefaultManager) {
        let store = Arc::new(MemoryStore::new().with_table("widgets", "ID"));
        let m = bind(DefaultManager::new(Backend::from_store(store.clone()), "ID"));
        (store, m)
    }

    fn post(body: &'static str) -> CrudRequest {
        CrudRequest::new(Method::POST, "/widgets").with_json(body)
    }

    fn put(body: &'static str) -> CrudRequest {
        CrudRequest::new(Method::PUT, "/widgets").with_json(body)
    }

    #[tokio::test]
    async fn create_returns_stored_instance() {
        let (store, m) = memory_manager();
        let created = m.create(&post(r#"{"Name":"x"}"#)).await.unwrap();
        assert_eq!(created, json!({"ID": 1, "Name": "x"}));
        assert_eq!(store.rows("widgets").await, vec![created]);
    }

    #[tokio::test]
    async fn create_rejects_non_json_before_storage() {
        let spy = Arc::new(Spy::default());
        let m = spy_manager(spy.clone());
        let req = CrudRequest::new(Method::POST, "/widgets").with_body("text/plain", r#"{"Name":"x"}"#);
        let err = m.create(&req).await.unwrap_err();
        assert!(matches!(err, CrudError::UnsupportedMediaType));
        assert_eq!(err.to_string(), "only application/json is supported for the time being");
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_surfaces_decode_error() {
        let spy = Arc::new(Spy::default());
        let m = spy_manager(spy.clone());
        assert!(matches!(m.create(&post("{nope")).await, Err(CrudError::Decode(_))));
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_failure_carries_descriptor_and_skips_storage() {
        let spy = Arc::new(Spy::default());
        let rules = RuleValidator::new().rule("Name", FieldRule::new().required());
        let m = spy_manager(spy.clone()).with_validator(Arc::new(rules));
        let err = m.create(&post(r#"{"Name":""}"#)).await.unwrap_err();
        assert_eq!(
            err.data(),
            Some(json!({"errors": [{"field": "Name", "message": "Name is required"}]}))
        );
        assert_eq!(err.to_string(), "parameters invalid");
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backend_validator_applies_unless_overridden() {
        let store = Arc::new(MemoryStore::new().with_table("widgets", "ID"));
        let deny = |_: &Value| Some(ValidationErrors::single("Name", "denied"));
        let backend = Backend::from_store(store).with_validator(Arc::new(deny));
        let strict = bind(DefaultManager::new(backend.clone(), "ID"));
        assert!(matches!(
            strict.create(&post(r#"{"Name":"x"}"#)).await,
            Err(CrudError::InvalidParams(_))
        ));

        let lenient = bind(DefaultManager::new(backend, "ID").with_validator(Arc::new(AcceptAll)));
        assert!(lenient.create(&post(r#"{"Name":"x"}"#)).await.is_ok());
    }

    #[tokio::test]
    async fn update_requires_primary_key() {
        let spy = Arc::new(Spy::default());
        let m = spy_manager(spy.clone());
        for body in [r#"{"Name":"y"}"#, r#"{"ID":0,"Name":"y"}"#] {
            let err = m.update(&put(body)).await.unwrap_err();
            assert!(matches!(err, CrudError::MissingPrimaryKey(ref pk) if pk == "ID"));
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let (store, m) = memory_manager();
        m.create(&post(r#"{"Name":"x"}"#)).await.unwrap();
        let first = m.update(&put(r#"{"ID":1,"Name":"y"}"#)).await.unwrap();
        let after_first = store.rows("widgets").await;
        let second = m.update(&put(r#"{"ID":1,"Name":"y"}"#)).await.unwrap();
        assert_eq!(first, json!({"ID": 1, "Name": "y"}));
        assert_eq!(first, second);
        assert_eq!(after_first, store.rows("widgets").await);
    }

    #[tokio::test]
    async fn delete_needs_id_and_primary_key() {
        let spy = Arc::new(Spy::default());
        let m = spy_manager(spy.clone());
        let bare = CrudRequest::new(Method::DELETE, "/widgets");
        assert!(matches!(m.delete(&bare).await, Err(CrudError::MissingId)));
        let empty = bare.clone().with_query("id", "");
        assert!(matches!(m.delete(&empty).await, Err(CrudError::MissingId)));

        let with_id = bare.with_query("id", "1");
        assert!(matches!(
            m.delete(&with_id).await,
            Err(CrudError::PrimaryKeyNotFound(ref t)) if t == "widgets"
        ));
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (store, m) = memory_manager();
        m.create(&post(r#"{"Name":"x"}"#)).await.unwrap();
        m.create(&post(r#"{"Name":"y"}"#)).await.unwrap();
        let req = CrudRequest::new(Method::DELETE, "/widgets").with_query("id", "1");
        m.delete(&req).await.unwrap();
        assert_eq!(store.rows("widgets").await, vec![json!({"ID": 2, "Name": "y"})]);
    }

    #[tokio::test]
    async fn list_pages_through_pager() {
        let (_, m) = memory_manager();
        m.create(&post(r#"{"Name":"x"}"#)).await.unwrap();
        let page = m.list(&CrudRequest::new(Method::GET, "/widgets")).await;
        assert_eq!(page["total"], json!(1));
        assert_eq!(page["data"], json!([{"ID": 1, "Name": "x"}]));
    }

    #[tokio::test]
    async fn unbound_manager_fails_cleanly() {
        let m = DefaultManager::new(Backend::from_store(Arc::new(MemoryStore::new())), "ID");
        assert!(matches!(m.create(&post("{}")).await, Err(CrudError::Unbound)));
        let page = m.list(&CrudRequest::new(Method::GET, "/")).await;
        assert_eq!(page["error"], json!("manager is not registered"));
    }
}
