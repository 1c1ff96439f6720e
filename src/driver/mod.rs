//! Collaborator seams: storage driver and paginator, plus their implementations.

pub mod memory;
pub mod postgres;

use crate::config::PagerConfig;
use crate::entity::Instance;
use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgDriver, PgPager};

/// Equality filter on one column.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Filter {
            column: column.into(),
            value,
        }
    }
}

/// Persistence operations the default manager relies on. Shared across requests.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Insert the instance; storage-assigned fields (generated ids) are written back into it.
    async fn create(&self, table: &str, instance: &mut Instance) -> Result<(), StorageError>;

    /// Apply every field of the instance to the rows matching the filter.
    async fn update_where(&self, table: &str, filter: &Filter, instance: &Instance) -> Result<(), StorageError>;

    async fn delete_where(&self, table: &str, filter: &Filter) -> Result<(), StorageError>;

    /// Column marked as primary key, if the table has one.
    async fn primary_key_column(&self, table: &str) -> Result<Option<String>, StorageError>;
}

/// Listing engine. Failures are reported in `PageResult::error`.
#[async_trait]
pub trait Paginator: Send + Sync {
    async fn find(&self, query: PageQuery) -> PageResult;
}

#[derive(Clone, Debug)]
pub struct PageQuery {
    /// Storage index (table) to list.
    pub index: String,
    pub pagination_field: String,
    /// Known fields of the entity; only these are accepted as filters.
    pub fields: Vec<String>,
    pub params: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

/// Parsed listing parameters: `page`, `page_size`, `order`, and `<field>=<value>` filters.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub order: Order,
    pub filters: Vec<(String, String)>,
}

impl PageRequest {
    pub fn from_query(query: &PageQuery, config: &PagerConfig) -> Self {
        let mut page = 1;
        let mut page_size = config.default_page_size;
        let mut order = Order::Asc;
        let mut filters = Vec::new();
        for (k, v) in &query.params {
            match k.as_str() {
                "page" => page = v.parse().unwrap_or(1),
                "page_size" => page_size = v.parse().unwrap_or(config.default_page_size),
                "order" => {
                    if v.eq_ignore_ascii_case("desc") {
                        order = Order::Desc;
                    }
                }
                _ => {
                    if query.fields.iter().any(|f| f == k) {
                        filters.push((k.clone(), v.clone()));
                    }
                }
            }
        }
        filters.sort();
        PageRequest {
            page: page.max(1),
            page_size: page_size.clamp(1, config.max_page_size.max(1)),
            order,
            filters,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PageResult {
    pub data: Vec<Value>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    pub fn failed(request: &PageRequest, error: impl ToString) -> Self {
        PageResult {
            data: Vec::new(),
            page: request.page,
            page_size: request.page_size,
            total: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Textual form used to compare a stored value with a filter or id taken from a URL.
pub fn key_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(params: &[(&str, &str)]) -> PageQuery {
        PageQuery {
            index: "widgets".into(),
            pagination_field: "ID".into(),
            fields: vec!["ID".into(), "Name".into()],
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn defaults_and_caps() {
        let cfg = PagerConfig::default();
        let req = PageRequest::from_query(&query(&[]), &cfg);
        assert_eq!((req.page, req.page_size, req.order), (1, 10, Order::Asc));

        let req = PageRequest::from_query(&query(&[("page", "0"), ("page_size", "5000")]), &cfg);
        assert_eq!((req.page, req.page_size), (1, 100));
    }

    #[test]
    fn only_known_fields_filter() {
        let cfg = PagerConfig::default();
        let req = PageRequest::from_query(
            &query(&[("Name", "x"), ("secret", "y"), ("order", "DESC"), ("page", "3")]),
            &cfg,
        );
        assert_eq!(req.filters, vec![("Name".to_string(), "x".to_string())]);
        assert_eq!(req.order, Order::Desc);
        assert_eq!(req.offset(), 20);
    }
}
