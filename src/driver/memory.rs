//! In-process storage and paginator. Tables must be declared before use.

use super::{key_text, Filter, Order, PageQuery, PageRequest, PageResult, Paginator, StorageDriver};
use crate::config::PagerConfig;
use crate::entity::Instance;
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Table {
    primary_key: Option<String>,
    rows: Vec<Map<String, Value>>,
    next_id: u64,
}

impl Table {
    fn matches(row: &Map<String, Value>, filter: &Filter) -> bool {
        row.get(&filter.column)
            .map_or(false, |v| key_text(v) == key_text(&filter.value))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    pager: PagerConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pager(mut self, pager: PagerConfig) -> Self {
        self.pager = pager;
        self
    }

    /// Declare a table whose `primary_key` column is auto-numbered when inserted as zero.
    pub fn with_table(self, name: &str, primary_key: &str) -> Self {
        self.declare(name, Some(primary_key))
    }

    /// Declare a table with no primary key.
    pub fn with_keyless_table(self, name: &str) -> Self {
        self.declare(name, None)
    }

    fn declare(mut self, name: &str, primary_key: Option<&str>) -> Self {
        self.tables.get_mut().insert(
            name.to_string(),
            Table {
                primary_key: primary_key.map(str::to_string),
                rows: Vec::new(),
                next_id: 1,
            },
        );
        self
    }

    /// Snapshot of a table's rows in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageDriver for MemoryStore {
    async fn create(&self, table: &str, instance: &mut Instance) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        if let Some(pk) = t.primary_key.clone() {
            if instance.is_zero(&pk) {
                instance.set(pk.clone(), Value::from(t.next_id));
                t.next_id += 1;
            } else {
                let filter = Filter::eq(pk.clone(), instance.get(&pk).cloned().unwrap_or(Value::Null));
                if t.rows.iter().any(|row| Table::matches(row, &filter)) {
                    return Err(StorageError::Conflict(format!("{} {} already exists", pk, key_text(&filter.value))));
                }
                if let Some(n) = filter.value.as_u64() {
                    t.next_id = t.next_id.max(n.saturating_add(1));
                }
            }
        }
        t.rows.push(instance.fields().clone());
        Ok(())
    }

    async fn update_where(&self, table: &str, filter: &Filter, instance: &Instance) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        for row in t.rows.iter_mut().filter(|row| Table::matches(row, filter)) {
            for (k, v) in instance.fields() {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn delete_where(&self, table: &str, filter: &Filter) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        t.rows.retain(|row| !Table::matches(row, filter));
        Ok(())
    }

    async fn primary_key_column(&self, table: &str) -> Result<Option<String>, StorageError> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }
}

#[async_trait]
impl Paginator for MemoryStore {
    async fn find(&self, query: PageQuery) -> PageResult {
        let request = PageRequest::from_query(&query, &self.pager);
        let tables = self.tables.read().await;
        let Some(t) = tables.get(&query.index) else {
            return PageResult::failed(&request, StorageError::UnknownTable(query.index.clone()));
        };
        let mut rows: Vec<&Map<String, Value>> = t
            .rows
            .iter()
            .filter(|row| {
                request
                    .filters
                    .iter()
                    .all(|(col, val)| row.get(col).map_or(false, |v| key_text(v) == *val))
            })
            .collect();
        rows.sort_by(|a, b| compare(a.get(&query.pagination_field), b.get(&query.pagination_field)));
        if request.order == Order::Desc {
            rows.reverse();
        }
        let total = rows.len() as u64;
        let data = rows
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.page_size as usize)
            .cloned()
            .map(Value::Object)
            .collect();
        PageResult {
            data,
            page: request.page,
            page_size: request.page_size,
            total,
            error: None,
        }
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => key_text(x).cmp(&key_text(y)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(v: Value) -> Instance {
        match v {
            Value::Object(m) => Instance::from(m),
            _ => unreachable!(),
        }
    }

    fn list_query(params: &[(&str, &str)]) -> PageQuery {
        PageQuery {
            index: "widgets".into(),
            pagination_field: "ID".into(),
            fields: vec!["ID".into(), "Name".into()],
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryStore::new().with_table("widgets", "ID");
        let mut a = instance(json!({"ID": 0, "Name": "a"}));
        let mut b = instance(json!({"ID": 0, "Name": "b"}));
        store.create("widgets", &mut a).await.unwrap();
        store.create("widgets", &mut b).await.unwrap();
        assert_eq!(a.get("ID"), Some(&json!(1)));
        assert_eq!(b.get("ID"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn explicit_id_conflicts_and_advances_sequence() {
        let store = MemoryStore::new().with_table("widgets", "ID");
        let mut a = instance(json!({"ID": 5, "Name": "a"}));
        store.create("widgets", &mut a).await.unwrap();
        let mut dup = instance(json!({"ID": 5, "Name": "b"}));
        assert!(matches!(
            store.create("widgets", &mut dup).await,
            Err(StorageError::Conflict(_))
        ));
        let mut next = instance(json!({"ID": 0, "Name": "c"}));
        store.create("widgets", &mut next).await.unwrap();
        assert_eq!(next.get("ID"), Some(&json!(6)));
    }

    #[tokio::test]
    async fn largest_explicit_id_does_not_overflow_sequence() {
        let store = MemoryStore::new().with_table("widgets", "ID");
        let mut max = instance(json!({"ID": u64::MAX, "Name": "max"}));
        store.create("widgets", &mut max).await.unwrap();
        assert_eq!(store.rows("widgets").await, vec![json!({"ID": u64::MAX, "Name": "max"})]);

        let mut again = instance(json!({"ID": u64::MAX, "Name": "again"}));
        assert!(matches!(
            store.create("widgets", &mut again).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_and_delete_match_on_text_form() {
        let store = MemoryStore::new().with_table("widgets", "ID");
        let mut a = instance(json!({"ID": 0, "Name": "a"}));
        store.create("widgets", &mut a).await.unwrap();

        let updated = instance(json!({"ID": 1, "Name": "z"}));
        store
            .update_where("widgets", &Filter::eq("ID", json!(1)), &updated)
            .await
            .unwrap();
        assert_eq!(store.rows("widgets").await, vec![json!({"ID": 1, "Name": "z"})]);

        store
            .delete_where("widgets", &Filter::eq("ID", json!("1")))
            .await
            .unwrap();
        assert!(store.rows("widgets").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_keyless_tables() {
        let store = MemoryStore::new().with_keyless_table("logs");
        assert_eq!(store.primary_key_column("logs").await.unwrap(), None);
        assert!(matches!(
            store.primary_key_column("nope").await,
            Err(StorageError::UnknownTable(_))
        ));
        let page = store.find(PageQuery { index: "nope".into(), ..list_query(&[]) }).await;
        assert!(page.error.is_some());
    }

    #[tokio::test]
    async fn find_filters_orders_and_pages() {
        let store = MemoryStore::new()
            .with_pager(PagerConfig { default_page_size: 2, max_page_size: 10 })
            .with_table("widgets", "ID");
        for name in ["a", "b", "c", "b"] {
            let mut w = instance(json!({"ID": 0, "Name": name}));
            store.create("widgets", &mut w).await.unwrap();
        }

        let page = store.find(list_query(&[])).await;
        assert_eq!(page.total, 4);
        assert_eq!(page.data, vec![json!({"ID": 1, "Name": "a"}), json!({"ID": 2, "Name": "b"})]);

        let page = store.find(list_query(&[("page", "2"), ("order", "desc")])).await;
        assert_eq!(page.data, vec![json!({"ID": 2, "Name": "b"}), json!({"ID": 1, "Name": "a"})]);

        let page = store.find(list_query(&[("Name", "b")])).await;
        assert_eq!(page.total, 2);
    }
}
