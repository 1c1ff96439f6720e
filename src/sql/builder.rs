//! Builds parameterized INSERT, UPDATE, DELETE and paged SELECT statements for a table.
//!
//! Row values are bound as a single JSONB parameter and expanded with
//! `jsonb_populate_record`, so PostgreSQL applies each column's own type.

use crate::driver::{Order, PageRequest};
use serde_json::Value;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `schema.table` names are quoted per part.
pub fn qualified_table(name: &str) -> String {
    name.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Json(Value),
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Param>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, p: Param) -> usize {
        self.params.push(p);
        self.params.len()
    }
}

/// INSERT the given columns from the row document; returns the stored row as JSONB.
pub fn insert(table: &str, columns: &[&str], row: Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let t = qualified_table(table);
    let n = q.push_param(Param::Json(row));
    let cols: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
    let picks: Vec<String> = columns.iter().map(|c| format!("r.{}", quoted(c))).collect();
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} AS t DEFAULT VALUES RETURNING to_jsonb(t)", t)
    } else {
        format!(
            "INSERT INTO {} AS t ({}) SELECT {} FROM jsonb_populate_record(NULL::{}, ${}) AS r RETURNING to_jsonb(t)",
            t,
            cols.join(", "),
            picks.join(", "),
            t,
            n
        )
    };
    q
}

/// UPDATE every given column where `filter_column` (compared as text) equals the filter value.
pub fn update(table: &str, columns: &[&str], row: Value, filter_column: &str, filter_value: String) -> QueryBuf {
    let mut q = QueryBuf::new();
    let t = qualified_table(table);
    let row_param = q.push_param(Param::Json(row));
    let filter_param = q.push_param(Param::Text(filter_value));
    let sets: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = r.{}", quoted(c), quoted(c)))
        .collect();
    q.sql = format!(
        "UPDATE {} AS t SET {} FROM jsonb_populate_record(NULL::{}, ${}) AS r WHERE t.{}::text = ${}",
        t,
        sets.join(", "),
        t,
        row_param,
        quoted(filter_column),
        filter_param
    );
    q
}

/// DELETE where `filter_column` (compared as text) equals the filter value.
pub fn delete(table: &str, filter_column: &str, filter_value: String) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Param::Text(filter_value));
    q.sql = format!(
        "DELETE FROM {} WHERE {}::text = ${}",
        qualified_table(table),
        quoted(filter_column),
        n
    );
    q
}

/// Name of the first primary-key column of a table.
pub fn primary_key_column(table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Param::Text(qualified_table(table)));
    q.sql = format!(
        "SELECT a.attname::text FROM pg_index i \
         JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
         WHERE i.indrelid = ${}::regclass AND i.indisprimary \
         ORDER BY array_position(i.indkey, a.attnum) LIMIT 1",
        n
    );
    q
}

fn where_clause(q: &mut QueryBuf, request: &PageRequest) -> String {
    let mut parts = Vec::new();
    for (col, val) in &request.filters {
        let n = q.push_param(Param::Text(val.clone()));
        parts.push(format!("t.{}::text = ${}", quoted(col), n));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// One page of rows as a JSONB array, ordered by the pagination field.
pub fn select_page(table: &str, pagination_field: &str, request: &PageRequest) -> QueryBuf {
    let mut q = QueryBuf::new();
    let t = qualified_table(table);
    let where_clause = where_clause(&mut q, request);
    let dir = match request.order {
        Order::Asc => "ASC",
        Order::Desc => "DESC",
    };
    let order = format!("t.{} {}", quoted(pagination_field), dir);
    let limit = q.push_param(Param::Int(i64::from(request.page_size)));
    let offset = q.push_param(Param::Int(i64::try_from(request.offset()).unwrap_or(i64::MAX)));
    q.sql = format!(
        "SELECT COALESCE(jsonb_agg(p.doc ORDER BY p.ord), '[]'::jsonb) FROM \
         (SELECT to_jsonb(t) AS doc, row_number() OVER (ORDER BY {}) AS ord FROM {} AS t{} ORDER BY {} LIMIT ${} OFFSET ${}) AS p",
        order, t, where_clause, order, limit, offset
    );
    q
}

/// Row count under the same filters as `select_page`.
pub fn count(table: &str, request: &PageRequest) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(&mut q, request);
    q.sql = format!("SELECT COUNT(*) FROM {} AS t{}", qualified_table(table), where_clause);
    q
}
