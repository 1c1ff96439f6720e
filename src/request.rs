//! Transport-neutral request handed to managers.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct CrudRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl CrudRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        CrudRequest {
            method,
            path: path.into(),
            query: HashMap::new(),
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// Assemble from HTTP parts. Unparseable query strings yield an empty map.
    pub fn from_parts(method: Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Self {
        let query = axum::extract::Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|q| q.0)
            .unwrap_or_default();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        CrudRequest {
            method,
            path: uri.path().to_string(),
            query,
            content_type,
            body,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// JSON body with `Content-Type: application/json`.
    pub fn with_json(mut self, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(mime::APPLICATION_JSON.to_string());
        self.body = body.into();
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body.into();
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// True when the content type's essence is `application/json`; parameters such as charset are ignored.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .map_or(false, |m| m.essence_str() == mime::APPLICATION_JSON.essence_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_and_content_type() {
        let uri: Uri = "/widgets?id=7&page=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        let req = CrudRequest::from_parts(Method::DELETE, &uri, &headers, Bytes::new());
        assert_eq!(req.path, "/widgets");
        assert_eq!(req.query_param("id"), Some("7"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert!(req.is_json());
    }

    #[test]
    fn non_json_content_types() {
        let req = CrudRequest::new(Method::POST, "/w").with_body("text/plain", "x");
        assert!(!req.is_json());
        assert!(!CrudRequest::new(Method::POST, "/w").is_json());
    }
}
