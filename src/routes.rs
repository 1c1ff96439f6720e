//! HTTP surface: a catch-all CRUD entry point plus health and version routes.

use crate::request::CrudRequest;
use crate::response::Envelope;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use std::error::Error as _;
use tower_http::limit::RequestBodyLimitLayer;

/// True when the body failed because it outgrew the request body limit.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Any path and verb; the registry decides what exists.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => {
            let status = if is_length_limit(&e) {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            return (status, Envelope::error(e.to_string())).into_response();
        }
    };
    let req = CrudRequest::from_parts(parts.method, &parts.uri, &parts.headers, body);
    state.registry.dispatch(&req).await.into_response()
}

/// CRUD routes for every registered manager, with request bodies capped at `body_limit` bytes.
pub fn crud_routes(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}
