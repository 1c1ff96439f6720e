//! Response envelope and rendering of dispatch outcomes.

use crate::registry::Outcome;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NOT_FOUND_BODY: &str = "404 not found";
pub const FORBIDDEN_BODY: &str = "403 forbidden";

/// `{"data": ..., "msg": ...}`; `msg` is empty on success.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub data: Value,
    pub msg: String,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Envelope {
            data,
            msg: String::new(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Envelope {
            data: Value::Null,
            msg: msg.into(),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
            Outcome::Forbidden => (StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response(),
            Outcome::Completed(Ok(data)) => (StatusCode::OK, Envelope::ok(data)).into_response(),
            Outcome::Completed(Err(err)) => err.into_response(),
        }
    }
}
