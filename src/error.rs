//! Typed errors and HTTP mapping.

use crate::response::Envelope;
use crate::validation::ValidationErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use thiserror::Error;

/// Failures of the storage collaborator. Propagated unmodified by managers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors returned by manager operations.
#[derive(Error, Debug)]
pub enum CrudError {
    #[error("only application/json is supported for the time being")]
    UnsupportedMediaType,
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("body must be a JSON object")]
    InvalidBody,
    #[error("parameters invalid")]
    InvalidParams(ValidationErrors),
    #[error("update requires primary key {0}")]
    MissingPrimaryKey(String),
    #[error("operate id can not be empty")]
    MissingId,
    #[error("no primary key found for table {0}")]
    PrimaryKeyNotFound(String),
    #[error("manager is not registered")]
    Unbound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CrudError {
    /// Result value carried alongside the error, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            CrudError::InvalidParams(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CrudError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            CrudError::Decode(_) | CrudError::InvalidBody => StatusCode::BAD_REQUEST,
            CrudError::InvalidParams(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CrudError::MissingPrimaryKey(_) | CrudError::MissingId => StatusCode::BAD_REQUEST,
            CrudError::PrimaryKeyNotFound(_) | CrudError::Unbound => StatusCode::INTERNAL_SERVER_ERROR,
            CrudError::Storage(StorageError::Conflict(_)) => StatusCode::CONFLICT,
            CrudError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Envelope {
            data: self.data().unwrap_or(Value::Null),
            msg: self.to_string(),
        };
        (status, body).into_response()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity table name must not be empty")]
    EmptyName,
    #[error("duplicate route: {0}")]
    DuplicateRoute(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
