use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::StoreError;

/// Envelope returned by every `extern "C"` function as a JSON string.
#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "store failure: {msg}"),
            AppResponse::SerializationError(msg) => write!(f, "malformed JSON: {msg}"),
            AppResponse::NotFound(msg) => write!(f, "no such record: {msg}"),
            AppResponse::ValidationError(msg) => write!(f, "rejected record: {msg}"),
            AppResponse::BadRequest(msg) => write!(f, "bad call: {msg}"),
            AppResponse::Ok(payload) => write!(f, "ok: {payload}"),
        }
    }
}

impl From<StoreError> for AppResponse {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Lmdb(lmdb::Error::NotFound) =>
                AppResponse::NotFound("Key not found".to_string()),
            StoreError::Lmdb(lmdb::Error::MapFull) =>
                AppResponse::DatabaseError("Database map is full; raise map_size".to_string()),
            StoreError::Lmdb(e) => AppResponse::DatabaseError(format!("LMDB error: {}", e)),
            StoreError::Io(e) => AppResponse::DatabaseError(format!("IO error: {}", e)),
            StoreError::Serialization(e) => AppResponse::from(e),
            err @ StoreError::InvalidUtf8 { .. } => AppResponse::SerializationError(err.to_string()),
            StoreError::NotAuthenticated =>
                AppResponse::BadRequest("No active session".to_string()),
            err @ StoreError::InvalidRecord { .. } => AppResponse::ValidationError(err.to_string()),
            StoreError::InvalidConfig(msg) => AppResponse::ValidationError(msg),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("{err} ({:?})", err.classify()))
    }
}

impl AppResponse {
    /// A plain status message for calls with no payload, e.g. sign-out.
    pub fn success(status: impl Into<String>) -> Self {
        AppResponse::Ok(status.into())
    }

    /// Serializes `value` and wraps it in [`AppResponse::Ok`].
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => AppResponse::Ok(json),
            Err(e) => AppResponse::from(e),
        }
    }
}
