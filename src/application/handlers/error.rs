//! Handler-level error taxonomy.
//!
//! Every variant maps 1:1 to an HTTP status; the transport layer does the
//! mapping and puts the messages into the response envelope.

use thiserror::Error;

use crate::domain::tool::ToolConfigError;
use crate::ports::StorageError;

/// Why a request failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 409: conflicting create or illegal state transition
    #[error("{0}")]
    Conflict(String),

    /// 401
    #[error("{0}")]
    Unauthorized(String),

    /// 400: the request itself is unusable (e.g. a failing source_url fetch)
    #[error("{0}")]
    BadRequest(String),

    /// 422: semantic validation failures, all of them
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    /// 500
    #[error("{0}")]
    Internal(String),
}

impl From<StorageError> for HandlerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(message) => HandlerError::NotFound(message),
            StorageError::AlreadyExists(message) => HandlerError::Conflict(message),
            StorageError::Backend(message) => HandlerError::Internal(message),
        }
    }
}

impl From<ToolConfigError> for HandlerError {
    fn from(error: ToolConfigError) -> Self {
        match error {
            ToolConfigError::Malformed(message) => HandlerError::Validation(vec![message]),
            ToolConfigError::Invalid(messages) => HandlerError::Validation(messages),
        }
    }
}
