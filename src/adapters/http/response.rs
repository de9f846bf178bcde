//! The JSON response envelope and error mapping.
//!
//! Every response body is `{ data, messages: { info, warning, error } }`.
//! Successful mutating responses always carry the beta notice warning.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::application::handlers::HandlerError;

/// Warning attached to every successful mutating response.
pub const BETA_NOTICE: &str = "You are using a beta feature of Toolforge.";

/// Per-level message lists of the envelope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseMessages {
    pub info: Vec<String>,
    pub warning: Vec<String>,
    pub error: Vec<String>,
}

/// The response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub messages: ResponseMessages,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data: Some(data),
            messages: ResponseMessages::default(),
        }
    }

    pub fn with_info(mut self, message: impl Into<String>) -> Self {
        self.messages.info.push(message.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.messages.warning.extend(warnings);
        self
    }

    /// Mark this as a mutating response.
    pub fn with_beta_notice(mut self) -> Self {
        self.messages.warning.push(BETA_NOTICE.to_string());
        self
    }

    pub fn ok(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// An envelope with no data and the given error messages.
pub fn error_response(status: StatusCode, errors: Vec<String>) -> Response {
    let envelope = ApiResponse::<()> {
        data: None,
        messages: ResponseMessages {
            info: Vec::new(),
            warning: Vec::new(),
            error: errors,
        },
    };
    (status, Json(envelope)).into_response()
}

/// Map a handler error onto its status code and envelope.
pub fn handler_error_response(error: HandlerError) -> Response {
    let (status, errors) = match error {
        HandlerError::NotFound(message) => (StatusCode::NOT_FOUND, vec![message]),
        HandlerError::Conflict(message) => (StatusCode::CONFLICT, vec![message]),
        HandlerError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, vec![message]),
        HandlerError::BadRequest(message) => (StatusCode::BAD_REQUEST, vec![message]),
        HandlerError::Validation(messages) => (StatusCode::UNPROCESSABLE_ENTITY, messages),
        HandlerError::Internal(message) => {
            tracing::error!(%message, "Internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, vec![message])
        }
    };
    error_response(status, errors)
}
