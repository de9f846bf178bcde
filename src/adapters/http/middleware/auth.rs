//! Authentication extractor for axum.
//!
//! The platform gateway authenticates callers and sets the
//! `x-toolforge-tool` header; routes that require it use the
//! [`RequireToolHeader`] extractor and get a 401 envelope otherwise.

use axum::extract::FromRequestParts;
use axum::response::Response;
use http::request::Parts;

use crate::application::handlers::{ensure_authenticated, TOOL_HEADER};

use super::super::response::handler_error_response;

/// Extractor that requires the gateway tool header.
///
/// The contained value is the calling tool's name.
#[derive(Debug, Clone)]
pub struct RequireToolHeader(pub String);

impl<S> FromRequestParts<S> for RequireToolHeader
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let header = parts
            .headers
            .get(TOOL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Box::pin(async move {
            match ensure_authenticated(header.as_deref()) {
                Ok(()) => Ok(RequireToolHeader(header.unwrap_or_default())),
                Err(error) => Err(handler_error_response(error)),
            }
        })
    }
}
