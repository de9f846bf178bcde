//! Authentication strategies.
//!
//! The platform gateway already matches the tool in the path against the
//! caller, so header auth only has to check the header is there. Deployment
//! creation alternatively accepts the tool's deploy token as a query
//! parameter, so a tool's own jobs can trigger deployments.

use crate::ports::Storage;

use super::error::HandlerError;

/// Header the gateway sets after authenticating the caller.
pub const TOOL_HEADER: &str = "x-toolforge-tool";

/// Header-only authentication.
pub fn ensure_authenticated(header: Option<&str>) -> Result<(), HandlerError> {
    match header {
        Some(value) if !value.is_empty() => Ok(()),
        _ => Err(HandlerError::Unauthorized(format!(
            "The '{TOOL_HEADER}' header is required"
        ))),
    }
}

/// Header or deploy-token authentication.
///
/// The token must equal the stored token for the tool and still be within its
/// lifetime.
pub async fn ensure_token_or_auth(
    storage: &dyn Storage,
    tool: &str,
    header: Option<&str>,
    token: Option<&str>,
    token_lifetime: chrono::Duration,
) -> Result<(), HandlerError> {
    if header.map(|value| !value.is_empty()).unwrap_or(false) {
        return Ok(());
    }

    let Some(token) = token else {
        return Err(HandlerError::Unauthorized(format!(
            "The '{TOOL_HEADER}' header or a token are required"
        )));
    };

    let stored = match storage.get_deploy_token(tool).await {
        Ok(stored) => stored,
        Err(_) => {
            return Err(HandlerError::Unauthorized(format!(
                "The token passed '{token}' does not match the tool's token"
            )))
        }
    };

    if !stored.matches(token) {
        tracing::debug!(tool, "Got bad deploy token");
        return Err(HandlerError::Unauthorized(format!(
            "The token passed '{token}' does not match the tool's token"
        )));
    }

    if stored.is_expired(token_lifetime) {
        return Err(HandlerError::Unauthorized(format!(
            "The token passed '{token}' has expired, please create a new one"
        )));
    }

    Ok(())
}
