//! Request/response DTOs for the tool routes.
//!
//! Domain types serialize directly into the envelope; only the request
//! shapes live here.

use serde::{Deserialize, Serialize};

/// Liveness payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub status: &'static str,
}

impl HealthState {
    pub fn ok() -> Self {
        Self { status: "OK" }
    }
}

/// Optional body of `POST /tool/{tool}/deployment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDeploymentRequest {
    /// Start builds even when a matching finished build exists.
    #[serde(default)]
    pub force_build: bool,

    /// Restart jobs even when their definition did not change.
    #[serde(default)]
    pub force_run: bool,
}

/// Query parameters of `POST /tool/{tool}/deployment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDeploymentQuery {
    /// Deploy token alternative to the gateway header.
    pub token: Option<String>,
}
