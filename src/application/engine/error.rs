//! Engine outcomes.
//!
//! The engine never throws its way out: every phase returns a
//! [`DeployError`] value and the top level matches on it to compute the final
//! deployment state.

use thiserror::Error;

use crate::ports::{RuntimeError, StorageError};

/// Why a deployment did not finish normally.
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    /// A user flagged the deployment as cancelling and the engine observed it.
    #[error("Deployment was cancelled")]
    Cancelled,

    /// The build phase failed; the message is already user-facing.
    #[error("{0}")]
    BuildFailed(String),

    /// The run phase failed for a component.
    #[error("Failed to run some components: {0}")]
    RunFailed(String),

    /// Persisting progress failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// The timeout sweep rewrote this deployment while the engine was still
    /// alive. The engine refuses to resurrect it and stops writing.
    #[error("deployment was timed out by the storage sweep")]
    LostLease,
}

/// Turn a failed build start into a user-facing message.
///
/// Ref-resolution failures carry their own wording; upstream errors expose
/// their `error` array; everything else is reported verbatim with the body.
pub fn parse_build_error(error: &RuntimeError) -> String {
    match error {
        RuntimeError::RefResolution(message) => message.clone(),
        RuntimeError::Upstream { body, .. } => match error.upstream_errors() {
            Some(errors) if !errors.is_empty() => errors.join(", "),
            _ => format!("unexpected {error}: {body}"),
        },
        other => format!("unexpected {other}"),
    }
}

/// Turn a failed job operation into the run's long status,
/// `<reason> (<status>): <joined errors>` for upstream failures.
pub fn format_run_error(error: &RuntimeError) -> String {
    match error {
        RuntimeError::Upstream {
            status, message, ..
        } => match error.upstream_errors() {
            Some(errors) if !errors.is_empty() => {
                format!("{message} ({status}): {}", errors.join(", "))
            }
            _ => format!("{message} ({status})"),
        },
        other => other.to_string(),
    }
}
