//! Admission control for deployment creation.

use crate::ports::{Storage, StorageError};

use super::error::HandlerError;

/// Reject a new deployment when the tool already has too many in flight.
///
/// Only applied on deployment creation; the count covers `pending` and
/// `running` deployments.
pub async fn check_active_deployments_limit(
    storage: &dyn Storage,
    tool: &str,
    max_active_deployments: usize,
) -> Result<(), HandlerError> {
    tracing::debug!(tool, "Checking active deployments limit");

    let deployments = match storage.list_deployments(tool).await {
        Ok(deployments) => deployments,
        Err(StorageError::NotFound(_)) => return Ok(()),
        Err(error) => return Err(error.into()),
    };

    let active = deployments
        .iter()
        .filter(|deployment| deployment.status.is_active())
        .count();

    if active >= max_active_deployments {
        tracing::debug!(tool, active, max_active_deployments, "Limit reached");
        return Err(HandlerError::Conflict(format!(
            "There's already {active} active deployments, the limit is \
             {max_active_deployments}. Wait for some deployments to finish. You can also \
             cancel some deployments"
        )));
    }

    Ok(())
}
