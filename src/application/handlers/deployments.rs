//! Deployment handlers: create-and-start, read, list, cancel, delete.

use std::sync::Arc;

use crate::application::engine::DeployEngine;
use crate::domain::deployment::{Deployment, DeploymentState};
use crate::ports::Storage;

use super::admission::check_active_deployments_limit;
use super::error::HandlerError;
use super::tool_config::ToolConfigHandlers;

/// Handlers for deployment lifecycle operations.
pub struct DeploymentHandlers {
    storage: Arc<dyn Storage>,
    engine: Arc<DeployEngine>,
    tool_configs: Arc<ToolConfigHandlers>,
    max_active_deployments: usize,
}

impl DeploymentHandlers {
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<DeployEngine>,
        tool_configs: Arc<ToolConfigHandlers>,
        max_active_deployments: usize,
    ) -> Self {
        Self {
            storage,
            engine,
            tool_configs,
            max_active_deployments,
        }
    }

    /// Admit, persist and schedule a new deployment. Returns the pending
    /// record; the engine drives it from a background worker.
    pub async fn create(
        &self,
        tool: &str,
        force_build: bool,
        force_run: bool,
    ) -> Result<Deployment, HandlerError> {
        check_active_deployments_limit(self.storage.as_ref(), tool, self.max_active_deployments)
            .await?;

        // re-fetches from source_url when configured; the deployment runs on
        // the snapshot taken here
        let config = self.tool_configs.get(tool).await?.config;

        tracing::info!(tool, "Creating deployment");
        let deployment = Deployment::new(config, force_build, force_run);
        self.storage
            .create_deployment(tool, deployment.clone())
            .await?;
        tracing::info!(tool, deploy_id = %deployment.deploy_id, "Created deployment");

        // the engine owns the task from here; the handle only matters to tests
        let _ = self.engine.submit(tool.to_string(), deployment.clone());

        Ok(deployment)
    }

    pub async fn get(&self, tool: &str, deploy_id: &str) -> Result<Deployment, HandlerError> {
        tracing::info!(tool, deploy_id, "Retrieving deployment");
        Ok(self.storage.get_deployment(tool, deploy_id).await?)
    }

    pub async fn list(&self, tool: &str) -> Result<Vec<Deployment>, HandlerError> {
        tracing::info!(tool, "Listing deployments");
        Ok(self.storage.list_deployments(tool).await?)
    }

    /// The most recent deployment by creation time.
    pub async fn latest(&self, tool: &str) -> Result<Deployment, HandlerError> {
        let mut deployments = self.storage.list_deployments(tool).await?;
        deployments.sort_by(|a, b| a.creation_time.cmp(&b.creation_time));
        deployments
            .pop()
            .ok_or_else(|| HandlerError::NotFound(format!("No deployments found for tool: {tool}")))
    }

    /// Flag a deployment for cancellation. The engine observes the flag
    /// between steps.
    pub async fn cancel(&self, tool: &str, deploy_id: &str) -> Result<Deployment, HandlerError> {
        tracing::info!(tool, deploy_id, "Cancelling deployment");
        let mut deployment = self.storage.get_deployment(tool, deploy_id).await?;

        if !deployment.status.can_cancel() {
            return Err(HandlerError::Conflict(format!(
                "Deployment can't be cancelled, its state is {}",
                deployment.status
            )));
        }

        deployment.status = DeploymentState::Cancelling;
        self.storage
            .update_deployment(tool, deployment.clone())
            .await?;
        tracing::info!(tool, deploy_id, "Deployment flagged for cancelling");
        Ok(deployment)
    }

    pub async fn delete(&self, tool: &str, deploy_id: &str) -> Result<Deployment, HandlerError> {
        tracing::info!(tool, deploy_id, "Deleting deployment");
        Ok(self.storage.delete_deployment(tool, deploy_id).await?)
    }
}
