//! In-memory storage adapter.
//!
//! Keeps everything in process-local maps. Used by tests and the `mock`
//! storage type in development.

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::deployment::{Deployment, DeployToken};
use crate::domain::tool::ToolConfig;
use crate::ports::{is_timed_out, mark_timed_out, retention_victims, Storage, StorageError};

/// In-memory storage for tool configs, deployments and deploy tokens.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    deployment_timeout: chrono::Duration,
    max_deployments_retained: usize,
    tool_configs: Arc<RwLock<HashMap<String, ToolConfig>>>,
    // per tool, keyed by deploy_id, in creation order
    deployments: Arc<RwLock<HashMap<String, IndexMap<String, Deployment>>>>,
    deploy_tokens: Arc<RwLock<HashMap<String, DeployToken>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage with the given sweep and retention
    /// parameters.
    pub fn new(deployment_timeout: chrono::Duration, max_deployments_retained: usize) -> Self {
        Self {
            deployment_timeout,
            max_deployments_retained,
            tool_configs: Arc::new(RwLock::new(HashMap::new())),
            deployments: Arc::new(RwLock::new(HashMap::new())),
            deploy_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Rewrite timed-out deployments of one tool in place.
    async fn sweep(&self, tool: &str) {
        let now = Utc::now();
        let mut deployments = self.deployments.write().await;
        let Some(per_tool) = deployments.get_mut(tool) else {
            return;
        };
        for deployment in per_tool.values_mut() {
            if is_timed_out(deployment, now, self.deployment_timeout) {
                tracing::info!(
                    tool,
                    deploy_id = %deployment.deploy_id,
                    "Sweeping deployment to timed_out"
                );
                mark_timed_out(deployment, self.deployment_timeout);
            }
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_tool_config(&self, tool: &str) -> Result<ToolConfig, StorageError> {
        self.tool_configs
            .read()
            .await
            .get(tool)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("No configuration found for tool: {tool}")))
    }

    async fn set_tool_config(&self, tool: &str, config: ToolConfig) -> Result<(), StorageError> {
        self.tool_configs
            .write()
            .await
            .insert(tool.to_string(), config);
        Ok(())
    }

    async fn delete_tool_config(&self, tool: &str) -> Result<ToolConfig, StorageError> {
        self.tool_configs
            .write()
            .await
            .remove(tool)
            .ok_or_else(|| StorageError::NotFound(format!("No configuration found for tool: {tool}")))
    }

    async fn create_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), StorageError> {
        let mut deployments = self.deployments.write().await;
        let per_tool = deployments.entry(tool.to_string()).or_default();

        if per_tool.contains_key(&deployment.deploy_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Deployment {} already exists for tool: {tool}",
                deployment.deploy_id
            )));
        }
        per_tool.insert(deployment.deploy_id.clone(), deployment);

        let all: Vec<Deployment> = per_tool.values().cloned().collect();
        for victim in retention_victims(&all, self.max_deployments_retained) {
            tracing::debug!(tool, deploy_id = %victim, "Pruning retained deployment");
            per_tool.shift_remove(&victim);
        }
        Ok(())
    }

    async fn get_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, StorageError> {
        self.sweep(tool).await;
        self.deployments
            .read()
            .await
            .get(tool)
            .and_then(|per_tool| per_tool.get(deploy_id))
            .cloned()
            .ok_or_else(|| {
                StorageError::NotFound(format!(
                    "No deployment {deploy_id} found for tool: {tool}"
                ))
            })
    }

    async fn list_deployments(&self, tool: &str) -> Result<Vec<Deployment>, StorageError> {
        self.sweep(tool).await;
        Ok(self
            .deployments
            .read()
            .await
            .get(tool)
            .map(|per_tool| per_tool.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), StorageError> {
        self.sweep(tool).await;
        let mut deployments = self.deployments.write().await;
        let per_tool = deployments.entry(tool.to_string()).or_default();

        match per_tool.get_mut(&deployment.deploy_id) {
            Some(existing) => {
                // deploy_id, creation_time and tool_config never change after
                // creation; keep the stored values whatever the caller sent.
                let mut updated = deployment;
                updated.creation_time = existing.creation_time.clone();
                updated.tool_config = existing.tool_config.clone();
                *existing = updated;
            }
            None => {
                per_tool.insert(deployment.deploy_id.clone(), deployment);
            }
        }
        Ok(())
    }

    async fn delete_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, StorageError> {
        self.deployments
            .write()
            .await
            .get_mut(tool)
            .and_then(|per_tool| per_tool.shift_remove(deploy_id))
            .ok_or_else(|| {
                StorageError::NotFound(format!(
                    "No deployment {deploy_id} found for tool: {tool}"
                ))
            })
    }

    async fn get_deploy_token(&self, tool: &str) -> Result<DeployToken, StorageError> {
        self.deploy_tokens
            .read()
            .await
            .get(tool)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("No deploy token found for tool: {tool}")))
    }

    async fn set_deploy_token(&self, tool: &str, token: DeployToken) -> Result<(), StorageError> {
        self.deploy_tokens
            .write()
            .await
            .insert(tool.to_string(), token);
        Ok(())
    }

    async fn delete_deploy_token(&self, tool: &str) -> Result<DeployToken, StorageError> {
        self.deploy_tokens
            .write()
            .await
            .remove(tool)
            .ok_or_else(|| StorageError::NotFound(format!("No deploy token found for tool: {tool}")))
    }
}
