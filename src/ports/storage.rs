//! Storage port (tool configs, deployments, deploy tokens).
//!
//! Two implementations exist behind this contract: an in-memory map for
//! development and tests, and a Kubernetes custom-resource document store.
//! Both run the timeout sweep on every deployment read/list/update and the
//! retention pass on every create, using the pure helpers below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::deployment::{Deployment, DeployToken, DeploymentState};
use crate::domain::tool::ToolConfig;

/// Errors returned by storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A create conflicted with an existing entity.
    #[error("{0}")]
    AlreadyExists(String),

    /// The backend itself failed.
    #[error("{0}")]
    Backend(String),
}

/// Persistence contract for per-tool state.
///
/// Guarantees (shared by all implementations):
/// - `set_tool_config` is an idempotent, atomic upsert.
/// - `create_deployment` fails with [`StorageError::AlreadyExists`] when the
///   deploy id is taken, and prunes retained deployments beyond the cap.
/// - `update_deployment` upserts by deploy id and preserves `deploy_id`,
///   `creation_time` and `tool_config` of an existing record.
/// - Deployment reads, lists and updates first sweep the tool's deployments,
///   rewriting abandoned ones to `timed_out`.
/// - At most one deploy token exists per tool.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_tool_config(&self, tool: &str) -> Result<ToolConfig, StorageError>;

    async fn set_tool_config(&self, tool: &str, config: ToolConfig) -> Result<(), StorageError>;

    /// Deletes the config, returning the prior value.
    async fn delete_tool_config(&self, tool: &str) -> Result<ToolConfig, StorageError>;

    async fn create_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), StorageError>;

    async fn get_deployment(&self, tool: &str, deploy_id: &str)
        -> Result<Deployment, StorageError>;

    /// All deployments of a tool; an empty list is not an error.
    async fn list_deployments(&self, tool: &str) -> Result<Vec<Deployment>, StorageError>;

    async fn update_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), StorageError>;

    /// Deletes a deployment, returning the deleted record.
    async fn delete_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, StorageError>;

    async fn get_deploy_token(&self, tool: &str) -> Result<DeployToken, StorageError>;

    async fn set_deploy_token(&self, tool: &str, token: DeployToken) -> Result<(), StorageError>;

    /// Deletes the token, returning the deleted record.
    async fn delete_deploy_token(&self, tool: &str) -> Result<DeployToken, StorageError>;
}

/// True when the sweep should rewrite this deployment to `timed_out`.
///
/// Only non-terminal deployments older than the timeout qualify; records with
/// an unparseable `creation_time` are treated as infinitely old.
pub fn is_timed_out(deployment: &Deployment, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
    if deployment.status.is_terminal() {
        return false;
    }
    match deployment.created_at() {
        Some(created_at) => created_at + timeout < now,
        None => true,
    }
}

/// Rewrite a deployment the sweep caught to `timed_out`.
pub fn mark_timed_out(deployment: &mut Deployment, timeout: chrono::Duration) {
    deployment.status = DeploymentState::TimedOut;
    deployment.long_status = format!(
        "Deployment timed out, it did not finish within {}s",
        timeout.num_seconds()
    );
}

/// Pick the deploy ids the retention pass should delete.
///
/// Keeps at most `max_retained` deployments: the oldest terminal ones go
/// first, and deployments that are still in flight are never selected even
/// when the tool is over the cap.
pub fn retention_victims(deployments: &[Deployment], max_retained: usize) -> Vec<String> {
    if deployments.len() <= max_retained {
        return Vec::new();
    }
    let excess = deployments.len() - max_retained;

    let mut terminal: Vec<&Deployment> = deployments
        .iter()
        .filter(|d| d.status.is_terminal())
        .collect();
    terminal.sort_by(|a, b| a.creation_time.cmp(&b.creation_time));

    terminal
        .into_iter()
        .take(excess)
        .map(|d| d.deploy_id.clone())
        .collect()
}
