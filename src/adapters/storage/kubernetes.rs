//! Kubernetes custom-resource storage adapter.
//!
//! Persists tool configs, deployments and deploy tokens as `toolforge.org/v1`
//! custom objects in the tool's namespace, using the cluster API only as a
//! document store. Updates are delete-then-create so nothing ever needs to
//! compute a patch. Deploy tokens are additionally mirrored into the tool's
//! envvars so jobs can call their own deploy endpoint.
//!
//! The HTTP client is injected; certificate and service-account wiring happen
//! where the client is built.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::deployment::{Deployment, DeployToken};
use crate::domain::tool::ToolConfig;
use crate::ports::{is_timed_out, mark_timed_out, retention_victims, Storage, StorageError};

const API_GROUP_VERSION: &str = "toolforge.org/v1";
const DEPLOY_TOKEN_ENVVAR: &str = "TOOL_DEPLOY_TOKEN";

/// Wiring for the Kubernetes storage backend.
#[derive(Debug, Clone)]
pub struct KubernetesStorageConfig {
    /// Kubernetes API server base URL.
    pub kubernetes_api_url: String,
    /// Toolforge API gateway base URL, for the envvars mirror.
    pub toolforge_api_url: String,
    /// Sweep threshold for abandoned deployments.
    pub deployment_timeout: chrono::Duration,
    /// Retention cap applied on deployment creation.
    pub max_deployments_retained: usize,
}

/// Storage backed by Kubernetes custom resources.
pub struct KubernetesStorage {
    client: reqwest::Client,
    config: KubernetesStorageConfig,
}

fn tool_namespace(tool: &str) -> String {
    format!("tool-{tool}")
}

fn tool_config_name(tool: &str) -> String {
    format!("{tool}-config")
}

fn to_document(kind: &str, name: &str, spec: &impl Serialize) -> Value {
    json!({
        "apiVersion": API_GROUP_VERSION,
        "kind": kind,
        "metadata": {"name": name},
        "spec": serde_json::to_value(spec).expect("spec serialization cannot fail"),
    })
}

impl KubernetesStorage {
    pub fn new(client: reqwest::Client, config: KubernetesStorageConfig) -> Self {
        Self { client, config }
    }

    fn collection_url(&self, tool: &str, plural: &str) -> String {
        format!(
            "{}/apis/{API_GROUP_VERSION}/namespaces/{}/{plural}",
            self.config.kubernetes_api_url,
            tool_namespace(tool)
        )
    }

    fn object_url(&self, tool: &str, plural: &str, name: &str) -> String {
        format!("{}/{name}", self.collection_url(tool, plural))
    }

    async fn get_spec<T: DeserializeOwned>(
        &self,
        tool: &str,
        plural: &str,
        name: &str,
        missing: impl FnOnce() -> String,
    ) -> Result<T, StorageError> {
        let response = self
            .client
            .get(self.object_url(tool, plural, name))
            .send()
            .await
            .map_err(|error| StorageError::Backend(error.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(missing())),
            status if status.is_success() => {
                let object: Value = response
                    .json()
                    .await
                    .map_err(|error| StorageError::Backend(error.to_string()))?;
                serde_json::from_value(object["spec"].clone())
                    .map_err(|error| StorageError::Backend(error.to_string()))
            }
            status => Err(StorageError::Backend(format!(
                "Unexpected status {status} loading {plural}/{name} for tool {tool}"
            ))),
        }
    }

    async fn list_specs<T: DeserializeOwned>(
        &self,
        tool: &str,
        plural: &str,
    ) -> Result<Vec<T>, StorageError> {
        let response = self
            .client
            .get(self.collection_url(tool, plural))
            .send()
            .await
            .map_err(|error| StorageError::Backend(error.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let listing: Value = response
                    .json()
                    .await
                    .map_err(|error| StorageError::Backend(error.to_string()))?;
                let items = listing["items"].as_array().cloned().unwrap_or_default();
                items
                    .into_iter()
                    .map(|item| {
                        serde_json::from_value(item["spec"].clone())
                            .map_err(|error| StorageError::Backend(error.to_string()))
                    })
                    .collect()
            }
            status => Err(StorageError::Backend(format!(
                "Unexpected status {status} listing {plural} for tool {tool}"
            ))),
        }
    }

    async fn create_object(
        &self,
        tool: &str,
        plural: &str,
        body: &Value,
    ) -> Result<(), StorageError> {
        let name = body["metadata"]["name"].as_str().unwrap_or_default();
        let response = self
            .client
            .post(self.collection_url(tool, plural))
            .json(body)
            .send()
            .await
            .map_err(|error| StorageError::Backend(error.to_string()))?;

        match response.status() {
            StatusCode::CONFLICT => Err(StorageError::AlreadyExists(format!(
                "{plural}/{name} already exists for tool: {tool}"
            ))),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(format!(
                "Unable to find namespace {} for tool {tool}",
                tool_namespace(tool)
            ))),
            status if status.is_success() => Ok(()),
            status => Err(StorageError::Backend(format!(
                "Unexpected status {status} creating {plural}/{name} for tool {tool}"
            ))),
        }
    }

    async fn delete_object(&self, tool: &str, plural: &str, name: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.object_url(tool, plural, name))
            .send()
            .await
            .map_err(|error| StorageError::Backend(error.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(format!(
                "Unable to find {plural}/{name} for tool {tool}"
            ))),
            status if status.is_success() => Ok(()),
            status => Err(StorageError::Backend(format!(
                "Unexpected status {status} deleting {plural}/{name} for tool {tool}"
            ))),
        }
    }

    /// Upsert by delete-then-create; losing the race to another writer is a
    /// backend error, last writer wins everywhere else.
    async fn replace_object(
        &self,
        tool: &str,
        plural: &str,
        name: &str,
        body: &Value,
    ) -> Result<(), StorageError> {
        match self.create_object(tool, plural, body).await {
            Err(StorageError::AlreadyExists(_)) => {
                self.delete_object(tool, plural, name).await?;
                self.create_object(tool, plural, body).await
            }
            other => other,
        }
    }

    /// Rewrite timed-out deployments before any deployment read.
    async fn sweep(&self, tool: &str) -> Result<(), StorageError> {
        let now = Utc::now();
        let deployments: Vec<Deployment> = self.list_specs(tool, "tooldeployments").await?;
        for mut deployment in deployments {
            if is_timed_out(&deployment, now, self.config.deployment_timeout) {
                tracing::info!(
                    tool,
                    deploy_id = %deployment.deploy_id,
                    "Sweeping deployment to timed_out"
                );
                mark_timed_out(&mut deployment, self.config.deployment_timeout);
                let body = to_document("ToolDeployment", &deployment.deploy_id, &deployment);
                self.replace_object(tool, "tooldeployments", &deployment.deploy_id, &body)
                    .await?;
            }
        }
        Ok(())
    }

    async fn set_deploy_token_envvar(
        &self,
        tool: &str,
        token: &DeployToken,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(format!(
                "{}/envvars/v1/tool/{tool}/envvars",
                self.config.toolforge_api_url
            ))
            .json(&json!({
                "name": DEPLOY_TOKEN_ENVVAR,
                "value": token.token.to_string(),
            }))
            .send()
            .await
            .map_err(|error| StorageError::Backend(error.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Backend(format!(
                "Unable to mirror deploy token envvar for tool {tool}: got {}",
                response.status()
            )));
        }
        tracing::debug!(tool, "Deploy token envvar set");
        Ok(())
    }

    async fn delete_deploy_token_envvar(&self, tool: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!(
                "{}/envvars/v1/tool/{tool}/envvars/{DEPLOY_TOKEN_ENVVAR}",
                self.config.toolforge_api_url
            ))
            .send()
            .await
            .map_err(|error| StorageError::Backend(error.to_string()))?;

        // the envvar being gone already is fine
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(StorageError::Backend(format!(
                "Unable to remove deploy token envvar for tool {tool}: got {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for KubernetesStorage {
    async fn get_tool_config(&self, tool: &str) -> Result<ToolConfig, StorageError> {
        self.get_spec(tool, "toolconfigs", &tool_config_name(tool), || {
            format!("No configuration found for tool: {tool}")
        })
        .await
    }

    async fn set_tool_config(&self, tool: &str, config: ToolConfig) -> Result<(), StorageError> {
        let name = tool_config_name(tool);
        let body = to_document("ToolConfig", &name, &config);
        self.replace_object(tool, "toolconfigs", &name, &body).await
    }

    async fn delete_tool_config(&self, tool: &str) -> Result<ToolConfig, StorageError> {
        let prior = self.get_tool_config(tool).await?;
        self.delete_object(tool, "toolconfigs", &tool_config_name(tool))
            .await?;
        Ok(prior)
    }

    async fn create_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), StorageError> {
        let body = to_document("ToolDeployment", &deployment.deploy_id, &deployment);
        self.create_object(tool, "tooldeployments", &body).await?;

        let all: Vec<Deployment> = self.list_specs(tool, "tooldeployments").await?;
        for victim in retention_victims(&all, self.config.max_deployments_retained) {
            tracing::debug!(tool, deploy_id = %victim, "Pruning retained deployment");
            // best effort: a concurrent delete losing the race is fine
            if let Err(error) = self.delete_object(tool, "tooldeployments", &victim).await {
                tracing::warn!(tool, deploy_id = %victim, %error, "Retention delete failed");
            }
        }
        Ok(())
    }

    async fn get_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, StorageError> {
        self.sweep(tool).await?;
        self.get_spec(tool, "tooldeployments", deploy_id, || {
            format!("No deployment {deploy_id} found for tool: {tool}")
        })
        .await
    }

    async fn list_deployments(&self, tool: &str) -> Result<Vec<Deployment>, StorageError> {
        self.sweep(tool).await?;
        self.list_specs(tool, "tooldeployments").await
    }

    async fn update_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), StorageError> {
        self.sweep(tool).await?;

        let mut updated = deployment;
        match self
            .get_spec::<Deployment>(tool, "tooldeployments", &updated.deploy_id, String::new)
            .await
        {
            Ok(existing) => {
                updated.creation_time = existing.creation_time;
                updated.tool_config = existing.tool_config;
            }
            Err(StorageError::NotFound(_)) => {}
            Err(error) => return Err(error),
        }

        let body = to_document("ToolDeployment", &updated.deploy_id, &updated);
        self.replace_object(tool, "tooldeployments", &updated.deploy_id, &body)
            .await
    }

    async fn delete_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, StorageError> {
        let deployment = self
            .get_spec(tool, "tooldeployments", deploy_id, || {
                format!("No deployment {deploy_id} found for tool: {tool}")
            })
            .await?;
        self.delete_object(tool, "tooldeployments", deploy_id)
            .await?;
        Ok(deployment)
    }

    async fn get_deploy_token(&self, tool: &str) -> Result<DeployToken, StorageError> {
        self.get_spec(tool, "deploytokens", tool, || {
            format!("No deploy token found for tool: {tool}")
        })
        .await
    }

    async fn set_deploy_token(&self, tool: &str, token: DeployToken) -> Result<(), StorageError> {
        let body = to_document("DeployToken", tool, &token);
        self.replace_object(tool, "deploytokens", tool, &body)
            .await?;
        self.set_deploy_token_envvar(tool, &token).await
    }

    async fn delete_deploy_token(&self, tool: &str) -> Result<DeployToken, StorageError> {
        let token = self.get_deploy_token(tool).await?;
        self.delete_object(tool, "deploytokens", tool).await?;
        self.delete_deploy_token_envvar(tool).await?;
        Ok(token)
    }
}
