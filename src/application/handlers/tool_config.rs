//! Tool config handlers: read (with source_url re-fetch), upsert, delete.

use std::sync::Arc;

use crate::domain::tool::{parse_tool_config, ToolConfig, ValidatedToolConfig};
use crate::ports::{ConfigFetcher, Storage};

use super::error::HandlerError;

/// Handlers for the per-tool config document.
pub struct ToolConfigHandlers {
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn ConfigFetcher>,
}

impl ToolConfigHandlers {
    pub fn new(storage: Arc<dyn Storage>, fetcher: Arc<dyn ConfigFetcher>) -> Self {
        Self { storage, fetcher }
    }

    /// Read the stored config. When it points at a `source_url`, the remote
    /// document replaces the stored one before it is returned.
    pub async fn get(&self, tool: &str) -> Result<ValidatedToolConfig, HandlerError> {
        tracing::info!(tool, "Retrieving config");
        let config = self.storage.get_tool_config(tool).await.map_err(|error| {
            tracing::warn!(tool, %error, "Config not found");
            HandlerError::from(error)
        })?;

        let Some(source_url) = config.source_url.clone() else {
            return Ok(ValidatedToolConfig {
                config,
                warnings: Vec::new(),
            });
        };

        tracing::info!(tool, %source_url, "Re-fetching config from source_url");
        let fetched = self.fetch_config_from_url(&source_url).await?;
        self.storage
            .set_tool_config(tool, fetched.config.clone())
            .await?;
        tracing::info!(tool, "Config re-updated from source_url");
        Ok(fetched)
    }

    /// Validate and store a new config document.
    pub async fn update(
        &self,
        tool: &str,
        raw: &serde_json::Value,
    ) -> Result<ValidatedToolConfig, HandlerError> {
        tracing::info!(tool, "Modifying config");
        let validated = parse_tool_config(raw)?;
        self.storage
            .set_tool_config(tool, validated.config.clone())
            .await?;
        tracing::info!(tool, "Config updated successfully");
        Ok(validated)
    }

    pub async fn delete(&self, tool: &str) -> Result<ToolConfig, HandlerError> {
        tracing::info!(tool, "Deleting config");
        let prior = self.storage.delete_tool_config(tool).await?;
        tracing::info!(tool, "Config deleted successfully");
        Ok(prior)
    }

    async fn fetch_config_from_url(&self, url: &str) -> Result<ValidatedToolConfig, HandlerError> {
        let bad_request = |error: String| {
            tracing::error!(url, %error, "Unable to re-fetch config");
            HandlerError::BadRequest(format!(
                "Unable to retrieve config from source url {url}: {error}"
            ))
        };

        let body = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|error| bad_request(error.to_string()))?;
        parse_fetched_yaml(&body).map_err(|error| bad_request(error.to_string()))
    }
}

/// Parse a YAML document fetched from a `source_url` with the same rules as a
/// posted config.
fn parse_fetched_yaml(body: &str) -> Result<ValidatedToolConfig, HandlerError> {
    let value: serde_json::Value = serde_yaml::from_str(body)
        .map_err(|error| HandlerError::BadRequest(format!("invalid yaml: {error}")))?;
    Ok(parse_tool_config(&value)?)
}
