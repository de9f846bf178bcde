//! Storage backend configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Which storage backend to use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory storage, for development and tests
    #[default]
    Mock,
    /// Kubernetes custom-resource document store
    Kubernetes,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage backend selection
    #[serde(default)]
    pub storage_type: StorageType,

    /// Kubernetes API server URL (required for the kubernetes backend)
    pub kubernetes_api_url: Option<String>,

    /// Namespace the API itself runs in
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl StorageConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.storage_type == StorageType::Kubernetes {
            match &self.kubernetes_api_url {
                None => {
                    return Err(ValidationError::MissingRequired(
                        "storage.kubernetes_api_url",
                    ))
                }
                Some(url) if !url.starts_with("https://") && !url.starts_with("http://") => {
                    return Err(ValidationError::InvalidUrl {
                        setting: "storage.kubernetes_api_url",
                        url: url.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            kubernetes_api_url: None,
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "components-api".to_string()
}
