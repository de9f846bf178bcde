//! Runtime (downstream Toolforge APIs) configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Which runtime façade to use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    /// The Toolforge builds/jobs/envvars API gateway
    #[default]
    Toolforge,
}

/// Runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Runtime selection
    #[serde(default)]
    pub runtime_type: RuntimeType,

    /// Base URL of the Toolforge API gateway
    #[serde(default = "default_toolforge_api_url")]
    pub toolforge_api_url: String,

    /// Whether to verify the gateway's TLS certificate
    #[serde(default = "default_verify_cert")]
    pub verify_toolforge_api_cert: bool,

    /// User-Agent header sent on every downstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl RuntimeConfig {
    /// Validate runtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.toolforge_api_url.starts_with("https://")
            && !self.toolforge_api_url.starts_with("http://")
        {
            return Err(ValidationError::InvalidUrl {
                setting: "runtime.toolforge_api_url",
                url: self.toolforge_api_url.clone(),
            });
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_type: RuntimeType::Toolforge,
            toolforge_api_url: default_toolforge_api_url(),
            verify_toolforge_api_cert: default_verify_cert(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_toolforge_api_url() -> String {
    "https://api.svc.toolforge.org".to_string()
}

fn default_verify_cert() -> bool {
    true
}

fn default_user_agent() -> String {
    "Toolforge components-api".to_string()
}
