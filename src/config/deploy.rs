//! Deployment engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Deployment engine configuration
///
/// All durations are plain seconds in the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// How long a deploy token stays valid, in seconds (default 365 days)
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime: u64,

    /// How many deployments to keep per tool before pruning the oldest
    #[serde(default = "default_max_deployments_retained")]
    pub max_deployments_retained: usize,

    /// Upper bound on the build poll loop, in seconds
    #[serde(default = "default_build_timeout_seconds")]
    pub build_timeout_seconds: u64,

    /// Per-tool cap on deployments in a non-terminal state
    #[serde(default = "default_max_active_deployments")]
    pub max_active_deployments: usize,

    /// After this many seconds a non-terminal deployment is swept to timed_out
    #[serde(default = "default_deployment_timeout")]
    pub deployment_timeout: u64,
}

impl DeployConfig {
    /// Validate deployment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token_lifetime == 0 {
            return Err(ValidationError::MustBePositive("deploy.token_lifetime"));
        }
        if self.max_deployments_retained == 0 {
            return Err(ValidationError::MustBePositive(
                "deploy.max_deployments_retained",
            ));
        }
        if self.build_timeout_seconds == 0 {
            return Err(ValidationError::MustBePositive(
                "deploy.build_timeout_seconds",
            ));
        }
        if self.max_active_deployments == 0 {
            return Err(ValidationError::MustBePositive(
                "deploy.max_active_deployments",
            ));
        }
        if self.deployment_timeout == 0 {
            return Err(ValidationError::MustBePositive("deploy.deployment_timeout"));
        }
        Ok(())
    }

    /// Token lifetime as a chrono duration
    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_lifetime as i64)
    }

    /// Build timeout as a std duration
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_seconds)
    }

    /// Deployment timeout as a chrono duration
    pub fn deployment_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.deployment_timeout as i64)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            token_lifetime: default_token_lifetime(),
            max_deployments_retained: default_max_deployments_retained(),
            build_timeout_seconds: default_build_timeout_seconds(),
            max_active_deployments: default_max_active_deployments(),
            deployment_timeout: default_deployment_timeout(),
        }
    }
}

fn default_token_lifetime() -> u64 {
    // 365 days
    365 * 24 * 60 * 60
}

fn default_max_deployments_retained() -> usize {
    25
}

fn default_build_timeout_seconds() -> u64 {
    1800
}

fn default_max_active_deployments() -> usize {
    1
}

fn default_deployment_timeout() -> u64 {
    // 1 hour
    60 * 60
}
