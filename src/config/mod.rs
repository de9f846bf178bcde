//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `COMPONENTS_API` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use components_api::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod deploy;
mod error;
mod runtime;
mod server;
mod storage;

pub use deploy::DeployConfig;
pub use error::{ConfigError, ValidationError};
pub use runtime::{RuntimeConfig, RuntimeType};
pub use server::ServerConfig;
pub use storage::{StorageConfig, StorageType};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration (bind address, log level)
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Downstream runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Deployment engine limits and timeouts
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `COMPONENTS_API` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `COMPONENTS_API__SERVER__PORT=8000` -> `server.port = 8000`
    /// - `COMPONENTS_API__DEPLOY__BUILD_TIMEOUT_SECONDS=1800`
    ///   -> `deploy.build_timeout_seconds = 1800`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("COMPONENTS_API")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.runtime.validate()?;
        self.deploy.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("COMPONENTS_API__SERVER__PORT");
        env::remove_var("COMPONENTS_API__STORAGE__STORAGE_TYPE");
        env::remove_var("COMPONENTS_API__DEPLOY__MAX_ACTIVE_DEPLOYMENTS");
        env::remove_var("COMPONENTS_API__RUNTIME__TOOLFORGE_API_URL");
    }

    #[test]
    fn test_load_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().expect("load failed");

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.storage_type, StorageType::Mock);
        assert_eq!(config.deploy.max_active_deployments, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("COMPONENTS_API__SERVER__PORT", "9999");
        env::set_var("COMPONENTS_API__DEPLOY__MAX_ACTIVE_DEPLOYMENTS", "3");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("load failed");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.deploy.max_active_deployments, 3);
    }

    #[test]
    fn test_storage_type_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("COMPONENTS_API__STORAGE__STORAGE_TYPE", "kubernetes");
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("load failed");
        assert_eq!(config.storage.storage_type, StorageType::Kubernetes);
        // kubernetes backend requires an API URL
        assert!(config.validate().is_err());
    }
}
