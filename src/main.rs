//! components-api entry point.
//!
//! Wiring is explicit: settings are loaded once and every adapter, handler
//! and the engine receive their dependencies through constructors.

use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use components_api::adapters::config_source::UrlConfigFetcher;
use components_api::adapters::http::tool::{routes, ToolHandlers};
use components_api::adapters::runtime::{
    GitCliResolver, GitFileFetcher, ToolforgeRuntime, ToolforgeRuntimeConfig,
};
use components_api::adapters::storage::{
    InMemoryStorage, KubernetesStorage, KubernetesStorageConfig,
};
use components_api::application::engine::{DeployEngine, DEFAULT_WORKER_LIMIT};
use components_api::application::handlers::{
    DeploymentHandlers, GenerateHandlers, TokenHandlers, ToolConfigHandlers,
};
use components_api::config::{AppConfig, StorageType};
use components_api::ports::{Runtime, Storage};

/// Timeout for individual requests against the downstream APIs.
const DOWNSTREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_storage(config: &AppConfig) -> Arc<dyn Storage> {
    match config.storage.storage_type {
        StorageType::Mock => {
            tracing::info!("Using in-memory storage");
            Arc::new(InMemoryStorage::new(
                config.deploy.deployment_timeout(),
                config.deploy.max_deployments_retained,
            ))
        }
        StorageType::Kubernetes => {
            tracing::info!("Using kubernetes storage");
            let client = reqwest::Client::builder()
                .user_agent(config.runtime.user_agent.clone())
                .timeout(DOWNSTREAM_REQUEST_TIMEOUT)
                .danger_accept_invalid_certs(!config.runtime.verify_toolforge_api_cert)
                .build()
                .expect("Failed to create HTTP client");
            Arc::new(KubernetesStorage::new(
                client,
                KubernetesStorageConfig {
                    kubernetes_api_url: config
                        .storage
                        .kubernetes_api_url
                        .clone()
                        .expect("validated at startup"),
                    toolforge_api_url: config.runtime.toolforge_api_url.clone(),
                    deployment_timeout: config.deploy.deployment_timeout(),
                    max_deployments_retained: config.deploy.max_deployments_retained,
                },
            ))
        }
    }
}

fn build_runtime(config: &AppConfig) -> Arc<dyn Runtime> {
    tracing::info!("Using toolforge runtime");
    Arc::new(ToolforgeRuntime::new(
        ToolforgeRuntimeConfig {
            base_url: config.runtime.toolforge_api_url.clone(),
            verify_tls: config.runtime.verify_toolforge_api_cert,
            user_agent: config.runtime.user_agent.clone(),
            timeout: DOWNSTREAM_REQUEST_TIMEOUT,
        },
        Arc::new(GitCliResolver),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::debug!(?config, "Loaded settings");

    let storage = build_storage(&config);
    let runtime = build_runtime(&config);

    let engine = Arc::new(DeployEngine::new(
        Arc::clone(&storage),
        Arc::clone(&runtime),
        config.deploy.build_timeout(),
        DEFAULT_WORKER_LIMIT,
    ));

    let fetch_client = reqwest::Client::builder()
        .user_agent(config.runtime.user_agent.clone())
        .timeout(DOWNSTREAM_REQUEST_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client");
    let tool_configs = Arc::new(ToolConfigHandlers::new(
        Arc::clone(&storage),
        Arc::new(UrlConfigFetcher::new(
            fetch_client,
            GitFileFetcher::new(std::env::temp_dir()),
        )),
    ));

    let handlers = ToolHandlers {
        storage: Arc::clone(&storage),
        tool_configs: Arc::clone(&tool_configs),
        deployments: Arc::new(DeploymentHandlers::new(
            Arc::clone(&storage),
            engine,
            tool_configs,
            config.deploy.max_active_deployments,
        )),
        tokens: Arc::new(TokenHandlers::new(Arc::clone(&storage))),
        generate: Arc::new(GenerateHandlers::new(Arc::clone(&runtime))),
        token_lifetime: config.deploy.token_lifetime(),
    };

    let app = axum::Router::new()
        .nest("/v1", routes(handlers))
        .layer(tower::ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let address = config.server.socket_addr();
    tracing::info!(%address, "Starting components-api");
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
