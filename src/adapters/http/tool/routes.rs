//! Route table for the tool API.

use axum::routing::{get, put};
use axum::Router;

use super::handlers::{
    cancel_deployment, create_deploy_token, create_deployment, delete_deploy_token,
    delete_deployment, delete_tool_config, generate_tool_config, get_deploy_token, get_deployment,
    get_tool_config, healthz, latest_deployment, list_deployments, refresh_deploy_token,
    update_tool_config, ToolHandlers,
};

/// All routes; mounted under `/v1` by the binary.
pub fn routes(handlers: ToolHandlers) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/tool/:tool/config",
            get(get_tool_config)
                .post(update_tool_config)
                .delete(delete_tool_config),
        )
        .route("/tool/:tool/config/generate", get(generate_tool_config))
        .route(
            "/tool/:tool/deployment",
            get(list_deployments).post(create_deployment),
        )
        .route("/tool/:tool/deployment/latest", get(latest_deployment))
        .route(
            "/tool/:tool/deployment/token",
            get(get_deploy_token)
                .post(create_deploy_token)
                .put(refresh_deploy_token)
                .delete(delete_deploy_token),
        )
        .route(
            "/tool/:tool/deployment/:deploy_id",
            get(get_deployment).delete(delete_deployment),
        )
        .route(
            "/tool/:tool/deployment/:deploy_id/cancel",
            put(cancel_deployment),
        )
        .with_state(handlers)
}
