//! HTTP handlers for the tool routes.
//!
//! Thin translation only: extract, call the application handler, wrap the
//! result in the envelope. Mutating responses carry the beta notice.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;

use crate::application::handlers::{
    ensure_token_or_auth, DeploymentHandlers, GenerateHandlers, TokenHandlers, ToolConfigHandlers,
    TOOL_HEADER,
};
use crate::ports::Storage;

use super::super::middleware::RequireToolHeader;
use super::super::response::{error_response, handler_error_response, ApiResponse};
use super::dto::{CreateDeploymentQuery, CreateDeploymentRequest, HealthState};

/// Shared state of the tool routes.
#[derive(Clone)]
pub struct ToolHandlers {
    pub storage: Arc<dyn Storage>,
    pub tool_configs: Arc<ToolConfigHandlers>,
    pub deployments: Arc<DeploymentHandlers>,
    pub tokens: Arc<TokenHandlers>,
    pub generate: Arc<GenerateHandlers>,
    pub token_lifetime: chrono::Duration,
}

/// GET /healthz
pub async fn healthz() -> Response {
    ApiResponse::new(HealthState::ok()).ok()
}

/// GET /tool/{tool}/config
pub async fn get_tool_config(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.tool_configs.get(&tool).await {
        Ok(validated) => ApiResponse::new(validated.config)
            .with_warnings(validated.warnings)
            .ok(),
        Err(error) => handler_error_response(error),
    }
}

/// POST /tool/{tool}/config
pub async fn update_tool_config(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Json(raw) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                vec![format!("Invalid request body: {}", rejection.body_text())],
            )
        }
    };

    match handlers.tool_configs.update(&tool, &raw).await {
        Ok(validated) => ApiResponse::new(validated.config)
            .with_info(format!("Configuration for {tool} updated successfully."))
            .with_warnings(validated.warnings)
            .with_beta_notice()
            .ok(),
        Err(error) => handler_error_response(error),
    }
}

/// DELETE /tool/{tool}/config
pub async fn delete_tool_config(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.tool_configs.delete(&tool).await {
        Ok(prior) => ApiResponse::new(prior).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}

/// GET /tool/{tool}/config/generate
pub async fn generate_tool_config(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.generate.generate(&tool).await {
        Ok(generated) => ApiResponse::new(generated.config)
            .with_warnings(generated.warnings)
            .ok(),
        Err(error) => handler_error_response(error),
    }
}

/// GET /tool/{tool}/deployment
pub async fn list_deployments(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.deployments.list(&tool).await {
        Ok(deployments) => ApiResponse::new(deployments).ok(),
        Err(error) => handler_error_response(error),
    }
}

/// GET /tool/{tool}/deployment/latest
pub async fn latest_deployment(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.deployments.latest(&tool).await {
        Ok(deployment) => ApiResponse::new(deployment).ok(),
        Err(error) => handler_error_response(error),
    }
}

/// GET /tool/{tool}/deployment/{deploy_id}
pub async fn get_deployment(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path((tool, deploy_id)): Path<(String, String)>,
) -> Response {
    match handlers.deployments.get(&tool, &deploy_id).await {
        Ok(deployment) => ApiResponse::new(deployment).ok(),
        Err(error) => handler_error_response(error),
    }
}

/// POST /tool/{tool}/deployment
///
/// The only route that accepts a deploy token instead of the gateway header.
pub async fn create_deployment(
    State(handlers): State<ToolHandlers>,
    Path(tool): Path<String>,
    Query(query): Query<CreateDeploymentQuery>,
    headers: HeaderMap,
    body: Option<Json<CreateDeploymentRequest>>,
) -> Response {
    let header = headers
        .get(TOOL_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(error) = ensure_token_or_auth(
        handlers.storage.as_ref(),
        &tool,
        header,
        query.token.as_deref(),
        handlers.token_lifetime,
    )
    .await
    {
        return handler_error_response(error);
    }

    let request = body.map(|Json(request)| request).unwrap_or_default();
    match handlers
        .deployments
        .create(&tool, request.force_build, request.force_run)
        .await
    {
        Ok(deployment) => ApiResponse::new(deployment).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}

/// PUT /tool/{tool}/deployment/{deploy_id}/cancel
pub async fn cancel_deployment(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path((tool, deploy_id)): Path<(String, String)>,
) -> Response {
    match handlers.deployments.cancel(&tool, &deploy_id).await {
        Ok(deployment) => ApiResponse::new(deployment).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}

/// DELETE /tool/{tool}/deployment/{deploy_id}
pub async fn delete_deployment(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path((tool, deploy_id)): Path<(String, String)>,
) -> Response {
    match handlers.deployments.delete(&tool, &deploy_id).await {
        Ok(deployment) => ApiResponse::new(deployment).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}

/// GET /tool/{tool}/deployment/token
pub async fn get_deploy_token(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.tokens.get(&tool).await {
        Ok(token) => ApiResponse::new(token).ok(),
        Err(error) => handler_error_response(error),
    }
}

/// POST /tool/{tool}/deployment/token
pub async fn create_deploy_token(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.tokens.create(&tool).await {
        Ok(token) => ApiResponse::new(token).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}

/// PUT /tool/{tool}/deployment/token
pub async fn refresh_deploy_token(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.tokens.refresh(&tool).await {
        Ok(token) => ApiResponse::new(token).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}

/// DELETE /tool/{tool}/deployment/token
pub async fn delete_deploy_token(
    State(handlers): State<ToolHandlers>,
    RequireToolHeader(_caller): RequireToolHeader,
    Path(tool): Path<String>,
) -> Response {
    match handlers.tokens.delete(&tool).await {
        Ok(token) => ApiResponse::new(token).with_beta_notice().ok(),
        Err(error) => handler_error_response(error),
    }
}
