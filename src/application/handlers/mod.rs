//! Application handlers: the logic behind each route group.

mod admission;
mod auth;
mod deployments;
mod error;
mod generate;
mod tokens;
mod tool_config;

pub use admission::check_active_deployments_limit;
pub use auth::{ensure_authenticated, ensure_token_or_auth, TOOL_HEADER};
pub use deployments::DeploymentHandlers;
pub use error::HandlerError;
pub use generate::{GenerateHandlers, GeneratedConfig};
pub use tokens::TokenHandlers;
pub use tool_config::ToolConfigHandlers;
