//! HTTP surface of the tool API.

mod dto;
mod handlers;
mod routes;

pub use dto::{CreateDeploymentQuery, CreateDeploymentRequest, HealthState};
pub use handlers::ToolHandlers;
pub use routes::routes;
