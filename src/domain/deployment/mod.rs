//! Deployment domain module.
//!
//! A deployment is one attempt to reconcile a tool's config: a snapshot of
//! the config, per-component build and run progress, and an overall state
//! that ends in `successful`, `failed`, `cancelled` or `timed_out`.

mod deployment;
mod progress;
mod token;

pub use deployment::{Deployment, DeploymentState, DEPLOY_TIMESTAMP_FORMAT};
pub use progress::{BuildProgress, BuildState, RunProgress, RunState};
pub use token::DeployToken;
