//! Toolforge components-api - tool deployment orchestrator.
//!
//! Stores declarative per-tool configurations and drives deployments of their
//! components through a build phase (builds API) and a run phase (jobs API).

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
