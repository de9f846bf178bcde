//! Runtime port: the façade over the downstream builds and jobs APIs.
//!
//! The deployment engine only ever sees these operations; the wire formats of
//! the downstream services stay inside the adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::deployment::BuildProgress;
use crate::domain::tool::{ContinuousRunSpec, ScheduledRunSpec, SourceBuildInfo};

/// Errors surfaced by runtime operations.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// Resolving a git ref failed; the message is already user-facing.
    #[error("{0}")]
    RefResolution(String),

    /// The downstream API answered with a 4xx/5xx. Never retried.
    #[error("{message} ({status})")]
    Upstream {
        status: u16,
        message: String,
        body: String,
    },

    /// The downstream API did not answer in time. The only retryable class.
    #[error("timed out talking to the api: {0}")]
    Timeout(String),

    /// Connection-level or serialization failure.
    #[error("{0}")]
    Transport(String),
}

impl RuntimeError {
    /// Only read-timeouts are safe to retry blindly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RuntimeError::Timeout(_))
    }

    /// The JSON `error` array of an upstream body, if there is one.
    pub fn upstream_errors(&self) -> Option<Vec<String>> {
        let RuntimeError::Upstream { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let errors = value.get("error")?.as_array()?;
        Some(
            errors
                .iter()
                .filter_map(|e| e.as_str().map(str::to_string))
                .collect(),
        )
    }
}

/// The image a component's build produces.
///
/// This convention is authoritative; nothing parses image names back out of
/// downstream responses.
pub fn component_image_name(tool: &str, component: &str) -> String {
    format!("tool-{tool}/{component}:latest")
}

/// A build known to the builds service (read model for config generation and
/// build de-duplication).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildRecord {
    pub build_id: String,
    pub destination_image: Option<String>,
    pub resolved_ref: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<String>,
    pub parameters: Option<BuildRecordParameters>,
}

/// The request parameters a build was started with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildRecordParameters {
    pub source_url: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub image_name: Option<String>,
    pub use_latest_versions: Option<bool>,
}

/// A job defined in the jobs service (read model for config generation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    pub image: String,
    pub command: String,
    pub continuous: bool,
    pub schedule: Option<String>,
    pub health_check: Option<HealthCheckSpec>,
    pub port: Option<u16>,
    pub replicas: Option<u32>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub emails: Option<String>,
    pub filelog: Option<bool>,
    pub filelog_stdout: Option<String>,
    pub filelog_stderr: Option<String>,
    pub mount: Option<String>,
    pub retry: Option<u32>,
    pub timeout: Option<u32>,
}

/// Health check of a continuous job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HealthCheckSpec {
    Http { path: String },
    Script { script: String },
}

/// Semantic operations against the downstream cluster APIs.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Start (or re-use) a build for a component.
    ///
    /// Unless `force` is set, an existing build for the same component whose
    /// resolved ref and `use_latest_versions` match is re-used: `skipped` when
    /// it already succeeded, `pending` when it is still going.
    async fn start_build(
        &self,
        tool: &str,
        component: &str,
        build: &SourceBuildInfo,
        force: bool,
    ) -> Result<BuildProgress, RuntimeError>;

    /// Current state of a build. A 404 maps to `failed` (someone may have
    /// deleted the build), any other error to `unknown`.
    async fn get_build_info(&self, tool: &str, build_id: &str)
        -> Result<BuildProgress, RuntimeError>;

    /// Best-effort cancellation of a running build.
    async fn cancel_build(&self, tool: &str, build_id: &str) -> Result<(), RuntimeError>;

    /// Upsert a continuous job. When the upsert reports no change and
    /// `force_restart` is set, the job is restarted instead. Returns a
    /// human-readable message for the run's long status.
    async fn run_continuous_job(
        &self,
        tool: &str,
        component: &str,
        run: &ContinuousRunSpec,
        image: &str,
        force_restart: bool,
    ) -> Result<String, RuntimeError>;

    /// Upsert a scheduled job. Returns a human-readable message.
    async fn run_scheduled_job(
        &self,
        tool: &str,
        component: &str,
        run: &ScheduledRunSpec,
        image: &str,
    ) -> Result<String, RuntimeError>;

    /// Delete a job if the jobs service knows it; no-op otherwise.
    async fn delete_job_if_exists(
        &self,
        tool: &str,
        component: &str,
    ) -> Result<String, RuntimeError>;

    async fn list_jobs(&self, tool: &str) -> Result<Vec<JobRecord>, RuntimeError>;

    async fn list_builds(&self, tool: &str) -> Result<Vec<BuildRecord>, RuntimeError>;
}
