//! The deployment aggregate: one orchestration attempt against a config
//! snapshot.

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::tool::ToolConfig;

use super::progress::{BuildProgress, RunProgress};

/// Timestamp layout shared by `creation_time` and the `deploy_id` prefix.
pub const DEPLOY_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const DEPLOY_ID_SUFFIX_LENGTH: usize = 10;

/// Overall state of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Pending,
    Running,
    Successful,
    Failed,
    /// A user asked for cancellation; the engine has not observed it yet.
    Cancelling,
    Cancelled,
    TimedOut,
}

impl DeploymentState {
    /// Terminal states are never left again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentState::Successful
                | DeploymentState::Failed
                | DeploymentState::Cancelled
                | DeploymentState::TimedOut
        )
    }

    /// Active deployments count against the per-tool admission limit.
    pub fn is_active(&self) -> bool {
        matches!(self, DeploymentState::Pending | DeploymentState::Running)
    }

    /// Only deployments that have not finished can be cancelled.
    pub fn can_cancel(&self) -> bool {
        self.is_active()
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentState::Pending => "pending",
            DeploymentState::Running => "running",
            DeploymentState::Successful => "successful",
            DeploymentState::Failed => "failed",
            DeploymentState::Cancelling => "cancelling",
            DeploymentState::Cancelled => "cancelled",
            DeploymentState::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

/// One deployment of a tool.
///
/// `deploy_id`, `creation_time` and `tool_config` are immutable after
/// creation; storage preserves them on update. The `builds` and `runs` maps
/// mirror the component declaration order of the config snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub deploy_id: String,

    /// UTC creation timestamp, `YYYYMMDD-HHMMSS`.
    pub creation_time: String,

    /// Immutable snapshot of the config this deployment reconciles.
    pub tool_config: ToolConfig,

    #[serde(default)]
    pub builds: IndexMap<String, BuildProgress>,

    #[serde(default)]
    pub runs: IndexMap<String, RunProgress>,

    pub status: DeploymentState,

    pub long_status: String,

    /// Start builds even when a matching finished build exists.
    #[serde(default)]
    pub force_build: bool,

    /// Restart jobs even when their definition did not change.
    #[serde(default)]
    pub force_run: bool,
}

impl Deployment {
    /// A fresh pending deployment for the given config snapshot.
    pub fn new(tool_config: ToolConfig, force_build: bool, force_run: bool) -> Self {
        let now = Utc::now();
        let creation_time = now.format(DEPLOY_TIMESTAMP_FORMAT).to_string();
        // The uuid gives us lowercase hex; enough entropy in ten characters
        // for the handful of deployments a tool creates per second.
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(DEPLOY_ID_SUFFIX_LENGTH)
            .collect();

        Self {
            deploy_id: format!("{creation_time}-{suffix}"),
            creation_time,
            tool_config,
            builds: IndexMap::new(),
            runs: IndexMap::new(),
            status: DeploymentState::Pending,
            long_status: "Not started yet".to_string(),
            force_build,
            force_run,
        }
    }

    /// Parse `creation_time` back into a UTC timestamp.
    ///
    /// Returns `None` for records with a corrupted timestamp; callers treat
    /// those as very old.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.creation_time, DEPLOY_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}
