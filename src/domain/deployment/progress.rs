//! Per-component build and run progress inside a deployment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single component's build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Pending,
    Running,
    Successful,
    Failed,
    Cancelled,
    Skipped,
    Unknown,
}

impl BuildState {
    /// True while the build still needs polling.
    pub fn is_pending_or_running(&self) -> bool {
        matches!(self, BuildState::Pending | BuildState::Running)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildState::Pending => "pending",
            BuildState::Running => "running",
            BuildState::Successful => "successful",
            BuildState::Failed => "failed",
            BuildState::Cancelled => "cancelled",
            BuildState::Skipped => "skipped",
            BuildState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Build progress of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProgress {
    /// Id assigned by the builds service, or one of the sentinels below.
    pub build_id: String,

    pub state: BuildState,

    /// Human-readable detail, e.g. where to find the build logs.
    pub long_status: String,

    /// Image the component will run, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl BuildProgress {
    /// Sentinel id for components that never need a build of their own.
    pub const NO_BUILD_NEEDED: &'static str = "no-build-needed";

    /// Sentinel id for builds that failed before the service assigned one.
    pub const NO_ID_YET: &'static str = "no-id-yet";

    pub fn new(
        build_id: impl Into<String>,
        state: BuildState,
        long_status: impl Into<String>,
    ) -> Self {
        Self {
            build_id: build_id.into(),
            state,
            long_status: long_status.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// State of a single component's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Successful,
    Failed,
    Skipped,
    Unknown,
}

impl RunState {
    /// True once the run reached an end state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Successful | RunState::Failed | RunState::Skipped
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Successful => "successful",
            RunState::Failed => "failed",
            RunState::Skipped => "skipped",
            RunState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Run progress of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub state: RunState,
    pub long_status: String,
}

impl RunProgress {
    pub fn new(state: RunState, long_status: impl Into<String>) -> Self {
        Self {
            state,
            long_status: long_status.into(),
        }
    }

    pub fn pending() -> Self {
        Self::new(RunState::Pending, "Not started yet")
    }
}
