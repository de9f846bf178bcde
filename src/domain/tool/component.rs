//! Component declarations inside a tool config.
//!
//! A component is one declarative workload: how to build its image and how to
//! run it. The `component_type` discriminator is persisted and re-read, so the
//! serde representation is part of the storage format.

use serde::{Deserialize, Serialize};

/// Downstream job names are Kubernetes object names, which caps them at 53
/// characters for us.
pub const COMPONENT_NAME_MAX_LENGTH: usize = 53;

/// A single component of a tool, tagged by `component_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "component_type", rename_all = "snake_case")]
pub enum ComponentInfo {
    /// A long-running workload (web service, bot, worker).
    Continuous(ContinuousComponentInfo),
    /// A cron-scheduled workload.
    Scheduled(ScheduledComponentInfo),
}

impl ComponentInfo {
    /// The build declaration of this component.
    pub fn build(&self) -> &BuildSpec {
        match self {
            ComponentInfo::Continuous(info) => &info.build,
            ComponentInfo::Scheduled(info) => &info.build,
        }
    }

    /// The command this component runs.
    pub fn command(&self) -> &str {
        match self {
            ComponentInfo::Continuous(info) => &info.run.command,
            ComponentInfo::Scheduled(info) => &info.run.command,
        }
    }
}

/// A continuous component: build plus long-running job parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousComponentInfo {
    pub build: BuildSpec,
    pub run: ContinuousRunSpec,
}

/// A scheduled component: build plus cron job parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledComponentInfo {
    pub build: BuildSpec,
    pub run: ScheduledRunSpec,
}

/// How a component gets its image: build from source, or re-use the image
/// built by a sibling component.
///
/// Untagged on purpose: the two shapes are disjoint (`repository` vs
/// `reuse_from`) and the YAML users write has no discriminator field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    Source(SourceBuildInfo),
    Reference(SourceBuildReference),
}

impl BuildSpec {
    /// The component this build re-uses, if it is a reference.
    pub fn reuse_from(&self) -> Option<&str> {
        match self {
            BuildSpec::Source(_) => None,
            BuildSpec::Reference(reference) => Some(&reference.reuse_from),
        }
    }
}

/// Build the image from a git repository at a ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBuildInfo {
    /// Git repository URL.
    pub repository: String,

    /// Git ref to build; the builds service resolves `HEAD` when unset.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    /// Ask the builds service to refresh base layers and buildpacks.
    #[serde(default)]
    pub use_latest_versions: bool,
}

/// Re-use the image produced by another component of the same tool.
///
/// The target must define a [`SourceBuildInfo`] itself; chains of references
/// are rejected at validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBuildReference {
    pub reuse_from: String,
}

/// Run parameters for a continuous job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousRunSpec {
    pub command: String,

    /// HTTP health check path. Mutually exclusive with `health_check_script`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_http: Option<String>,

    /// Health check script. Mutually exclusive with `health_check_http`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_script: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filelog: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filelog_stdout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filelog_stderr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
}

impl ContinuousRunSpec {
    /// A run spec with only a command, everything else defaulted.
    pub fn from_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            health_check_http: None,
            health_check_script: None,
            cpu: None,
            memory: None,
            replicas: None,
            port: None,
            emails: None,
            filelog: None,
            filelog_stdout: None,
            filelog_stderr: None,
            mount: None,
        }
    }
}

/// Run parameters for a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRunSpec {
    pub command: String,

    /// Cron-style schedule, required for scheduled components.
    pub schedule: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filelog: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filelog_stdout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filelog_stderr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,

    /// How many times the jobs service retries a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,

    /// Per-run timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

impl ScheduledRunSpec {
    /// A run spec with only a command and schedule, everything else defaulted.
    pub fn from_command_and_schedule(
        command: impl Into<String>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            schedule: schedule.into(),
            cpu: None,
            memory: None,
            emails: None,
            filelog: None,
            filelog_stdout: None,
            filelog_stderr: None,
            mount: None,
            retry: None,
            timeout: None,
        }
    }
}
