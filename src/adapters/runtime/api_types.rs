//! Wire types of the Toolforge builds and jobs APIs.
//!
//! These shapes stay inside the adapter; the engine and handlers only see the
//! semantic types from the ports layer.

use serde::{Deserialize, Serialize};

use crate::ports::HealthCheckSpec;

/// Status values reported by the builds service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BuildServiceStatus {
    #[serde(rename = "BUILD_PENDING")]
    Pending,
    #[serde(rename = "BUILD_RUNNING")]
    Running,
    #[serde(rename = "BUILD_SUCCESS")]
    Success,
    #[serde(rename = "BUILD_FAILURE")]
    Failure,
    #[serde(rename = "BUILD_CANCELLED")]
    Cancelled,
    #[serde(rename = "BUILD_TIMEOUT")]
    Timeout,
    #[serde(other)]
    Unknown,
}

/// One build as the builds service reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildsBuild {
    pub build_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<BuildServiceStatus>,
    pub resolved_ref: Option<String>,
    pub destination_image: Option<String>,
    pub start_time: Option<String>,
    pub parameters: Option<BuildsBuildParameters>,
}

impl BuildsBuild {
    /// The id under which the build can be polled; older responses used
    /// `name` for it.
    pub fn id(&self) -> Option<&str> {
        self.build_id.as_deref().or(self.name.as_deref())
    }
}

/// The request parameters a build was started with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildsBuildParameters {
    pub source_url: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub image_name: Option<String>,
    pub use_latest_versions: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BuildsListResponse {
    pub builds: Option<Vec<BuildsBuild>>,
}

#[derive(Debug, Deserialize)]
pub struct BuildsGetResponse {
    pub build: BuildsBuildStatusOnly,
}

#[derive(Debug, Deserialize)]
pub struct BuildsBuildStatusOnly {
    pub status: BuildServiceStatus,
}

/// Request body for starting a build.
#[derive(Debug, Serialize)]
pub struct BuildsStartRequest {
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    pub source_url: String,
    pub image_name: String,
    pub envvars: serde_json::Map<String, serde_json::Value>,
    pub use_latest_versions: bool,
}

#[derive(Debug, Deserialize)]
pub struct BuildsStartResponse {
    pub new_build: BuildsNewBuild,
}

#[derive(Debug, Deserialize)]
pub struct BuildsNewBuild {
    pub name: String,
}

/// Request body for the jobs upsert. `None` fields stay off the wire so the
/// jobs service applies its own defaults.
#[derive(Debug, Clone, Serialize)]
pub struct JobsNewJob {
    pub name: String,
    pub cmd: String,
    pub imagename: String,
    pub continuous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

/// One job as the jobs service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsDefinedJob {
    pub name: String,
    pub cmd: String,
    pub image: String,
    #[serde(default)]
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

#[derive(Debug, Deserialize)]
pub struct JobsJobListResponse {
    pub jobs: Option<Vec<JobsDefinedJob>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsJobResponse {
    pub job: Option<JobsDefinedJob>,
    pub messages: Option<JobsResponseMessages>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsResponseMessages {
    pub info: Option<Vec<String>>,
    pub warning: Option<Vec<String>>,
    pub error: Option<Vec<String>>,
}
