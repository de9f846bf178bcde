//! Toolforge runtime adapter.
//!
//! Talks to the builds and jobs APIs behind the Toolforge gateway. All wire
//! handling lives here; callers get [`BuildProgress`] values and
//! human-readable messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::deployment::{BuildProgress, BuildState};
use crate::domain::tool::{ContinuousRunSpec, ScheduledRunSpec, SourceBuildInfo};
use crate::ports::{
    BuildRecord, BuildRecordParameters, HealthCheckSpec, JobRecord, Runtime, RuntimeError,
};

use super::api_types::{
    BuildServiceStatus, BuildsBuild, BuildsGetResponse, BuildsListResponse, BuildsStartRequest,
    BuildsStartResponse, JobsDefinedJob, JobsJobListResponse, JobsJobResponse,
    JobsResponseMessages, JobsNewJob,
};
use super::git::RefResolver;

/// Configuration for the Toolforge runtime adapter.
#[derive(Debug, Clone)]
pub struct ToolforgeRuntimeConfig {
    /// Base URL of the API gateway.
    pub base_url: String,
    /// Whether to verify the gateway's TLS certificate.
    pub verify_tls: bool,
    /// User-Agent header for every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// The production runtime implementation.
pub struct ToolforgeRuntime {
    client: reqwest::Client,
    base_url: String,
    resolver: Arc<dyn RefResolver>,
}

impl ToolforgeRuntime {
    pub fn new(config: ToolforgeRuntimeConfig, resolver: Arc<dyn RefResolver>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url,
            resolver,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Upstream {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("HTTP error")
                    .to_string(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RuntimeError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, RuntimeError> {
        let response = self
            .client
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    /// Find a finished or in-flight build this request could re-use.
    async fn find_matching_build(
        &self,
        tool: &str,
        component: &str,
        build: &SourceBuildInfo,
    ) -> Result<Option<BuildsBuild>, RuntimeError> {
        let listing: BuildsListResponse =
            self.get_json(&format!("/builds/v1/tool/{tool}/builds")).await?;
        let builds = listing.builds.unwrap_or_default();
        tracing::debug!(
            tool,
            component,
            count = builds.len(),
            "Comparing existing builds for skipping"
        );

        let Some(candidate) = pick_matching_build(builds, component, build.use_latest_versions)
        else {
            return Ok(None);
        };

        let git_ref = build.git_ref.as_deref().unwrap_or("HEAD");
        let resolved = self.resolver.resolve(&build.repository, git_ref).await?;
        if resolved.is_empty() {
            return Ok(None);
        }

        if candidate.resolved_ref.as_deref() == Some(resolved.as_str()) {
            tracing::debug!(tool, component, build_id = ?candidate.id(), "Found matching build");
            return Ok(Some(candidate));
        }
        Ok(None)
    }
}

fn transport_error(error: reqwest::Error) -> RuntimeError {
    if error.is_timeout() {
        RuntimeError::Timeout(error.to_string())
    } else {
        RuntimeError::Transport(error.to_string())
    }
}

/// Newest build whose requested image and `use_latest_versions` match.
fn pick_matching_build(
    mut builds: Vec<BuildsBuild>,
    component: &str,
    use_latest_versions: bool,
) -> Option<BuildsBuild> {
    // unset start times sort last
    builds.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    builds.into_iter().find(|candidate| {
        let Some(parameters) = &candidate.parameters else {
            return false;
        };
        parameters.image_name.as_deref() == Some(component)
            && parameters.use_latest_versions.unwrap_or(false) == use_latest_versions
    })
}

fn build_logs_hint(build_id: &str) -> String {
    format!("You can see the logs with `toolforge build logs {build_id}`")
}

fn map_build_status(status: BuildServiceStatus) -> BuildState {
    match status {
        BuildServiceStatus::Pending | BuildServiceStatus::Running => BuildState::Running,
        BuildServiceStatus::Success => BuildState::Successful,
        BuildServiceStatus::Failure
        | BuildServiceStatus::Cancelled
        | BuildServiceStatus::Timeout => BuildState::Failed,
        BuildServiceStatus::Unknown => BuildState::Unknown,
    }
}

/// `[info] (a, b)[warning] (c)` out of the jobs API message block.
fn format_job_messages(messages: &JobsResponseMessages) -> String {
    let mut formatted = String::new();
    for (level, entries) in [
        ("info", &messages.info),
        ("warning", &messages.warning),
        ("error", &messages.error),
    ] {
        if let Some(entries) = entries {
            if !entries.is_empty() {
                formatted.push_str(&format!("[{level}] ({})", entries.join(", ")));
            }
        }
    }
    formatted
}

/// The jobs service tells us when an upsert changed nothing.
fn reports_no_change(messages: &JobsResponseMessages) -> bool {
    messages
        .info
        .iter()
        .flatten()
        .any(|message| message.to_lowercase().contains("no changes"))
}

fn upsert_message(kind: &str, response: &JobsJobResponse) -> String {
    if let Some(job) = &response.job {
        return format!("created {kind} job {}", job.name);
    }
    match &response.messages {
        None => "unable to get job info from the jobs api response".to_string(),
        Some(messages) => format_job_messages(messages),
    }
}

fn continuous_job_request(component: &str, run: &ContinuousRunSpec, image: &str) -> JobsNewJob {
    let health_check = if let Some(path) = &run.health_check_http {
        Some(HealthCheckSpec::Http { path: path.clone() })
    } else {
        run.health_check_script
            .as_ref()
            .map(|script| HealthCheckSpec::Script {
                script: script.clone(),
            })
    };

    JobsNewJob {
        name: component.to_string(),
        cmd: run.command.clone(),
        imagename: image.to_string(),
        continuous: true,
        schedule: None,
        health_check,
        cpu: run.cpu.clone(),
        memory: run.memory.clone(),
        replicas: run.replicas,
        port: run.port,
        emails: run.emails.clone(),
        filelog: run.filelog,
        filelog_stdout: run.filelog_stdout.clone(),
        filelog_stderr: run.filelog_stderr.clone(),
        mount: run.mount.clone(),
        retry: None,
        timeout: None,
    }
}

fn scheduled_job_request(component: &str, run: &ScheduledRunSpec, image: &str) -> JobsNewJob {
    JobsNewJob {
        name: component.to_string(),
        cmd: run.command.clone(),
        imagename: image.to_string(),
        continuous: false,
        schedule: Some(run.schedule.clone()),
        health_check: None,
        cpu: run.cpu.clone(),
        memory: run.memory.clone(),
        replicas: None,
        port: None,
        emails: run.emails.clone(),
        filelog: run.filelog,
        filelog_stdout: run.filelog_stdout.clone(),
        filelog_stderr: run.filelog_stderr.clone(),
        mount: run.mount.clone(),
        retry: run.retry,
        timeout: run.timeout,
    }
}

fn job_record(job: JobsDefinedJob) -> JobRecord {
    JobRecord {
        name: job.name,
        image: job.image,
        command: job.cmd,
        continuous: job.continuous,
        schedule: job.schedule,
        health_check: job.health_check,
        port: job.port,
        replicas: job.replicas,
        cpu: job.cpu,
        memory: job.memory,
        emails: job.emails,
        filelog: job.filelog,
        filelog_stdout: job.filelog_stdout,
        filelog_stderr: job.filelog_stderr,
        mount: job.mount,
        retry: job.retry,
        timeout: job.timeout,
    }
}

fn build_record(build: BuildsBuild) -> BuildRecord {
    BuildRecord {
        build_id: build.id().unwrap_or_default().to_string(),
        destination_image: build.destination_image,
        resolved_ref: build.resolved_ref,
        status: build.status.map(|status| format!("{status:?}")),
        start_time: build.start_time,
        parameters: build.parameters.map(|parameters| BuildRecordParameters {
            source_url: parameters.source_url,
            git_ref: parameters.git_ref,
            image_name: parameters.image_name,
            use_latest_versions: parameters.use_latest_versions,
        }),
    }
}

#[async_trait]
impl Runtime for ToolforgeRuntime {
    async fn start_build(
        &self,
        tool: &str,
        component: &str,
        build: &SourceBuildInfo,
        force: bool,
    ) -> Result<BuildProgress, RuntimeError> {
        if !force {
            if let Some(matching) = self.find_matching_build(tool, component, build).await? {
                let build_id = matching
                    .id()
                    .ok_or_else(|| {
                        RuntimeError::Transport("builds api returned a build without an id".into())
                    })?
                    .to_string();

                match matching.status {
                    Some(BuildServiceStatus::Success) => {
                        tracing::debug!(tool, component, %build_id, "Reusing successful build");
                        return Ok(BuildProgress::new(
                            build_id,
                            BuildState::Skipped,
                            "Reusing existing build",
                        ));
                    }
                    Some(BuildServiceStatus::Pending) | Some(BuildServiceStatus::Running) => {
                        tracing::debug!(tool, component, %build_id, "Following existing build");
                        return Ok(BuildProgress::new(
                            build_id,
                            BuildState::Pending,
                            "Not started yet",
                        ));
                    }
                    _ => {}
                }
            }
        }

        let request = BuildsStartRequest {
            git_ref: build.git_ref.clone(),
            source_url: build.repository.clone(),
            image_name: component.to_string(),
            envvars: serde_json::Map::new(),
            use_latest_versions: build.use_latest_versions,
        };
        let response: BuildsStartResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("/builds/v1/tool/{tool}/builds"),
                &request,
            )
            .await?;

        Ok(BuildProgress::new(
            response.new_build.name,
            BuildState::Pending,
            "Not started yet",
        ))
    }

    async fn get_build_info(
        &self,
        tool: &str,
        build_id: &str,
    ) -> Result<BuildProgress, RuntimeError> {
        let result: Result<BuildsGetResponse, RuntimeError> = self
            .get_json(&format!("/builds/v1/tool/{tool}/builds/{build_id}"))
            .await;

        match result {
            Ok(response) => Ok(BuildProgress::new(
                build_id,
                map_build_status(response.build.status),
                build_logs_hint(build_id),
            )),
            Err(RuntimeError::Upstream { status: 404, .. }) => {
                tracing::warn!(tool, build_id, "Build not found while polling");
                Ok(BuildProgress::new(
                    build_id,
                    BuildState::Failed,
                    format!("build {build_id} not found, maybe it was deleted?"),
                ))
            }
            Err(error) => {
                tracing::error!(tool, build_id, %error, "Unable to fetch build status");
                Ok(BuildProgress::new(
                    build_id,
                    BuildState::Unknown,
                    error.to_string(),
                ))
            }
        }
    }

    async fn cancel_build(&self, tool: &str, build_id: &str) -> Result<(), RuntimeError> {
        let response = self
            .client
            .put(self.url(&format!("/builds/v1/tool/{tool}/builds/{build_id}/cancel")))
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn run_continuous_job(
        &self,
        tool: &str,
        component: &str,
        run: &ContinuousRunSpec,
        image: &str,
        force_restart: bool,
    ) -> Result<String, RuntimeError> {
        let request = continuous_job_request(component, run, image);
        tracing::debug!(tool, component, image, "Upserting continuous job");
        // PATCH on the collection is an upsert
        let response: JobsJobResponse = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("/jobs/v1/tool/{tool}/jobs/"),
                &request,
            )
            .await?;

        let unchanged = response
            .messages
            .as_ref()
            .map(reports_no_change)
            .unwrap_or(false);
        if unchanged && force_restart {
            tracing::debug!(tool, component, "Job unchanged, restarting instead");
            let restart = self
                .client
                .post(self.url(&format!("/jobs/v1/tool/{tool}/jobs/{component}/restart")))
                .send()
                .await
                .map_err(transport_error)?;
            Self::check(restart).await?;
            return Ok(format!("restarted job {component}"));
        }

        Ok(upsert_message("continuous", &response))
    }

    async fn run_scheduled_job(
        &self,
        tool: &str,
        component: &str,
        run: &ScheduledRunSpec,
        image: &str,
    ) -> Result<String, RuntimeError> {
        let request = scheduled_job_request(component, run, image);
        tracing::debug!(tool, component, image, "Upserting scheduled job");
        let response: JobsJobResponse = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("/jobs/v1/tool/{tool}/jobs/"),
                &request,
            )
            .await?;
        Ok(upsert_message("scheduled", &response))
    }

    async fn delete_job_if_exists(
        &self,
        tool: &str,
        component: &str,
    ) -> Result<String, RuntimeError> {
        let listing: JobsJobListResponse =
            self.get_json(&format!("/jobs/v1/tool/{tool}/jobs")).await?;
        let exists = listing
            .jobs
            .iter()
            .flatten()
            .any(|job| job.name == component);

        if !exists {
            tracing::debug!(tool, component, "Job not defined, skipping delete");
            return Ok(String::new());
        }

        tracing::debug!(tool, component, "Deleting job");
        let response = self
            .client
            .delete(self.url(&format!("/jobs/v1/tool/{tool}/jobs/{component}")))
            .send()
            .await
            .map_err(transport_error)?;
        let response: JobsJobResponse =
            Self::check(response).await?.json().await.map_err(transport_error)?;

        Ok(response
            .messages
            .as_ref()
            .map(format_job_messages)
            .unwrap_or_default())
    }

    async fn list_jobs(&self, tool: &str) -> Result<Vec<JobRecord>, RuntimeError> {
        let listing: JobsJobListResponse =
            self.get_json(&format!("/jobs/v1/tool/{tool}/jobs")).await?;
        Ok(listing
            .jobs
            .unwrap_or_default()
            .into_iter()
            .map(job_record)
            .collect())
    }

    async fn list_builds(&self, tool: &str) -> Result<Vec<BuildRecord>, RuntimeError> {
        let listing: BuildsListResponse =
            self.get_json(&format!("/builds/v1/tool/{tool}/builds")).await?;
        Ok(listing
            .builds
            .unwrap_or_default()
            .into_iter()
            .map(build_record)
            .collect())
    }
}
