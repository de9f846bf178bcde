//! Config generation: infer a ToolConfig skeleton from the jobs and builds a
//! tool already has. Read-only diagnostic.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::domain::tool::{
    BuildSpec, ComponentInfo, ContinuousComponentInfo, ContinuousRunSpec, ScheduledComponentInfo,
    ScheduledRunSpec, SourceBuildInfo, ToolConfig,
};
use crate::ports::{BuildRecord, HealthCheckSpec, JobRecord, Runtime};

use super::error::HandlerError;

/// Returned when no component can be derived from the runtime state, so users
/// still get something they can start editing.
static EXAMPLE_CONFIG: Lazy<ToolConfig> = Lazy::new(|| {
    serde_yaml::from_str(
        r#"
config_version: v1beta1
components:
  example-component:
    component_type: continuous
    build:
      repository: https://gitlab.example.org/your-tool.git
      ref: main
    run:
      command: your-command
"#,
    )
    .expect("example config must parse")
});

/// A generated config plus the per-job notes collected along the way.
#[derive(Debug, Clone)]
pub struct GeneratedConfig {
    pub config: ToolConfig,
    pub warnings: Vec<String>,
}

/// Handler deriving a config from the runtime's current jobs and builds.
pub struct GenerateHandlers {
    runtime: Arc<dyn Runtime>,
}

impl GenerateHandlers {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }

    pub async fn generate(&self, tool: &str) -> Result<GeneratedConfig, HandlerError> {
        tracing::info!(tool, "Generating config from runtime state");
        let jobs = self
            .runtime
            .list_jobs(tool)
            .await
            .map_err(|error| HandlerError::Internal(error.to_string()))?;
        let builds = self
            .runtime
            .list_builds(tool)
            .await
            .map_err(|error| HandlerError::Internal(error.to_string()))?;

        let mut warnings = Vec::new();
        let mut components = IndexMap::new();
        for job in jobs {
            match component_for_job(&job, &builds) {
                Ok(component) => {
                    components.insert(job.name, component);
                }
                Err(warning) => warnings.push(warning),
            }
        }

        if components.is_empty() {
            tracing::debug!(tool, "No components could be generated, using the example");
            warnings.push(
                "No build-service based jobs found, returning an example config".to_string(),
            );
            return Ok(GeneratedConfig {
                config: EXAMPLE_CONFIG.clone(),
                warnings,
            });
        }

        Ok(GeneratedConfig {
            config: ToolConfig::new(components),
            warnings,
        })
    }
}

/// Derive one component from a defined job, or explain why it can't be done.
fn component_for_job(job: &JobRecord, builds: &[BuildRecord]) -> Result<ComponentInfo, String> {
    let build = build_for_job(job, builds).ok_or_else(|| {
        format!(
            "Job {} seems not to be a build-service based job (or no build found for it), \
             skipping",
            job.name
        )
    })?;

    if job.continuous {
        Ok(ComponentInfo::Continuous(ContinuousComponentInfo {
            build: BuildSpec::Source(build),
            run: continuous_run_for_job(job),
        }))
    } else {
        let Some(schedule) = job.schedule.clone() else {
            return Err(format!(
                "Job {} is neither continuous nor scheduled, it's not supported yet, skipping",
                job.name
            ));
        };
        Ok(ComponentInfo::Scheduled(ScheduledComponentInfo {
            build: BuildSpec::Source(build),
            run: scheduled_run_for_job(job, schedule),
        }))
    }
}

/// The build whose output image the job runs, if there is one.
fn build_for_job(job: &JobRecord, builds: &[BuildRecord]) -> Option<SourceBuildInfo> {
    let matching = builds.iter().find(|build| {
        build
            .destination_image
            .as_deref()
            .map(|image| image.ends_with(&job.image))
            .unwrap_or(false)
    })?;

    let parameters = matching.parameters.as_ref()?;
    let repository = parameters.source_url.clone()?;

    Some(SourceBuildInfo {
        repository,
        git_ref: Some(parameters.git_ref.clone().unwrap_or_else(|| "HEAD".to_string())),
        use_latest_versions: parameters.use_latest_versions.unwrap_or(false),
    })
}

/// The jobs service prepends its launcher to the command it reports back.
fn job_command(job: &JobRecord) -> String {
    match job.command.split_once("launcher ") {
        Some((_, rest)) => rest.to_string(),
        None => job.command.clone(),
    }
}

fn continuous_run_for_job(job: &JobRecord) -> ContinuousRunSpec {
    let mut run = ContinuousRunSpec::from_command(job_command(job));
    match &job.health_check {
        Some(HealthCheckSpec::Http { path }) => run.health_check_http = Some(path.clone()),
        Some(HealthCheckSpec::Script { script }) => {
            run.health_check_script = Some(script.clone())
        }
        None => {}
    }
    run.cpu = job.cpu.clone();
    run.memory = job.memory.clone();
    run.replicas = job.replicas;
    run.port = job.port;
    run.emails = job.emails.clone();
    run.filelog = job.filelog;
    run.filelog_stdout = job.filelog_stdout.clone();
    run.filelog_stderr = job.filelog_stderr.clone();
    run.mount = job.mount.clone();
    run
}

fn scheduled_run_for_job(job: &JobRecord, schedule: String) -> ScheduledRunSpec {
    let mut run = ScheduledRunSpec::from_command_and_schedule(job_command(job), schedule);
    run.cpu = job.cpu.clone();
    run.memory = job.memory.clone();
    run.emails = job.emails.clone();
    run.filelog = job.filelog;
    run.filelog_stdout = job.filelog_stdout.clone();
    run.filelog_stderr = job.filelog_stderr.clone();
    run.mount = job.mount.clone();
    run.retry = job.retry;
    run.timeout = job.timeout;
    run
}
