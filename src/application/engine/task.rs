//! The per-deployment task: build phase, run phase, finalization.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::domain::deployment::{
    BuildProgress, BuildState, Deployment, DeploymentState, RunProgress, RunState,
};
use crate::domain::tool::{BuildSpec, ComponentInfo};
use crate::ports::{component_image_name, Runtime, Storage};

use super::error::{format_run_error, parse_build_error, DeployError};
use super::retry::retry_on_timeout;

/// Builds finish in minutes; two seconds keeps the status fresh without
/// hammering the builds API.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

fn now_utc_string() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// One running deployment. Owns a working copy of the record and persists
/// every state transition through storage.
pub struct DeployTask {
    storage: Arc<dyn Storage>,
    runtime: Arc<dyn Runtime>,
    build_timeout: Duration,
    tool: String,
    deployment: Deployment,
}

impl DeployTask {
    pub fn new(
        storage: Arc<dyn Storage>,
        runtime: Arc<dyn Runtime>,
        build_timeout: Duration,
        tool: String,
        deployment: Deployment,
    ) -> Self {
        Self {
            storage,
            runtime,
            build_timeout,
            tool,
            deployment,
        }
    }

    /// Drive the deployment to a terminal state.
    pub async fn run(mut self) {
        tracing::info!(tool = %self.tool, deploy_id = %self.deployment.deploy_id, "Starting deployment");
        let outcome = self.execute().await;
        self.finalize(outcome).await;
    }

    async fn execute(&mut self) -> Result<(), DeployError> {
        self.deployment.status = DeploymentState::Running;
        self.deployment.long_status = format!("Started at {}", now_utc_string());
        self.persist().await?;

        self.do_build().await?;
        self.do_run().await?;
        Ok(())
    }

    /// Re-read our record and bail out if someone else decided our fate:
    /// a user flagged it `cancelling`, or the sweep timed it out.
    async fn check_lease(&self, raise_cancel: bool) -> Result<(), DeployError> {
        let current = self
            .storage
            .get_deployment(&self.tool, &self.deployment.deploy_id)
            .await?;
        if current.status == DeploymentState::TimedOut {
            return Err(DeployError::LostLease);
        }
        if raise_cancel && current.status == DeploymentState::Cancelling {
            return Err(DeployError::Cancelled);
        }
        Ok(())
    }

    /// Persist the working copy. Observes cancellation first so a cancel
    /// request between steps always wins over further progress.
    async fn persist(&mut self) -> Result<(), DeployError> {
        self.check_lease(true).await?;
        self.storage
            .update_deployment(&self.tool, self.deployment.clone())
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Build phase
    // ------------------------------------------------------------------

    async fn do_build(&mut self) -> Result<(), DeployError> {
        self.check_lease(true).await?;
        tracing::debug!(tool = %self.tool, "Starting builds");

        let components = self.deployment.tool_config.components.clone();
        let mut failed_starts: Vec<String> = Vec::new();

        for (name, component) in &components {
            let progress = match component.build() {
                BuildSpec::Source(source) => {
                    match self
                        .runtime
                        .start_build(&self.tool, name, source, self.deployment.force_build)
                        .await
                    {
                        Ok(progress) => {
                            progress.with_image(component_image_name(&self.tool, name))
                        }
                        Err(error) => {
                            let message = parse_build_error(&error);
                            tracing::error!(
                                tool = %self.tool,
                                component = %name,
                                %error,
                                "Unable to start build"
                            );
                            failed_starts.push(format!("{name}(error:{message})"));
                            BuildProgress::new(BuildProgress::NO_ID_YET, BuildState::Failed, message)
                        }
                    }
                }
                BuildSpec::Reference(reference) => BuildProgress::new(
                    BuildProgress::NO_BUILD_NEEDED,
                    BuildState::Skipped,
                    format!("Component re-uses build from {}", reference.reuse_from),
                )
                .with_image(component_image_name(&self.tool, &reference.reuse_from)),
            };
            self.deployment.builds.insert(name.clone(), progress);
        }

        self.persist().await?;

        if !failed_starts.is_empty() {
            return Err(DeployError::BuildFailed(format!(
                "Some builds failed to start: {}",
                failed_starts.join(" ")
            )));
        }

        tracing::debug!(tool = %self.tool, "Waiting for builds to complete");
        self.poll_builds().await?;

        let failed: Vec<String> = self
            .deployment
            .builds
            .iter()
            .filter(|(_, build)| build.state == BuildState::Failed)
            .map(|(name, build)| format!("{name}(id:{})", build.build_id))
            .collect();
        if !failed.is_empty() {
            return Err(DeployError::BuildFailed(format!(
                "Some builds failed, you can check the build logs for more info: {}",
                failed.join(" ")
            )));
        }

        tracing::debug!(tool = %self.tool, "Builds done");
        Ok(())
    }

    async fn poll_builds(&mut self) -> Result<(), DeployError> {
        let mut pending: Vec<String> = self
            .deployment
            .builds
            .iter()
            .filter(|(_, build)| build.state.is_pending_or_running())
            .map(|(name, _)| name.clone())
            .collect();
        tracing::debug!(tool = %self.tool, count = pending.len(), "Waiting for builds");

        let started = Instant::now();
        while !pending.is_empty() {
            let mut changed = false;
            for name in &pending {
                let previous = self.deployment.builds[name].clone();
                let polled = match self
                    .runtime
                    .get_build_info(&self.tool, &previous.build_id)
                    .await
                {
                    Ok(polled) => polled,
                    // the production adapter folds fetch errors into the
                    // unknown state itself, other runtimes may not
                    Err(error) => BuildProgress::new(
                        previous.build_id.as_str(),
                        BuildState::Unknown,
                        error.to_string(),
                    ),
                };
                tracing::debug!(
                    tool = %self.tool,
                    component = %name,
                    state = %polled.state,
                    "Polled build"
                );
                if polled.state != previous.state {
                    changed = true;
                }
                let image = previous.image.clone();
                let mut updated = polled;
                updated.image = image;
                self.deployment.builds.insert(name.clone(), updated);
            }
            if changed {
                self.persist().await?;
            }

            pending.retain(|name| {
                !matches!(
                    self.deployment.builds[name].state,
                    BuildState::Successful | BuildState::Failed
                )
            });

            self.check_lease(true).await?;

            if started.elapsed() >= self.build_timeout {
                return Err(DeployError::BuildFailed(format!(
                    "Some builds took too long to finish: {}",
                    pending.join(" ")
                )));
            }

            if !pending.is_empty() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Run phase
    // ------------------------------------------------------------------

    async fn do_run(&mut self) -> Result<(), DeployError> {
        let components = self.deployment.tool_config.components.clone();

        for (name, component) in &components {
            self.deployment
                .runs
                .insert(name.clone(), RunProgress::pending());
            self.persist().await?;

            tracing::info!(tool = %self.tool, component = %name, "Deploying component");

            // A reference component runs the image its target built.
            let referent = component.build().reuse_from().unwrap_or(name);
            let image = component_image_name(&self.tool, referent);
            let needs_rerun = self.deployment.force_run
                || self
                    .deployment
                    .builds
                    .get(referent)
                    .map(|build| build.state == BuildState::Successful)
                    .unwrap_or(false);

            let result = self
                .run_component(name, component, &image, needs_rerun)
                .await;

            match result {
                Ok(message) => {
                    self.deployment
                        .runs
                        .insert(name.clone(), RunProgress::new(RunState::Successful, message));
                    self.persist().await?;
                }
                Err(error) => {
                    let message = format_run_error(&error);
                    tracing::error!(
                        tool = %self.tool,
                        component = %name,
                        %error,
                        "Unable to run component"
                    );
                    self.deployment.runs.insert(
                        name.clone(),
                        RunProgress::new(RunState::Failed, message.clone()),
                    );
                    self.persist().await?;
                    return Err(DeployError::RunFailed(message));
                }
            }
        }

        Ok(())
    }

    async fn run_component(
        &self,
        name: &str,
        component: &ComponentInfo,
        image: &str,
        needs_rerun: bool,
    ) -> Result<String, crate::ports::RuntimeError> {
        if needs_rerun {
            retry_on_timeout(|| self.runtime.delete_job_if_exists(&self.tool, name)).await?;
        }

        match component {
            ComponentInfo::Continuous(info) => {
                retry_on_timeout(|| {
                    self.runtime.run_continuous_job(
                        &self.tool,
                        name,
                        &info.run,
                        image,
                        self.deployment.force_run,
                    )
                })
                .await
            }
            ComponentInfo::Scheduled(info) => {
                retry_on_timeout(|| {
                    self.runtime
                        .run_scheduled_job(&self.tool, name, &info.run, image)
                })
                .await
            }
        }
    }

    // ------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------

    async fn finalize(mut self, outcome: Result<(), DeployError>) {
        match outcome {
            Ok(()) => {
                self.deployment.status = DeploymentState::Successful;
                self.deployment.long_status = format!("Finished at {}", now_utc_string());
                tracing::info!(
                    tool = %self.tool,
                    deploy_id = %self.deployment.deploy_id,
                    "Deployment finished"
                );
            }
            Err(DeployError::Cancelled) => {
                self.cancel_builds().await;
                self.skip_unfinished_runs("The deployment was cancelled");
                self.deployment.status = DeploymentState::Cancelled;
                self.deployment.long_status = "Deployment was cancelled".to_string();
                tracing::info!(
                    tool = %self.tool,
                    deploy_id = %self.deployment.deploy_id,
                    "Deployment cancelled"
                );
            }
            Err(DeployError::LostLease) => {
                tracing::warn!(
                    tool = %self.tool,
                    deploy_id = %self.deployment.deploy_id,
                    "Deployment was timed out by the sweep, refusing further writes"
                );
                return;
            }
            Err(error) => {
                self.skip_unfinished_runs("Skipped due to previous failure");
                self.deployment.status = DeploymentState::Failed;
                self.deployment.long_status = format!("Got exception: {error}");
                tracing::error!(
                    tool = %self.tool,
                    deploy_id = %self.deployment.deploy_id,
                    %error,
                    "Deployment failed"
                );
            }
        }

        self.persist_final().await;
    }

    /// Best-effort cancellation of builds still in flight.
    async fn cancel_builds(&mut self) {
        for (name, progress) in self.deployment.builds.iter_mut() {
            if !progress.state.is_pending_or_running() {
                continue;
            }
            if let Err(error) = self.runtime.cancel_build(&self.tool, &progress.build_id).await {
                tracing::warn!(
                    tool = %self.tool,
                    component = %name,
                    build_id = %progress.build_id,
                    %error,
                    "Unable to cancel build"
                );
            }
            progress.state = BuildState::Cancelled;
        }
    }

    /// Every component ends with a terminal run entry, even when the engine
    /// never reached the run phase.
    fn skip_unfinished_runs(&mut self, reason: &str) {
        let components: Vec<String> = self
            .deployment
            .tool_config
            .components
            .keys()
            .cloned()
            .collect();
        for name in components {
            let unfinished = self
                .deployment
                .runs
                .get(&name)
                .map(|run| run.state == RunState::Pending)
                .unwrap_or(true);
            if unfinished {
                self.deployment
                    .runs
                    .insert(name, RunProgress::new(RunState::Skipped, reason));
            }
        }
    }

    /// The final write never raises cancel; it only refuses to overwrite a
    /// record the sweep already timed out or that no longer exists.
    async fn persist_final(&mut self) {
        match self.check_lease(false).await {
            Ok(()) => {
                if let Err(error) = self
                    .storage
                    .update_deployment(&self.tool, self.deployment.clone())
                    .await
                {
                    tracing::error!(
                        tool = %self.tool,
                        deploy_id = %self.deployment.deploy_id,
                        %error,
                        "Unable to persist final deployment state"
                    );
                }
            }
            Err(DeployError::LostLease) => {
                tracing::warn!(
                    tool = %self.tool,
                    deploy_id = %self.deployment.deploy_id,
                    "Deployment was timed out by the sweep, skipping final write"
                );
            }
            Err(error) => {
                tracing::error!(
                    tool = %self.tool,
                    deploy_id = %self.deployment.deploy_id,
                    %error,
                    "Unable to re-read deployment for final write"
                );
            }
        }
    }
}
