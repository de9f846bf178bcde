//! Engine scenario tests: full deployments against scripted runtimes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::adapters::storage::InMemoryStorage;
use crate::domain::deployment::{
    BuildProgress, BuildState, Deployment, DeploymentState, RunState,
};
use crate::domain::tool::{
    BuildSpec, ComponentInfo, ContinuousComponentInfo, ContinuousRunSpec, ScheduledRunSpec,
    SourceBuildInfo, SourceBuildReference, ToolConfig,
};
use crate::ports::{
    BuildRecord, JobRecord, Runtime, RuntimeError, Storage,
};

use super::engine::DeployEngine;
use super::task::DeployTask;

const TOOL: &str = "my-tool";

// ---------------------------------------------------------------------------
// Scripted runtime
// ---------------------------------------------------------------------------

struct RunCall {
    component: String,
    image: String,
    force_restart: bool,
}

struct CancelAfter {
    storage: Arc<InMemoryStorage>,
    deploy_id: String,
    polls: u32,
}

/// A runtime whose answers are scripted per component / build id, recording
/// every call it sees.
#[derive(Default)]
struct MockRuntime {
    start_results: Mutex<HashMap<String, Result<BuildProgress, RuntimeError>>>,
    // per build id; the last state is sticky
    poll_states: Mutex<HashMap<String, Vec<BuildState>>>,
    poll_counts: Mutex<HashMap<String, usize>>,
    run_results: Mutex<HashMap<String, Result<String, RuntimeError>>>,
    started_builds: Mutex<Vec<String>>,
    run_calls: Mutex<Vec<RunCall>>,
    deleted_jobs: Mutex<Vec<String>>,
    cancelled_builds: Mutex<Vec<String>>,
    total_polls: AtomicU32,
    cancel_after: Mutex<Option<CancelAfter>>,
}

impl MockRuntime {
    fn new() -> Self {
        Self::default()
    }

    fn with_start_result(self, component: &str, result: Result<BuildProgress, RuntimeError>) -> Self {
        self.start_results
            .lock()
            .unwrap()
            .insert(component.to_string(), result);
        self
    }

    fn with_poll_states(self, build_id: &str, states: Vec<BuildState>) -> Self {
        self.poll_states
            .lock()
            .unwrap()
            .insert(build_id.to_string(), states);
        self
    }

    fn with_run_result(self, component: &str, result: Result<String, RuntimeError>) -> Self {
        self.run_results
            .lock()
            .unwrap()
            .insert(component.to_string(), result);
        self
    }

    fn cancel_deployment_after_polls(
        self,
        storage: Arc<InMemoryStorage>,
        deploy_id: &str,
        polls: u32,
    ) -> Self {
        *self.cancel_after.lock().unwrap() = Some(CancelAfter {
            storage,
            deploy_id: deploy_id.to_string(),
            polls,
        });
        self
    }

    fn run_calls(&self) -> Vec<(String, String, bool)> {
        self.run_calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| {
                (
                    call.component.clone(),
                    call.image.clone(),
                    call.force_restart,
                )
            })
            .collect()
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    async fn start_build(
        &self,
        _tool: &str,
        component: &str,
        _build: &SourceBuildInfo,
        _force: bool,
    ) -> Result<BuildProgress, RuntimeError> {
        self.started_builds
            .lock()
            .unwrap()
            .push(component.to_string());
        if let Some(result) = self.start_results.lock().unwrap().get(component) {
            return result.clone();
        }
        Ok(BuildProgress::new(
            format!("{component}-build"),
            BuildState::Pending,
            "Not started yet",
        ))
    }

    async fn get_build_info(
        &self,
        _tool: &str,
        build_id: &str,
    ) -> Result<BuildProgress, RuntimeError> {
        let total = self.total_polls.fetch_add(1, Ordering::SeqCst) + 1;
        let flip = {
            let guard = self.cancel_after.lock().unwrap();
            guard.as_ref().and_then(|cancel| {
                (total == cancel.polls)
                    .then(|| (Arc::clone(&cancel.storage), cancel.deploy_id.clone()))
            })
        };
        if let Some((storage, deploy_id)) = flip {
            let mut deployment = storage.get_deployment(TOOL, &deploy_id).await.unwrap();
            deployment.status = DeploymentState::Cancelling;
            storage.update_deployment(TOOL, deployment).await.unwrap();
        }

        let state = {
            let states = self.poll_states.lock().unwrap();
            let mut counts = self.poll_counts.lock().unwrap();
            let count = counts.entry(build_id.to_string()).or_insert(0);
            let state = match states.get(build_id) {
                Some(sequence) => sequence[(*count).min(sequence.len() - 1)],
                None => BuildState::Successful,
            };
            *count += 1;
            state
        };

        Ok(BuildProgress::new(
            build_id,
            state,
            format!("You can see the logs with `toolforge build logs {build_id}`"),
        ))
    }

    async fn cancel_build(&self, _tool: &str, build_id: &str) -> Result<(), RuntimeError> {
        self.cancelled_builds
            .lock()
            .unwrap()
            .push(build_id.to_string());
        Ok(())
    }

    async fn run_continuous_job(
        &self,
        _tool: &str,
        component: &str,
        _run: &ContinuousRunSpec,
        image: &str,
        force_restart: bool,
    ) -> Result<String, RuntimeError> {
        self.run_calls.lock().unwrap().push(RunCall {
            component: component.to_string(),
            image: image.to_string(),
            force_restart,
        });
        if let Some(result) = self.run_results.lock().unwrap().get(component) {
            return result.clone();
        }
        Ok(format!("[info] (created continuous job {component})"))
    }

    async fn run_scheduled_job(
        &self,
        _tool: &str,
        component: &str,
        _run: &ScheduledRunSpec,
        image: &str,
    ) -> Result<String, RuntimeError> {
        self.run_calls.lock().unwrap().push(RunCall {
            component: component.to_string(),
            image: image.to_string(),
            force_restart: false,
        });
        if let Some(result) = self.run_results.lock().unwrap().get(component) {
            return result.clone();
        }
        Ok(format!("[info] (created scheduled job {component})"))
    }

    async fn delete_job_if_exists(
        &self,
        _tool: &str,
        component: &str,
    ) -> Result<String, RuntimeError> {
        self.deleted_jobs
            .lock()
            .unwrap()
            .push(component.to_string());
        Ok(String::new())
    }

    async fn list_jobs(&self, _tool: &str) -> Result<Vec<JobRecord>, RuntimeError> {
        Ok(Vec::new())
    }

    async fn list_builds(&self, _tool: &str) -> Result<Vec<BuildRecord>, RuntimeError> {
        Ok(Vec::new())
    }
}

/// Counts writes going through to the wrapped storage.
struct CountingStorage {
    inner: InMemoryStorage,
    updates: AtomicU32,
}

impl CountingStorage {
    fn new() -> Self {
        Self {
            inner: InMemoryStorage::new(chrono::Duration::hours(1), 25),
            updates: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn get_tool_config(
        &self,
        tool: &str,
    ) -> Result<crate::domain::tool::ToolConfig, crate::ports::StorageError> {
        self.inner.get_tool_config(tool).await
    }

    async fn set_tool_config(
        &self,
        tool: &str,
        config: crate::domain::tool::ToolConfig,
    ) -> Result<(), crate::ports::StorageError> {
        self.inner.set_tool_config(tool, config).await
    }

    async fn delete_tool_config(
        &self,
        tool: &str,
    ) -> Result<crate::domain::tool::ToolConfig, crate::ports::StorageError> {
        self.inner.delete_tool_config(tool).await
    }

    async fn create_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), crate::ports::StorageError> {
        self.inner.create_deployment(tool, deployment).await
    }

    async fn get_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, crate::ports::StorageError> {
        self.inner.get_deployment(tool, deploy_id).await
    }

    async fn list_deployments(
        &self,
        tool: &str,
    ) -> Result<Vec<Deployment>, crate::ports::StorageError> {
        self.inner.list_deployments(tool).await
    }

    async fn update_deployment(
        &self,
        tool: &str,
        deployment: Deployment,
    ) -> Result<(), crate::ports::StorageError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_deployment(tool, deployment).await
    }

    async fn delete_deployment(
        &self,
        tool: &str,
        deploy_id: &str,
    ) -> Result<Deployment, crate::ports::StorageError> {
        self.inner.delete_deployment(tool, deploy_id).await
    }

    async fn get_deploy_token(
        &self,
        tool: &str,
    ) -> Result<crate::domain::deployment::DeployToken, crate::ports::StorageError> {
        self.inner.get_deploy_token(tool).await
    }

    async fn set_deploy_token(
        &self,
        tool: &str,
        token: crate::domain::deployment::DeployToken,
    ) -> Result<(), crate::ports::StorageError> {
        self.inner.set_deploy_token(tool, token).await
    }

    async fn delete_deploy_token(
        &self,
        tool: &str,
    ) -> Result<crate::domain::deployment::DeployToken, crate::ports::StorageError> {
        self.inner.delete_deploy_token(tool).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn source_component(command: &str) -> ComponentInfo {
    ComponentInfo::Continuous(ContinuousComponentInfo {
        build: BuildSpec::Source(SourceBuildInfo {
            repository: "https://gitlab.example/x.git".to_string(),
            git_ref: Some("main".to_string()),
            use_latest_versions: false,
        }),
        run: ContinuousRunSpec::from_command(command),
    })
}

fn reference_component(target: &str, command: &str) -> ComponentInfo {
    ComponentInfo::Continuous(ContinuousComponentInfo {
        build: BuildSpec::Reference(SourceBuildReference {
            reuse_from: target.to_string(),
        }),
        run: ContinuousRunSpec::from_command(command),
    })
}

fn single_component_config() -> ToolConfig {
    let mut components = IndexMap::new();
    components.insert("component1".to_string(), source_component("some command"));
    ToolConfig::new(components)
}

fn storage() -> Arc<InMemoryStorage> {
    Arc::new(InMemoryStorage::new(chrono::Duration::hours(1), 25))
}

async fn create_deployment(
    storage: &Arc<InMemoryStorage>,
    config: ToolConfig,
    force_build: bool,
    force_run: bool,
) -> Deployment {
    let deployment = Deployment::new(config, force_build, force_run);
    storage
        .create_deployment(TOOL, deployment.clone())
        .await
        .unwrap();
    deployment
}

async fn run_task(
    storage: &Arc<InMemoryStorage>,
    runtime: &Arc<MockRuntime>,
    deployment: Deployment,
    build_timeout_secs: u64,
) {
    DeployTask::new(
        Arc::clone(storage) as Arc<dyn Storage>,
        Arc::clone(runtime) as Arc<dyn Runtime>,
        std::time::Duration::from_secs(build_timeout_secs),
        TOOL.to_string(),
        deployment,
    )
    .run()
    .await;
}

async fn load(storage: &Arc<InMemoryStorage>, deploy_id: &str) -> Deployment {
    storage.get_deployment(TOOL, deploy_id).await.unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_builds_and_runs_single_component() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new());
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Successful);
    assert!(result.long_status.starts_with("Finished at"));

    let build = &result.builds["component1"];
    assert_eq!(build.state, BuildState::Successful);
    assert_eq!(build.build_id, "component1-build");
    assert_eq!(build.image.as_deref(), Some("tool-my-tool/component1:latest"));

    let run = &result.runs["component1"];
    assert_eq!(run.state, RunState::Successful);
    assert_eq!(run.long_status, "[info] (created continuous job component1)");

    // the build ran, so the old job was removed before the upsert
    assert_eq!(*runtime.deleted_jobs.lock().unwrap(), vec!["component1"]);
    assert_eq!(
        runtime.run_calls(),
        vec![(
            "component1".to_string(),
            "tool-my-tool/component1:latest".to_string(),
            false
        )]
    );
}

#[tokio::test]
async fn reused_build_skips_delete_and_still_upserts() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new().with_start_result(
        "component1",
        Ok(BuildProgress::new(
            "existing-build",
            BuildState::Skipped,
            "Reusing existing build",
        )),
    ));
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Successful);
    let build = &result.builds["component1"];
    assert_eq!(build.state, BuildState::Skipped);
    assert_eq!(build.build_id, "existing-build");
    assert_eq!(build.long_status, "Reusing existing build");

    // nothing was rebuilt, so the job is upserted in place
    assert!(runtime.deleted_jobs.lock().unwrap().is_empty());
    assert_eq!(result.runs["component1"].state, RunState::Successful);
}

#[tokio::test]
async fn build_failure_fails_the_deployment_and_skips_runs() {
    let storage = storage();
    let runtime = Arc::new(
        MockRuntime::new().with_poll_states("component1-build", vec![BuildState::Failed]),
    );
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Failed);
    assert!(result.long_status.contains(
        "Some builds failed, you can check the build logs for more info: component1(id:component1-build)"
    ));
    assert_eq!(result.builds["component1"].state, BuildState::Failed);

    let run = &result.runs["component1"];
    assert_eq!(run.state, RunState::Skipped);
    assert_eq!(run.long_status, "Skipped due to previous failure");
    assert!(runtime.run_calls().is_empty());
}

#[tokio::test]
async fn failed_build_start_collects_the_component() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new().with_start_result(
        "component1",
        Err(RuntimeError::Upstream {
            status: 400,
            message: "Bad request".to_string(),
            body: r#"{"error":["no quota left"]}"#.to_string(),
        }),
    ));
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Failed);
    assert!(result
        .long_status
        .contains("Some builds failed to start: component1(error:no quota left)"));

    let build = &result.builds["component1"];
    assert_eq!(build.build_id, BuildProgress::NO_ID_YET);
    assert_eq!(build.state, BuildState::Failed);
    assert_eq!(build.long_status, "no quota left");
    assert_eq!(result.runs["component1"].state, RunState::Skipped);
}

#[tokio::test(start_paused = true)]
async fn build_timeout_fails_the_deployment() {
    let storage = storage();
    let runtime = Arc::new(
        MockRuntime::new().with_poll_states("component1-build", vec![BuildState::Running]),
    );
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 10).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Failed);
    assert!(result
        .long_status
        .contains("Some builds took too long to finish: component1"));
    assert_eq!(result.runs["component1"].state, RunState::Skipped);
    assert!(runtime.run_calls().is_empty());
    // 10s budget at one poll per 2s tick
    assert!(runtime.total_polls.load(Ordering::SeqCst) <= 7);
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_build_cancels_builds_and_skips_runs() {
    let storage = storage();
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();
    let runtime = Arc::new(
        MockRuntime::new()
            .with_poll_states("component1-build", vec![BuildState::Running])
            .cancel_deployment_after_polls(Arc::clone(&storage), &deploy_id, 3),
    );

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Cancelled);
    assert_eq!(result.long_status, "Deployment was cancelled");
    assert_eq!(result.builds["component1"].state, BuildState::Cancelled);
    assert_eq!(
        *runtime.cancelled_builds.lock().unwrap(),
        vec!["component1-build"]
    );

    let run = &result.runs["component1"];
    assert_eq!(run.state, RunState::Skipped);
    assert_eq!(run.long_status, "The deployment was cancelled");
    assert!(runtime.run_calls().is_empty());
}

#[tokio::test]
async fn reference_component_reuses_the_parent_image() {
    let storage = storage();
    let mut components = IndexMap::new();
    components.insert("parent".to_string(), source_component("parent command"));
    components.insert(
        "child".to_string(),
        reference_component("parent", "child command"),
    );
    let deployment =
        create_deployment(&storage, ToolConfig::new(components), false, false).await;
    let deploy_id = deployment.deploy_id.clone();
    let runtime = Arc::new(MockRuntime::new());

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Successful);

    let child_build = &result.builds["child"];
    assert_eq!(child_build.build_id, BuildProgress::NO_BUILD_NEEDED);
    assert_eq!(child_build.state, BuildState::Skipped);
    assert_eq!(child_build.long_status, "Component re-uses build from parent");

    // only the parent ever talks to the builds service
    assert_eq!(*runtime.started_builds.lock().unwrap(), vec!["parent"]);

    // both jobs run the parent's image
    let calls = runtime.run_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, "tool-my-tool/parent:latest");
    assert_eq!(calls[1].1, "tool-my-tool/parent:latest");

    // the parent's build ran, so the child job is recreated as well
    assert_eq!(
        *runtime.deleted_jobs.lock().unwrap(),
        vec!["parent", "child"]
    );
}

#[tokio::test]
async fn run_failure_records_the_parsed_upstream_message() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new().with_run_result(
        "component1",
        Err(RuntimeError::Upstream {
            status: 400,
            message: "Bad request".to_string(),
            body: r#"{"error":["Ayayayay!"]}"#.to_string(),
        }),
    ));
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Failed);
    assert_eq!(
        result.long_status,
        "Got exception: Failed to run some components: Bad request (400): Ayayayay!"
    );
    let run = &result.runs["component1"];
    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.long_status, "Bad request (400): Ayayayay!");
}

#[tokio::test]
async fn first_run_failure_skips_later_components() {
    let storage = storage();
    let mut components = IndexMap::new();
    components.insert(
        "failed-component".to_string(),
        source_component("my-command"),
    );
    components.insert(
        "successful-component".to_string(),
        source_component("my-command"),
    );
    let deployment =
        create_deployment(&storage, ToolConfig::new(components), false, false).await;
    let deploy_id = deployment.deploy_id.clone();
    let runtime = Arc::new(MockRuntime::new().with_run_result(
        "failed-component",
        Err(RuntimeError::Transport("Ayayayay!".to_string())),
    ));

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Failed);
    assert_eq!(result.runs["failed-component"].state, RunState::Failed);

    let skipped = &result.runs["successful-component"];
    assert_eq!(skipped.state, RunState::Skipped);
    assert_eq!(skipped.long_status, "Skipped due to previous failure");

    // runs are serial: the second component is never attempted
    let calls = runtime.run_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "failed-component");
}

#[tokio::test]
async fn force_run_recreates_and_restarts_unchanged_jobs() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new().with_start_result(
        "component1",
        Ok(BuildProgress::new(
            "existing-build",
            BuildState::Skipped,
            "Reusing existing build",
        )),
    ));
    let deployment = create_deployment(&storage, single_component_config(), false, true).await;
    let deploy_id = deployment.deploy_id.clone();

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Successful);
    // even with the build skipped, force_run deletes and re-upserts
    assert_eq!(*runtime.deleted_jobs.lock().unwrap(), vec!["component1"]);
    assert_eq!(
        runtime.run_calls(),
        vec![(
            "component1".to_string(),
            "tool-my-tool/component1:latest".to_string(),
            true
        )]
    );
}

#[tokio::test]
async fn swept_deployment_is_never_resurrected() {
    let storage = storage();
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    let mut swept = deployment.clone();
    swept.status = DeploymentState::TimedOut;
    swept.long_status = "Deployment timed out, it did not finish within 3600s".to_string();
    storage.update_deployment(TOOL, swept).await.unwrap();

    let runtime = Arc::new(MockRuntime::new());
    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::TimedOut);
    assert_eq!(
        result.long_status,
        "Deployment timed out, it did not finish within 3600s"
    );
    assert!(runtime.started_builds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn engine_submit_hands_off_to_a_worker() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new());
    let deployment = create_deployment(&storage, single_component_config(), false, false).await;
    let deploy_id = deployment.deploy_id.clone();

    let engine = DeployEngine::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::clone(&runtime) as Arc<dyn Runtime>,
        std::time::Duration::from_secs(1800),
        2,
    );
    let handle = engine.submit(TOOL.to_string(), deployment);
    handle.await.unwrap();

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Successful);
}

#[tokio::test(start_paused = true)]
async fn poll_loop_persists_only_on_state_change() {
    let storage = Arc::new(CountingStorage::new());
    let runtime = Arc::new(MockRuntime::new().with_poll_states(
        "component1-build",
        vec![
            BuildState::Running,
            BuildState::Running,
            BuildState::Running,
            BuildState::Successful,
        ],
    ));

    let deployment = Deployment::new(single_component_config(), false, false);
    let deploy_id = deployment.deploy_id.clone();
    storage
        .create_deployment(TOOL, deployment.clone())
        .await
        .unwrap();

    DeployTask::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::clone(&runtime) as Arc<dyn Runtime>,
        std::time::Duration::from_secs(1800),
        TOOL.to_string(),
        deployment,
    )
    .run()
    .await;

    let result = storage.get_deployment(TOOL, &deploy_id).await.unwrap();
    assert_eq!(result.status, DeploymentState::Successful);

    // one write each for: engine start, the build-start map, the two poll
    // sweeps that saw a state change, the pending run, the finished run and
    // the final state. The two unchanged poll sweeps write nothing.
    assert_eq!(storage.updates.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn engine_runs_deployments_in_parallel() {
    let storage = storage();
    let runtime = Arc::new(MockRuntime::new());
    let engine = DeployEngine::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::clone(&runtime) as Arc<dyn Runtime>,
        std::time::Duration::from_secs(1800),
        4,
    );

    let mut deploy_ids = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let deployment =
            create_deployment(&storage, single_component_config(), false, false).await;
        deploy_ids.push(deployment.deploy_id.clone());
        handles.push(engine.submit(TOOL.to_string(), deployment));
    }
    futures::future::join_all(handles).await;

    for deploy_id in deploy_ids {
        let result = load(&storage, &deploy_id).await;
        assert_eq!(result.status, DeploymentState::Successful);
    }
}

#[tokio::test]
async fn scheduled_components_run_as_scheduled_jobs() {
    let storage = storage();
    let mut components = IndexMap::new();
    components.insert(
        "nightly".to_string(),
        ComponentInfo::Scheduled(crate::domain::tool::ScheduledComponentInfo {
            build: BuildSpec::Source(SourceBuildInfo {
                repository: "https://gitlab.example/x.git".to_string(),
                git_ref: None,
                use_latest_versions: false,
            }),
            run: ScheduledRunSpec::from_command_and_schedule("run-report", "0 2 * * *"),
        }),
    );
    let deployment =
        create_deployment(&storage, ToolConfig::new(components), false, false).await;
    let deploy_id = deployment.deploy_id.clone();
    let runtime = Arc::new(MockRuntime::new());

    run_task(&storage, &runtime, deployment, 1800).await;

    let result = load(&storage, &deploy_id).await;
    assert_eq!(result.status, DeploymentState::Successful);
    assert_eq!(
        result.runs["nightly"].long_status,
        "[info] (created scheduled job nightly)"
    );
}
