//! The deploy engine: a bounded worker pool running one task per deployment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::domain::deployment::Deployment;
use crate::ports::{Runtime, Storage};

use super::task::DeployTask;

/// Cap on deployments executing at the same time across all tools. Queued
/// deployments stay `pending` until a worker picks them up.
pub const DEFAULT_WORKER_LIMIT: usize = 8;

/// Hands deployments off to background workers.
///
/// Handlers call [`DeployEngine::submit`] and return; the engine owns the
/// concurrency bound and everything the tasks need.
pub struct DeployEngine {
    storage: Arc<dyn Storage>,
    runtime: Arc<dyn Runtime>,
    build_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl DeployEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        runtime: Arc<dyn Runtime>,
        build_timeout: Duration,
        worker_limit: usize,
    ) -> Self {
        Self {
            storage,
            runtime,
            build_timeout,
            permits: Arc::new(Semaphore::new(worker_limit)),
        }
    }

    /// Schedule a deployment for execution and return immediately.
    ///
    /// The handle is only useful to tests; production callers drop it.
    pub fn submit(&self, tool: String, deployment: Deployment) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let runtime = Arc::clone(&self.runtime);
        let build_timeout = self.build_timeout;
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                // the semaphore only closes on shutdown
                Err(_) => return,
            };
            DeployTask::new(storage, runtime, build_timeout, tool, deployment)
                .run()
                .await;
        })
    }
}
