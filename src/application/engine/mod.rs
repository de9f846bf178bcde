//! The deployment engine.
//!
//! One background task per deployment drives it through the build phase
//! (start, de-dupe, poll, time out) and the run phase (delete/upsert jobs
//! with bounded retries), persisting every transition. Cancellation is
//! observed between steps by re-reading the record; outcomes are values, not
//! exceptions.

mod engine;
mod error;
mod retry;
mod task;

#[cfg(test)]
mod tests;

pub use engine::{DeployEngine, DEFAULT_WORKER_LIMIT};
pub use error::{format_run_error, parse_build_error, DeployError};
pub use retry::{retry_on_timeout, INITIAL_DELAY, MAX_ATTEMPTS};
pub use task::DeployTask;
