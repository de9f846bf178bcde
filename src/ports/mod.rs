//! Ports: the contracts between the application core and its adapters.

mod config_source;
mod runtime;
mod storage;

pub use config_source::{ConfigFetchError, ConfigFetcher};
pub use runtime::{
    component_image_name, BuildRecord, BuildRecordParameters, HealthCheckSpec, JobRecord, Runtime,
    RuntimeError,
};
pub use storage::{is_timed_out, mark_timed_out, retention_victims, Storage, StorageError};
