//! Tool configuration domain module.
//!
//! A tool (tenant) stores one declarative [`ToolConfig`] describing its
//! components: what to build and how to run each one. Ingestion validates
//! cross-field rules (build references, health checks, naming) and reports
//! unknown fields as warnings.

mod component;
mod config;
mod validate;

pub use component::{
    BuildSpec, ComponentInfo, ContinuousComponentInfo, ContinuousRunSpec, ScheduledComponentInfo,
    ScheduledRunSpec, SourceBuildInfo, SourceBuildReference, COMPONENT_NAME_MAX_LENGTH,
};
pub use config::{ConfigVersion, ToolConfig};
pub use validate::{
    parse_tool_config, unknown_field_paths, validate_tool_config, ToolConfigError,
    ValidatedToolConfig,
};
