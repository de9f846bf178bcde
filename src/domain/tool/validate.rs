//! Tool config ingestion: unknown-field detection and semantic validation.
//!
//! Parsing happens in three steps so that callers get everything at once:
//! unknown fields are collected as warnings from the raw value, the value is
//! parsed into the typed model, and cross-field rules are checked on the
//! result. Unknown fields never fail a request; semantic violations fail it
//! with every offending component named.

use serde_json::Value;
use thiserror::Error;

use super::component::{ComponentInfo, COMPONENT_NAME_MAX_LENGTH};
use super::config::ToolConfig;

/// Why a tool config was rejected.
#[derive(Debug, Error)]
pub enum ToolConfigError {
    /// The document does not parse into the typed model at all.
    #[error("Invalid tool config: {0}")]
    Malformed(String),

    /// The document parsed but violates semantic rules.
    #[error("Invalid tool config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// A parsed config plus the unknown-field warnings collected on the way.
#[derive(Debug, Clone)]
pub struct ValidatedToolConfig {
    pub config: ToolConfig,
    pub warnings: Vec<String>,
}

/// Parse and validate a raw config document.
pub fn parse_tool_config(value: &Value) -> Result<ValidatedToolConfig, ToolConfigError> {
    let warnings = unknown_field_paths(value)
        .into_iter()
        .map(|path| format!("Unknown field '{path}'"))
        .collect();

    let config: ToolConfig = serde_json::from_value(value.clone())
        .map_err(|error| ToolConfigError::Malformed(error.to_string()))?;

    let errors = validate_tool_config(&config);
    if !errors.is_empty() {
        return Err(ToolConfigError::Invalid(errors));
    }

    Ok(ValidatedToolConfig { config, warnings })
}

/// Check the cross-field rules of an already-typed config.
///
/// Returns every violation, not just the first.
pub fn validate_tool_config(config: &ToolConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.components.is_empty() {
        errors.push("A tool config needs at least one component".to_string());
    }

    for (name, component) in &config.components {
        if !is_valid_component_name(name) {
            errors.push(format!(
                "Component name '{name}' must be a lowercase alphanumeric label \
                 (dashes allowed, max {COMPONENT_NAME_MAX_LENGTH} characters)"
            ));
        }

        if let ComponentInfo::Continuous(info) = component {
            if info.run.health_check_http.is_some() && info.run.health_check_script.is_some() {
                errors.push(format!(
                    "Component '{name}' can only set one of health_check_http or \
                     health_check_script"
                ));
            }
        }

        if let Some(target) = component.build().reuse_from() {
            match config.components.get(target) {
                None => errors.push(format!(
                    "Component '{name}' re-uses build from unknown component '{target}'"
                )),
                Some(target_component) => {
                    if target_component.build().reuse_from().is_some() {
                        errors.push(format!(
                            "Component '{name}' re-uses build from '{target}', which does \
                             not define its own build source"
                        ));
                    }
                }
            }
        }
    }

    errors
}

/// True if the name fits the downstream job-name constraint (DNS label
/// subset).
fn is_valid_component_name(name: &str) -> bool {
    if name.is_empty() || name.len() > COMPONENT_NAME_MAX_LENGTH {
        return false;
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_ends = !name.starts_with('-') && !name.ends_with('-');
    valid_chars && valid_ends
}

const TOPLEVEL_KEYS: &[&str] = &["config_version", "components", "source_url"];
const COMPONENT_KEYS: &[&str] = &["component_type", "build", "run"];
const SOURCE_BUILD_KEYS: &[&str] = &["repository", "ref", "use_latest_versions"];
const REFERENCE_BUILD_KEYS: &[&str] = &["reuse_from"];
const CONTINUOUS_RUN_KEYS: &[&str] = &[
    "command",
    "health_check_http",
    "health_check_script",
    "cpu",
    "memory",
    "replicas",
    "port",
    "emails",
    "filelog",
    "filelog_stdout",
    "filelog_stderr",
    "mount",
];
const SCHEDULED_RUN_KEYS: &[&str] = &[
    "command",
    "schedule",
    "cpu",
    "memory",
    "emails",
    "filelog",
    "filelog_stdout",
    "filelog_stderr",
    "mount",
    "retry",
    "timeout",
];

/// Walk a raw config document and collect dotted paths of fields the model
/// does not recognize. Top-level unknowns are reported as `toplevel.<key>`.
pub fn unknown_field_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();

    let Some(toplevel) = value.as_object() else {
        return paths;
    };

    for key in toplevel.keys() {
        if !TOPLEVEL_KEYS.contains(&key.as_str()) {
            paths.push(format!("toplevel.{key}"));
        }
    }

    let Some(components) = toplevel.get("components").and_then(Value::as_object) else {
        return paths;
    };

    for (name, component) in components {
        let Some(component) = component.as_object() else {
            continue;
        };

        for key in component.keys() {
            if !COMPONENT_KEYS.contains(&key.as_str()) {
                paths.push(format!("components.{name}.{key}"));
            }
        }

        if let Some(build) = component.get("build").and_then(Value::as_object) {
            let known: &[&str] = if build.contains_key("reuse_from") {
                REFERENCE_BUILD_KEYS
            } else {
                SOURCE_BUILD_KEYS
            };
            for key in build.keys() {
                if !known.contains(&key.as_str()) {
                    paths.push(format!("components.{name}.build.{key}"));
                }
            }
        }

        if let Some(run) = component.get("run").and_then(Value::as_object) {
            let known: &[&str] = match component.get("component_type").and_then(Value::as_str) {
                Some("continuous") => CONTINUOUS_RUN_KEYS,
                Some("scheduled") => SCHEDULED_RUN_KEYS,
                // Unknown discriminator: typed parsing rejects the whole
                // document, no point second-guessing the run keys here.
                _ => continue,
            };
            for key in run.keys() {
                if !known.contains(&key.as_str()) {
                    paths.push(format!("components.{name}.run.{key}"));
                }
            }
        }
    }

    paths
}
