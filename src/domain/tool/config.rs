//! The per-tool configuration document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::component::ComponentInfo;

/// Accepted values of `config_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[serde(rename = "v1beta1")]
    V1Beta1,
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigVersion::V1Beta1 => write!(f, "v1beta1"),
        }
    }
}

/// The authoritative descriptor of a tool's components.
///
/// `components` keeps insertion order: the `builds` and `runs` maps of a
/// deployment mirror it, and users see their own declaration order back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub config_version: ConfigVersion,

    pub components: IndexMap<String, ComponentInfo>,

    /// When set, the stored config is replaced by the document fetched from
    /// this URL on every read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ToolConfig {
    /// A config with the given components and no source URL.
    pub fn new(components: IndexMap<String, ComponentInfo>) -> Self {
        Self {
            config_version: ConfigVersion::V1Beta1,
            components,
            source_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::component::{BuildSpec, ContinuousRunSpec, SourceBuildInfo};
    use crate::domain::tool::ContinuousComponentInfo;
    use proptest::prelude::*;
    use serde_json::json;

    fn continuous(command: &str) -> ComponentInfo {
        ComponentInfo::Continuous(ContinuousComponentInfo {
            build: BuildSpec::Source(SourceBuildInfo {
                repository: "https://gitlab.example/x.git".to_string(),
                git_ref: Some("main".to_string()),
                use_latest_versions: false,
            }),
            run: ContinuousRunSpec::from_command(command),
        })
    }

    #[test]
    fn rejects_unknown_config_version() {
        let value = json!({
            "config_version": "v2",
            "components": {
                "component1": {
                    "component_type": "continuous",
                    "build": {"repository": "https://gitlab.example/x.git"},
                    "run": {"command": "some command"}
                }
            }
        });
        assert!(serde_json::from_value::<ToolConfig>(value).is_err());
    }

    #[test]
    fn components_preserve_declaration_order() {
        let mut components = IndexMap::new();
        for name in ["zeta", "alpha", "middle"] {
            components.insert(name.to_string(), continuous("cmd"));
        }
        let config = ToolConfig::new(components);

        let serialized = serde_json::to_string(&config).unwrap();
        let parsed: ToolConfig = serde_json::from_str(&serialized).unwrap();
        let names: Vec<_> = parsed.components.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha", "middle"]);
    }

    #[test]
    fn yaml_round_trip_is_identity() {
        let mut components = IndexMap::new();
        components.insert("component1".to_string(), continuous("some command"));
        let config = ToolConfig::new(components);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ToolConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    proptest! {
        #[test]
        fn json_round_trip_for_arbitrary_commands(command in "[a-zA-Z0-9 ./_-]{1,60}") {
            let mut components = IndexMap::new();
            components.insert("component1".to_string(), continuous(&command));
            let config = ToolConfig::new(components);

            let serialized = serde_json::to_string(&config).unwrap();
            let parsed: ToolConfig = serde_json::from_str(&serialized).unwrap();
            prop_assert_eq!(parsed, config);
        }
    }
}
