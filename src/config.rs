//! Mediator configuration loader.
//!
//! A configuration names the three registry keys, the input/output type
//! tokens and the registry roots. It is read from YAML or JSON:
//!
//! ```yaml
//! version: 1
//! mediator:
//!   config_key: conf:datamapper/order.dmc
//!   input_schema_key: conf:datamapper/order_in.json
//!   output_schema_key: "{$ctx:outputSchema}"
//!   input_type: XML
//!   output_type: JSON
//! registry:
//!   config_root: ./registry/config
//!   governance_root: ./registry/governance
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datatype::DataType;
use crate::key::RegistryKey;

/// Errors raised while loading a [`MediatorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format for {0}, expected .yaml, .yml or .json")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_version() -> u32 {
    1
}

fn default_type() -> String {
    DataType::Xml.token().to_string()
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatorConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    pub mediator: MediatorSettings,

    #[serde(default)]
    pub registry: RegistrySettings,
}

/// Settings of one data mapper mediator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatorSettings {
    /// Location of the mapping configuration
    #[serde(default)]
    pub config_key: RegistryKey,

    /// Location of the input schema
    #[serde(default)]
    pub input_schema_key: RegistryKey,

    /// Location of the output schema
    #[serde(default)]
    pub output_schema_key: RegistryKey,

    #[serde(default = "default_type")]
    pub input_type: String,

    #[serde(default = "default_type")]
    pub output_type: String,

    /// Fixed identity; a fresh one is generated when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// Roots of the `conf:` and `gov:` registries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySettings {
    pub config_root: PathBuf,
    pub governance_root: PathBuf,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            config_root: PathBuf::from("registry/config"),
            governance_root: PathBuf::from("registry/governance"),
        }
    }
}

impl MediatorConfig {
    /// Load configuration from a YAML or JSON file.
    ///
    /// The format follows the file extension. Relative registry roots are
    /// resolved against the directory holding the file.
    ///
    /// # Example
    /// ```ignore
    /// use datamapper_mediator::MediatorConfig;
    ///
    /// let config = MediatorConfig::load_from_file("config/order.yaml")?;
    /// println!("Input type: {}", config.mediator.input_type);
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let mut config = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
            Some("json") => Self::from_json(&contents)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        if let Some(base) = path.parent() {
            config.registry.config_root = base.join(&config.registry.config_root);
            config.registry.governance_root = base.join(&config.registry.governance_root);
        }

        tracing::info!(path = %path.display(), "Loaded mediator configuration");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parts of the configuration that can be checked statically.
    ///
    /// Empty registry keys are accepted here. They are reported per message
    /// as `ConfigurationInvalid`, the same as a dynamic key that evaluates
    /// to nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        for (field, token) in [
            ("input_type", &self.mediator.input_type),
            ("output_type", &self.mediator.output_type),
        ] {
            if token.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
mediator:
  config_key: conf:datamapper/order.dmc
  input_schema_key: conf:datamapper/in.json
  output_schema_key: "{$ctx:outputSchema}"
  output_type: json
registry:
  config_root: conf
  governance_root: gov
"#;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = MediatorConfig::from_yaml(YAML).unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.mediator.input_type, "XML");
        assert_eq!(config.mediator.output_type, "json");
        assert!(config.mediator.output_schema_key.is_dynamic());
        assert!(config.mediator.id.is_none());
    }

    #[test]
    fn test_from_json() {
        let config = MediatorConfig::from_json(
            r#"{"mediator": {"config_key": "a", "input_schema_key": "b",
                "output_schema_key": "c", "input_type": "CSV",
                "id": "6f1c2a4e-3b9d-4c8e-9a51-0d2b7e6f4a10"}}"#,
        )
        .unwrap();

        assert_eq!(config.mediator.input_type, "CSV");
        assert!(config.mediator.id.is_some());
        assert_eq!(config.registry, RegistrySettings::default());
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let config = MediatorConfig::from_yaml("mediator: {}\n").unwrap();
        assert_eq!(config.mediator.config_key, RegistryKey::Static(String::new()));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let result = MediatorConfig::from_yaml("version: 2\nmediator: {}\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_blank_type() {
        let result = MediatorConfig::from_yaml("mediator:\n  input_type: ' '\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file_resolves_roots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediator.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = MediatorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.registry.config_root, dir.path().join("conf"));
        assert_eq!(config.registry.governance_root, dir.path().join("gov"));
    }

    #[test]
    fn test_load_from_file_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediator.toml");
        fs::write(&path, "x = 1").unwrap();

        assert!(matches!(
            MediatorConfig::load_from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
