//! Configuration management for Veil
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (VEIL_* prefix, `__` between sections)
//! 3. veil.local.toml (gitignored, local overrides)
//! 4. veil.toml (git-tracked, project config)
//! 5. ~/.config/veil/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)
//!
//! Policy files referenced from the configuration are loaded with
//! [`load_policy_set`]; see [`document`] for their format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use veil_filter::{FilterEngine, PolicySet, ValidationOptions};

pub mod document;
mod error;
mod loader;
mod paths;

pub use document::{PolicyDocument, load_policy_set};
pub use error::{ConfigError, LocatedIssue};
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Veil configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    pub policies: PolicySourceConfig,
    pub validation: ValidationConfig,
    pub engine: EngineConfig,
}

/// Where policy documents come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySourceConfig {
    /// Policy documents (.toml or .json), relative to the project directory.
    pub files: Vec<PathBuf>,
}

impl Default for PolicySourceConfig {
    fn default() -> Self {
        Self {
            files: vec![PathBuf::from("policies.toml")],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject the policy set on any warning.
    pub strict: bool,
    /// Attribute ids the attribute source can produce. Empty disables the check.
    pub known_attributes: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: true,
            known_attributes: Vec::new(),
        }
    }
}

impl ValidationConfig {
    pub fn options(&self) -> ValidationOptions {
        let options = ValidationOptions {
            strict: self.strict,
            known_attributes: None,
        };
        if self.known_attributes.is_empty() {
            options
        } else {
            options.with_known_attributes(self.known_attributes.iter().map(String::as_str))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log TRUE/FALSE policy activation at DEBUG. FAIL is always logged.
    pub log_activation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_activation: true,
        }
    }
}

impl VeilConfig {
    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        for file in &mut self.policies.files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    /// Loads and validates every configured policy file.
    pub fn load_policies(&self) -> Result<PolicySet> {
        load_policy_set(&self.policies.files, &self.validation.options())
            .context("Failed to load policies")
    }

    /// Builds an engine over the configured policies.
    pub fn build_engine(&self) -> Result<FilterEngine> {
        let policies = self.load_policies()?;
        Ok(FilterEngine::new(policies).with_activation_logging(self.engine.log_activation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = VeilConfig::default();
        assert_eq!(config.policies.files, vec![PathBuf::from("policies.toml")]);
        assert!(config.validation.strict);
        assert!(config.validation.known_attributes.is_empty());
        assert!(config.engine.log_activation);
    }

    #[test]
    fn test_validation_options() {
        let mut validation = ValidationConfig::default();
        assert!(validation.options().strict);
        assert!(validation.options().known_attributes.is_none());

        validation.known_attributes = vec!["mail".to_string(), "uid".to_string()];
        validation.strict = false;
        let options = validation.options();
        assert!(!options.strict);
        assert_eq!(options.known_attributes.map(|k| k.len()), Some(2));
    }

    #[test]
    fn test_path_resolution() {
        let mut config = VeilConfig::default();
        config.policies.files.push(PathBuf::from("/etc/veil/global.json"));
        config.resolve_paths("/home/user/project");

        assert_eq!(
            config.policies.files,
            vec![
                PathBuf::from("/home/user/project/policies.toml"),
                PathBuf::from("/etc/veil/global.json"),
            ]
        );
    }

    #[test]
    fn test_build_engine() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("policies.toml"),
            r#"
[[policy]]
id = "all-mail"
requirement = { type = "any" }

[[policy.rule]]
attribute = "mail"
disposition = "permit"
matcher = { type = "any" }
"#,
        )
        .expect("Failed to write policies");

        let mut config = VeilConfig::default();
        config.resolve_paths(temp_dir.path());
        let engine = config.build_engine().expect("Failed to build engine");
        assert_eq!(engine.snapshot().len(), 1);
    }

    #[test]
    fn test_missing_policy_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let mut config = VeilConfig::default();
        config.resolve_paths(temp_dir.path());

        let err = config.load_policies().unwrap_err();
        assert!(format!("{err:#}").contains("policies.toml"));
    }
}
