//! Configuration loader with multi-source merging

use crate::{Paths, VeilConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "VEIL".to_string(),
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "VEIL")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<VeilConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = VeilConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/veil/config.toml)
        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file()
            && user_config_file.exists()
        {
            builder = builder.add_source(
                config::File::from(user_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Project config (veil.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (veil.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (VEIL_ENGINE__LOG_ACTIVATION=false)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("policies.files")
                .with_list_parse_key("validation.known_attributes")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut veil_config: VeilConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Resolve relative paths
        veil_config.resolve_paths(&self.project_dir);

        Ok(veil_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
