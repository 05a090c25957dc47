//! CLI command implementations.

pub mod check;
pub mod filter;
pub mod version;

use std::path::{Path, PathBuf};

use anyhow::Result;
use veil_config::{ConfigLoader, VeilConfig};

/// Loads the project configuration, replacing the policy files when any are
/// given on the command line.
fn load_config(project: Option<&Path>, files: &[PathBuf]) -> Result<VeilConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(dir) = project {
        loader = loader.with_project_dir(dir);
    }
    let mut config = loader.load()?;

    if !files.is_empty() {
        config.policies.files = files.to_vec();
    }
    Ok(config)
}
