//! Configuration error types

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use thiserror::Error;
use veil_filter::{PolicyError, ValidationIssue};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read policy file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML policy file at {path}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse JSON policy file at {path}: {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unsupported policy file format at {path} (expected .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid policy '{policy_id}' in {path}: {message}")]
    InvalidPolicy {
        path: PathBuf,
        policy_id: String,
        message: String,
    },

    #[error("Policy error in {path}: {source}")]
    Policy {
        path: PathBuf,
        source: PolicyError,
    },

    #[error("Policy '{policy_id}' is defined in both {first} and {second}")]
    DuplicatePolicy {
        policy_id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Policy validation failed:\n{}", render(.0))]
    ValidationError(Vec<LocatedIssue>),

    #[error("XDG directory error: {0}")]
    XdgError(String),
}

impl ConfigError {
    pub(crate) fn invalid(path: &Path, policy_id: &str, message: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            path: path.to_path_buf(),
            policy_id: policy_id.to_string(),
            message: message.into(),
        }
    }
}

/// A validation issue together with the file that defined the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedIssue {
    pub path: Option<PathBuf>,
    pub issue: ValidationIssue,
}

impl Display for LocatedIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} ({})", self.issue, path.display()),
            None => write!(f, "{}", self.issue),
        }
    }
}

fn render(issues: &[LocatedIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
