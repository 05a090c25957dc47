//! Error types for building policies.
//!
//! Evaluation itself has no error type: it is total. Everything that can go
//! wrong is detected here, when policies are built and validated.

use std::fmt::{self, Display};

use serde::Serialize;
use thiserror::Error;

/// Error type for policy construction and validation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A regular expression failed to compile.
    #[error("Invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A policy was built without a requirement rule.
    #[error("Policy '{policy_id}' has no requirement rule")]
    MissingRequirement { policy_id: String },

    /// Validation reported one or more blocking issues.
    #[error("Policy validation failed: {}", summarize(.0))]
    Invalid(Vec<ValidationIssue>),
}

/// Result type for policy construction.
pub type Result<T> = std::result::Result<T, PolicyError>;

// ============================================================================
// Validation issues
// ============================================================================

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Probably a misconfiguration, but evaluable.
    Warning,
    /// The policy cannot be used.
    Error,
}

/// A single finding from policy validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub policy_id: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn warning(policy_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            policy_id: policy_id.into(),
            message: message.into(),
        }
    }

    pub fn error(policy_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            policy_id: policy_id.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{level}] policy '{}': {}", self.policy_id, self.message)
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
