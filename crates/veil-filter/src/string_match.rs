//! String comparison used by leaf predicates.

use regex::Regex;

use crate::error::{PolicyError, Result};

/// A configured comparison against a single string.
///
/// Regular expressions are compiled once, at construction, and always match
/// the whole input rather than searching within it.
#[derive(Debug, Clone)]
pub enum StringMatch {
    /// Literal comparison.
    Exact { value: String, case_sensitive: bool },
    /// Anchored regular expression.
    Pattern { source: String, regex: Regex },
}

impl StringMatch {
    /// Case-sensitive literal comparison.
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact {
            value: value.into(),
            case_sensitive: true,
        }
    }

    /// Case-insensitive literal comparison.
    pub fn exact_ignore_case(value: impl Into<String>) -> Self {
        Self::Exact {
            value: value.into(),
            case_sensitive: false,
        }
    }

    /// Full-match regular expression.
    ///
    /// ```
    /// # use veil_filter::StringMatch;
    /// let m = StringMatch::regex(r".*\.org").unwrap();
    /// assert!(m.matches("example.org"));
    /// assert!(!m.matches("example.org.evil.com"));
    /// ```
    pub fn regex(pattern: impl Into<String>) -> Result<Self> {
        let source = pattern.into();
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            PolicyError::InvalidRegex {
                pattern: source.clone(),
                source: e,
            }
        })?;
        Ok(Self::Pattern { source, regex })
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact {
                value,
                case_sensitive: true,
            } => value == candidate,
            Self::Exact {
                value,
                case_sensitive: false,
            } => value.to_lowercase() == candidate.to_lowercase(),
            Self::Pattern { regex, .. } => regex.is_match(candidate),
        }
    }

    /// The configured literal or pattern text.
    pub fn source(&self) -> &str {
        match self {
            Self::Exact { value, .. } => value,
            Self::Pattern { source, .. } => source,
        }
    }
}
