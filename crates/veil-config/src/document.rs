//! Declarative policy documents.
//!
//! A document is a list of policies in TOML or JSON, chosen by file
//! extension. Every node carries a `type` tag:
//!
//! ```toml
//! [[policy]]
//! id = "release-to-research-sps"
//! requirement = { type = "in_group", group = "research-and-scholarship" }
//!
//! [[policy.rule]]
//! attribute = "mail"
//! disposition = "permit"
//! matcher = { type = "any" }
//!
//! [[policy.rule]]
//! attribute = "affiliation"
//! disposition = "permit"
//! matcher = { type = "value", regex = "member|staff" }
//! ```
//!
//! Documents are plain data; [`PolicyDocument::into_policies`] compiles them
//! into validated [`FilterPolicy`] values.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use veil_filter::{
    AttributeRule, Disposition, FilterPolicy, MetadataMatch, PolicyError, PolicySet,
    RequirementRule, StringMatch, ValidationOptions, ValueMatcher,
};

use crate::error::{ConfigError, LocatedIssue};

// ============================================================================
// DTOs
// ============================================================================

/// A parsed policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default, rename = "policy")]
    pub policies: Vec<PolicyDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDto {
    pub id: String,
    pub requirement: RequirementDto,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDto {
    pub attribute: String,
    #[serde(default)]
    pub disposition: Disposition,
    pub matcher: MatcherDto,
}

/// A literal or a regular expression. Exactly one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMatchDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementDto {
    Any,
    Requester(StringMatchDto),
    Issuer(StringMatchDto),
    AuthenticationMethod(StringMatchDto),
    Principal(StringMatchDto),
    InGroup {
        group: String,
    },
    EntityAttribute {
        name: String,
        #[serde(default)]
        name_format: Option<String>,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        regex: Option<String>,
        #[serde(default)]
        ignore_case: bool,
    },
    AttributeValue {
        attribute: String,
        matcher: Box<MatcherDto>,
    },
    ValueCount {
        attribute: String,
        #[serde(default)]
        min: usize,
        #[serde(default)]
        max: Option<usize>,
    },
    And {
        #[serde(default)]
        rules: Vec<RequirementDto>,
    },
    Or {
        #[serde(default)]
        rules: Vec<RequirementDto>,
    },
    Not {
        rule: Box<RequirementDto>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherDto {
    Any,
    Value(StringMatchDto),
    Scope(StringMatchDto),
    InMetadata {
        #[serde(default)]
        attribute_name: Option<String>,
        #[serde(default)]
        name_format: Option<String>,
        #[serde(default)]
        only_if_required: bool,
        #[serde(default)]
        match_if_silent: bool,
    },
    Requirement {
        rule: Box<RequirementDto>,
    },
    And {
        #[serde(default)]
        matchers: Vec<MatcherDto>,
    },
    Or {
        #[serde(default)]
        matchers: Vec<MatcherDto>,
    },
    Not {
        matcher: Box<MatcherDto>,
    },
}

// ============================================================================
// Parsing
// ============================================================================

impl PolicyDocument {
    /// Reads a document, picking the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&text).map_err(|source| ConfigError::TomlError {
                path: path.to_path_buf(),
                source,
            }),
            Some("json") => {
                serde_json::from_str(&text).map_err(|source| ConfigError::JsonError {
                    path: path.to_path_buf(),
                    source,
                })
            }
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Compiles every policy. `path` is only used in error messages.
    pub fn into_policies(self, path: &Path) -> Result<Vec<FilterPolicy>, ConfigError> {
        self.policies
            .into_iter()
            .map(|dto| dto.compile(path))
            .collect()
    }
}

// ============================================================================
// Compilation
// ============================================================================

impl PolicyDto {
    fn compile(self, path: &Path) -> Result<FilterPolicy, ConfigError> {
        let compiler = Compiler {
            path,
            policy_id: &self.id,
        };

        let requirement = compiler.requirement(self.requirement)?;
        let rules = self
            .rules
            .into_iter()
            .map(|rule| {
                Ok(AttributeRule::new(
                    rule.attribute,
                    rule.disposition,
                    compiler.matcher(rule.matcher)?,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        FilterPolicy::builder(self.id.clone())
            .requirement(requirement)
            .rules(rules)
            .build()
            .map_err(|source| compiler.policy_error(source))
    }
}

/// Carries the location of the policy being compiled into error messages.
struct Compiler<'a> {
    path: &'a Path,
    policy_id: &'a str,
}

impl Compiler<'_> {
    fn requirement(&self, dto: RequirementDto) -> Result<RequirementRule, ConfigError> {
        Ok(match dto {
            RequirementDto::Any => RequirementRule::any(),
            RequirementDto::Requester(m) => RequirementRule::requester(self.string_match(m)?),
            RequirementDto::Issuer(m) => RequirementRule::issuer(self.string_match(m)?),
            RequirementDto::AuthenticationMethod(m) => {
                RequirementRule::authentication_method(self.string_match(m)?)
            }
            RequirementDto::Principal(m) => RequirementRule::principal(self.string_match(m)?),
            RequirementDto::InGroup { group } => RequirementRule::in_group(group),
            RequirementDto::EntityAttribute {
                name,
                name_format,
                value,
                regex,
                ignore_case,
            } => RequirementRule::entity_attribute(
                name,
                name_format,
                self.string_match(StringMatchDto {
                    value,
                    regex,
                    ignore_case,
                })?,
            ),
            RequirementDto::AttributeValue { attribute, matcher } => {
                RequirementRule::attribute_value(attribute, self.matcher(*matcher)?)
            }
            RequirementDto::ValueCount { attribute, min, max } => {
                RequirementRule::value_count(attribute, min, max.unwrap_or(usize::MAX))
            }
            RequirementDto::And { rules } => RequirementRule::And(self.requirements(rules)?),
            RequirementDto::Or { rules } => RequirementRule::Or(self.requirements(rules)?),
            RequirementDto::Not { rule } => RequirementRule::negate(self.requirement(*rule)?),
        })
    }

    fn requirements(&self, dtos: Vec<RequirementDto>) -> Result<Vec<RequirementRule>, ConfigError> {
        dtos.into_iter().map(|dto| self.requirement(dto)).collect()
    }

    fn matcher(&self, dto: MatcherDto) -> Result<ValueMatcher, ConfigError> {
        Ok(match dto {
            MatcherDto::Any => ValueMatcher::any(),
            MatcherDto::Value(m) => ValueMatcher::value(self.string_match(m)?),
            MatcherDto::Scope(m) => ValueMatcher::scope(self.string_match(m)?),
            MatcherDto::InMetadata {
                attribute_name,
                name_format,
                only_if_required,
                match_if_silent,
            } => ValueMatcher::in_metadata(MetadataMatch {
                attribute_name,
                name_format,
                only_if_required,
                match_if_silent,
            }),
            MatcherDto::Requirement { rule } => ValueMatcher::when(self.requirement(*rule)?),
            MatcherDto::And { matchers } => ValueMatcher::And(self.matchers(matchers)?),
            MatcherDto::Or { matchers } => ValueMatcher::Or(self.matchers(matchers)?),
            MatcherDto::Not { matcher } => ValueMatcher::negate(self.matcher(*matcher)?),
        })
    }

    fn matchers(&self, dtos: Vec<MatcherDto>) -> Result<Vec<ValueMatcher>, ConfigError> {
        dtos.into_iter().map(|dto| self.matcher(dto)).collect()
    }

    fn string_match(&self, dto: StringMatchDto) -> Result<StringMatch, ConfigError> {
        match (dto.value, dto.regex) {
            (Some(value), None) if dto.ignore_case => Ok(StringMatch::exact_ignore_case(value)),
            (Some(value), None) => Ok(StringMatch::exact(value)),
            (None, Some(pattern)) => {
                let pattern = if dto.ignore_case {
                    format!("(?i){pattern}")
                } else {
                    pattern
                };
                StringMatch::regex(pattern).map_err(|source| self.policy_error(source))
            }
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                self.path,
                self.policy_id,
                "string match sets both 'value' and 'regex'",
            )),
            (None, None) => Err(ConfigError::invalid(
                self.path,
                self.policy_id,
                "string match needs 'value' or 'regex'",
            )),
        }
    }

    fn policy_error(&self, source: PolicyError) -> ConfigError {
        ConfigError::Policy {
            path: self.path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Policy sets
// ============================================================================

/// Loads and validates policies from several documents as one set.
///
/// Policy ids must be unique across all files.
pub fn load_policy_set(
    files: &[PathBuf],
    options: &ValidationOptions,
) -> Result<PolicySet, ConfigError> {
    let mut policies = Vec::new();
    let mut origins: HashMap<String, PathBuf> = HashMap::new();

    for path in files {
        let loaded = PolicyDocument::from_path(path)?.into_policies(path)?;
        debug!(path = %path.display(), policies = loaded.len(), "Loaded policy document");

        for policy in &loaded {
            if let Some(first) = origins.insert(policy.id().to_string(), path.clone()) {
                return Err(ConfigError::DuplicatePolicy {
                    policy_id: policy.id().to_string(),
                    first,
                    second: path.clone(),
                });
            }
        }
        policies.extend(loaded);
    }

    PolicySet::with_options(policies, options).map_err(|err| match err {
        PolicyError::Invalid(issues) => ConfigError::ValidationError(
            issues
                .into_iter()
                .map(|issue| LocatedIssue {
                    path: origins.get(&issue.policy_id).cloned(),
                    issue,
                })
                .collect(),
        ),
        other => ConfigError::Policy {
            path: files.first().cloned().unwrap_or_default(),
            source: other,
        },
    })
}

// ============================================================================
// Tests
// ============================================================================
