//! Filter policies and validated policy sets.
//!
//! A policy pairs a requirement ("does this policy apply to the request?")
//! with an ordered list of attribute rules. Rule order is evaluation order,
//! not precedence: every rule of an active policy is evaluated.
//!
//! Policies are built once, validated, and never mutated afterwards. A
//! [`PolicySet`] is the unit the engine evaluates and reloads.

use std::collections::{BTreeSet, HashSet};

use tracing::warn;
use veil_types::AttributeId;

use crate::context::FilterContext;
use crate::error::{PolicyError, Result, ValidationIssue};
use crate::matcher::ValueMatcher;
use crate::requirement::{ContextPredicate, Node, RequirementRule};
use crate::rule::AttributeRule;
use crate::tristate::Tristate;

// ============================================================================
// FilterPolicy
// ============================================================================

/// An immutable, validated filter policy.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    id: String,
    requirement: RequirementRule,
    rules: Vec<AttributeRule>,
}

impl FilterPolicy {
    /// Starts building a policy with the given id.
    ///
    /// ```
    /// use veil_filter::{AttributeRule, FilterPolicy, RequirementRule, StringMatch, ValueMatcher};
    ///
    /// let policy = FilterPolicy::builder("release-mail")
    ///     .requirement(RequirementRule::requester(StringMatch::exact("https://sp.example.org")))
    ///     .rule(AttributeRule::permit("mail", ValueMatcher::any()))
    ///     .build()?;
    ///
    /// assert_eq!(policy.id(), "release-mail");
    /// assert_eq!(policy.rules().len(), 1);
    /// # Ok::<(), veil_filter::PolicyError>(())
    /// ```
    pub fn builder(id: impl Into<String>) -> FilterPolicyBuilder {
        FilterPolicyBuilder {
            id: id.into(),
            requirement: None,
            rules: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requirement(&self) -> &RequirementRule {
        &self.requirement
    }

    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }

    /// Evaluates the requirement. The policy is active only on `True`.
    pub fn is_active(&self, ctx: &FilterContext<'_>) -> Tristate {
        self.requirement.evaluate(ctx)
    }

    /// Whether any predicate in this policy reads the candidate attributes
    /// rather than only the request.
    pub fn inspects_candidates(&self) -> bool {
        let mut found = false;
        let mut visit = |node: Node<'_>| {
            found |= matches!(
                node,
                Node::Requirement(RequirementRule::Leaf(
                    ContextPredicate::AttributeValue { .. } | ContextPredicate::ValueCount { .. }
                ))
            );
        };
        self.requirement.walk(&mut visit);
        for rule in &self.rules {
            rule.matcher.walk(&mut visit);
        }
        found
    }

    /// Reports structural problems in this policy.
    ///
    /// When `known_attributes` is given, rules naming any other attribute are
    /// reported as warnings.
    pub fn validate(&self, known_attributes: Option<&BTreeSet<AttributeId>>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.id.trim().is_empty() {
            issues.push(ValidationIssue::error(&self.id, "policy id is empty"));
        }

        self.requirement
            .walk(&mut |node| check_node(&self.id, node, &mut issues));

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.attribute_id.is_empty() {
                issues.push(ValidationIssue::error(
                    &self.id,
                    format!("rule #{index} has an empty attribute id"),
                ));
            } else if let Some(known) = known_attributes
                && !known.contains(&rule.attribute_id)
            {
                issues.push(ValidationIssue::warning(
                    &self.id,
                    format!(
                        "rule #{index} references attribute '{}' which is never resolved",
                        rule.attribute_id
                    ),
                ));
            }
            rule.matcher
                .walk(&mut |node| check_node(&self.id, node, &mut issues));
        }

        issues
    }
}

fn check_node(policy_id: &str, node: Node<'_>, issues: &mut Vec<ValidationIssue>) {
    match node {
        Node::Requirement(RequirementRule::And(children)) if children.is_empty() => {
            issues.push(ValidationIssue::warning(
                policy_id,
                "requirement And has no children and always evaluates to TRUE",
            ));
        }
        Node::Requirement(RequirementRule::Or(children)) if children.is_empty() => {
            issues.push(ValidationIssue::warning(
                policy_id,
                "requirement Or has no children and always evaluates to FALSE",
            ));
        }
        Node::Requirement(RequirementRule::Leaf(ContextPredicate::ValueCount {
            attribute_id,
            min,
            max,
        })) if min > max => {
            issues.push(ValidationIssue::warning(
                policy_id,
                format!("value count range for '{attribute_id}' is empty ({min} > {max})"),
            ));
        }
        Node::Matcher(ValueMatcher::And(children)) if children.is_empty() => {
            issues.push(ValidationIssue::warning(
                policy_id,
                "matcher And has no children and never matches",
            ));
        }
        Node::Matcher(ValueMatcher::Or(children)) if children.is_empty() => {
            issues.push(ValidationIssue::warning(
                policy_id,
                "matcher Or has no children and never matches",
            ));
        }
        Node::Requirement(_) | Node::Matcher(_) => {}
    }
}

// ============================================================================
// FilterPolicyBuilder
// ============================================================================

/// Builder for [`FilterPolicy`].
#[derive(Debug, Clone)]
pub struct FilterPolicyBuilder {
    id: String,
    requirement: Option<RequirementRule>,
    rules: Vec<AttributeRule>,
}

impl FilterPolicyBuilder {
    pub fn requirement(mut self, requirement: RequirementRule) -> Self {
        self.requirement = Some(requirement);
        self
    }

    pub fn rule(mut self, rule: AttributeRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = AttributeRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Produces the policy, failing on any error-severity validation issue.
    ///
    /// Warnings are not reported here; see [`FilterPolicy::validate`] and
    /// [`PolicySet::with_options`].
    pub fn build(self) -> Result<FilterPolicy> {
        let requirement = self
            .requirement
            .ok_or_else(|| PolicyError::MissingRequirement {
                policy_id: self.id.clone(),
            })?;

        let policy = FilterPolicy {
            id: self.id,
            requirement,
            rules: self.rules,
        };

        let errors: Vec<ValidationIssue> = policy
            .validate(None)
            .into_iter()
            .filter(ValidationIssue::is_error)
            .collect();
        if !errors.is_empty() {
            return Err(PolicyError::Invalid(errors));
        }

        Ok(policy)
    }
}

// ============================================================================
// PolicySet
// ============================================================================

/// Options for validating a [`PolicySet`].
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Treat warnings as errors.
    pub strict: bool,
    /// Attribute ids the attribute source can produce. `None` skips the check.
    pub known_attributes: Option<BTreeSet<AttributeId>>,
}

impl ValidationOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            known_attributes: None,
        }
    }

    pub fn with_known_attributes<I, A>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AttributeId>,
    {
        self.known_attributes = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// A validated, immutable set of policies.
///
/// Results never depend on the order of policies in the set.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<FilterPolicy>,
    warnings: Vec<ValidationIssue>,
}

impl PolicySet {
    /// Validates with default (lenient) options.
    pub fn new(policies: Vec<FilterPolicy>) -> Result<Self> {
        Self::with_options(policies, &ValidationOptions::default())
    }

    /// Validates the policies as a set.
    ///
    /// Errors, and warnings under `strict`, fail the whole set. Remaining
    /// warnings are logged and kept on the set for inspection.
    pub fn with_options(policies: Vec<FilterPolicy>, options: &ValidationOptions) -> Result<Self> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for policy in &policies {
            if !seen.insert(policy.id()) {
                issues.push(ValidationIssue::error(policy.id(), "duplicate policy id"));
            }
            issues.extend(policy.validate(options.known_attributes.as_ref()));
        }

        let (blocking, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.is_error() || options.strict);
        if !blocking.is_empty() {
            return Err(PolicyError::Invalid(blocking));
        }

        for issue in &warnings {
            warn!(policy_id = %issue.policy_id, "{}", issue.message);
        }

        Ok(Self { policies, warnings })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn policies(&self) -> &[FilterPolicy] {
        &self.policies
    }

    pub fn get(&self, id: &str) -> Option<&FilterPolicy> {
        self.policies.iter().find(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Non-blocking issues found during validation.
    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }
}

// ============================================================================
// Tests
// ============================================================================
