//! Policy requirement rules: does a policy apply to this request?
//!
//! A requirement is a tree of leaf predicates over the request context joined
//! by tristate combinators. Leaves that need a context facet the request does
//! not carry evaluate to [`Tristate::Fail`].

use tracing::warn;
use veil_types::{Attribute, AttributeId};

use crate::context::FilterContext;
use crate::matcher::ValueMatcher;
use crate::string_match::StringMatch;
use crate::tristate::Tristate;

// ============================================================================
// RequirementRule
// ============================================================================

/// A requirement tree, evaluated once per policy per request.
#[derive(Debug, Clone)]
pub enum RequirementRule {
    /// A leaf predicate over the request.
    Leaf(ContextPredicate),
    /// Every child must be `True`. See [`Tristate::all`].
    And(Vec<RequirementRule>),
    /// Some child must be `True`. See [`Tristate::any`].
    Or(Vec<RequirementRule>),
    /// Inverts `True`/`False`; `Fail` stays `Fail`.
    Not(Box<RequirementRule>),
}

impl RequirementRule {
    /// Always applies.
    pub fn any() -> Self {
        Self::Leaf(ContextPredicate::Any)
    }

    pub fn requester(matcher: StringMatch) -> Self {
        Self::Leaf(ContextPredicate::RequesterId(matcher))
    }

    pub fn issuer(matcher: StringMatch) -> Self {
        Self::Leaf(ContextPredicate::IssuerId(matcher))
    }

    pub fn authentication_method(matcher: StringMatch) -> Self {
        Self::Leaf(ContextPredicate::AuthenticationMethod(matcher))
    }

    pub fn principal(matcher: StringMatch) -> Self {
        Self::Leaf(ContextPredicate::PrincipalName(matcher))
    }

    pub fn in_group(group: impl Into<String>) -> Self {
        Self::Leaf(ContextPredicate::RequesterInGroup(group.into()))
    }

    pub fn entity_attribute(
        name: impl Into<String>,
        name_format: Option<String>,
        value: StringMatch,
    ) -> Self {
        Self::Leaf(ContextPredicate::RequesterEntityAttribute {
            name: name.into(),
            name_format,
            value,
        })
    }

    pub fn attribute_value(attribute_id: impl Into<AttributeId>, matcher: ValueMatcher) -> Self {
        Self::Leaf(ContextPredicate::AttributeValue {
            attribute_id: attribute_id.into(),
            matcher: Box::new(matcher),
        })
    }

    pub fn value_count(attribute_id: impl Into<AttributeId>, min: usize, max: usize) -> Self {
        Self::Leaf(ContextPredicate::ValueCount {
            attribute_id: attribute_id.into(),
            min,
            max,
        })
    }

    pub fn negate(rule: RequirementRule) -> Self {
        Self::Not(Box::new(rule))
    }

    /// Evaluates the tree against one request.
    ///
    /// Combinators consume children lazily, so evaluation stops at the first
    /// child that decides the outcome.
    pub fn evaluate(&self, ctx: &FilterContext<'_>) -> Tristate {
        match self {
            Self::Leaf(predicate) => predicate.evaluate(ctx),
            Self::And(children) => Tristate::all(children.iter().map(|c| c.evaluate(ctx))),
            Self::Or(children) => Tristate::any(children.iter().map(|c| c.evaluate(ctx))),
            Self::Not(child) => !child.evaluate(ctx),
        }
    }

    /// Visits this node and every descendant, including requirement trees
    /// nested inside value matchers.
    pub(crate) fn walk(&self, visit: &mut dyn FnMut(Node<'_>)) {
        visit(Node::Requirement(self));
        match self {
            Self::Leaf(ContextPredicate::AttributeValue { matcher, .. }) => matcher.walk(visit),
            Self::Leaf(_) => {}
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.walk(visit);
                }
            }
            Self::Not(child) => child.walk(visit),
        }
    }
}

/// A node reached while walking a rule tree.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Node<'a> {
    Requirement(&'a RequirementRule),
    Matcher(&'a ValueMatcher),
}

// ============================================================================
// ContextPredicate
// ============================================================================

/// Leaf predicates over the request context.
#[derive(Debug, Clone)]
pub enum ContextPredicate {
    /// Always `True`.
    Any,
    /// Compares the requester's entity id.
    RequesterId(StringMatch),
    /// Compares the issuer's entity id.
    IssuerId(StringMatch),
    /// Compares the authentication method.
    AuthenticationMethod(StringMatch),
    /// Compares the principal name.
    PrincipalName(StringMatch),
    /// Requester is a member of the named entity group.
    RequesterInGroup(String),
    /// Requester metadata carries an entity attribute with a matching value.
    RequesterEntityAttribute {
        name: String,
        name_format: Option<String>,
        value: StringMatch,
    },
    /// The candidate attribute has at least one value the matcher selects.
    ///
    /// A candidate set without the attribute evaluates to `False`.
    AttributeValue {
        attribute_id: AttributeId,
        matcher: Box<ValueMatcher>,
    },
    /// The candidate attribute's value count lies in `min..=max`.
    ///
    /// A missing attribute counts as zero values.
    ValueCount {
        attribute_id: AttributeId,
        min: usize,
        max: usize,
    },
}

impl ContextPredicate {
    pub fn evaluate(&self, ctx: &FilterContext<'_>) -> Tristate {
        let request = ctx.request();
        match self {
            Self::Any => Tristate::True,
            Self::RequesterId(m) => compare_facet(ctx, "requester_id", request.requester_id(), m),
            Self::IssuerId(m) => compare_facet(ctx, "issuer_id", request.issuer_id(), m),
            Self::AuthenticationMethod(m) => compare_facet(
                ctx,
                "authentication_method",
                request.authentication_method(),
                m,
            ),
            Self::PrincipalName(m) => {
                compare_facet(ctx, "principal_name", request.principal_name(), m)
            }
            Self::RequesterInGroup(group) => match request.in_entity_group(group) {
                Some(member) => Tristate::from(member),
                None => {
                    warn!(policy_id = ctx.policy_id(), facet = "requester_metadata", group = %group, "Context facet unavailable; entity group membership unknown");
                    Tristate::Fail
                }
            },
            Self::RequesterEntityAttribute {
                name,
                name_format,
                value,
            } => match request.requester_metadata_attribute(name, name_format.as_deref()) {
                Some(values) => Tristate::from(values.iter().any(|v| value.matches(v))),
                None => {
                    warn!(policy_id = ctx.policy_id(), facet = "requester_metadata", entity_attribute = %name, "Context facet unavailable; entity attribute unknown");
                    Tristate::Fail
                }
            },
            Self::AttributeValue {
                attribute_id,
                matcher,
            } => match ctx.candidate(attribute_id) {
                Some(attribute) => Tristate::from(!matcher.matches(attribute, ctx).is_empty()),
                None => Tristate::False,
            },
            Self::ValueCount {
                attribute_id,
                min,
                max,
            } => {
                let count = ctx.candidate(attribute_id).map_or(0, Attribute::len);
                Tristate::from((*min..=*max).contains(&count))
            }
        }
    }
}

fn compare_facet(
    ctx: &FilterContext<'_>,
    facet: &'static str,
    actual: Option<&str>,
    expected: &StringMatch,
) -> Tristate {
    match actual {
        Some(actual) => Tristate::from(expected.matches(actual)),
        None => {
            warn!(
                policy_id = ctx.policy_id(),
                facet, "Context facet unavailable; requirement cannot be evaluated"
            );
            Tristate::Fail
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
