//! Value matchers: which values of an attribute does a rule select?
//!
//! A matcher returns a subset of the attribute's values. There is no failure
//! state at this layer: a value whose match cannot be decided is left out,
//! which under a whitelist is the same as not releasing it.
//!
//! | Combinator | Result                                           |
//! |------------|--------------------------------------------------|
//! | `And`      | intersection of the children (empty if none)     |
//! | `Or`       | union of the children (empty if none)            |
//! | `Not`      | attribute values the child did not select        |

use std::collections::HashSet;

use tracing::warn;
use veil_types::{Attribute, AttributeValue};

use crate::context::FilterContext;
use crate::requirement::{Node, RequirementRule};
use crate::string_match::StringMatch;
use crate::tristate::Tristate;

/// Values selected by a matcher, borrowed from the attribute under test.
pub type MatchSet<'a> = HashSet<&'a AttributeValue>;

// ============================================================================
// ValueMatcher
// ============================================================================

/// A value matcher tree.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    /// A leaf predicate.
    Leaf(ValuePredicate),
    /// Values selected by every child.
    And(Vec<ValueMatcher>),
    /// Values selected by any child.
    Or(Vec<ValueMatcher>),
    /// Values the child does not select.
    Not(Box<ValueMatcher>),
}

impl ValueMatcher {
    /// Selects every value.
    pub fn any() -> Self {
        Self::Leaf(ValuePredicate::Any)
    }

    /// Selects values whose comparison string matches.
    pub fn value(matcher: StringMatch) -> Self {
        Self::Leaf(ValuePredicate::Value(matcher))
    }

    /// Selects scoped values whose scope matches.
    pub fn scope(matcher: StringMatch) -> Self {
        Self::Leaf(ValuePredicate::Scope(matcher))
    }

    pub fn in_metadata(rule: MetadataMatch) -> Self {
        Self::Leaf(ValuePredicate::InMetadata(rule))
    }

    /// Selects every value when the requirement is `True`, nothing otherwise.
    pub fn when(requirement: RequirementRule) -> Self {
        Self::Leaf(ValuePredicate::Requirement(Box::new(requirement)))
    }

    pub fn negate(matcher: ValueMatcher) -> Self {
        Self::Not(Box::new(matcher))
    }

    /// Returns the values of `attribute` this matcher selects.
    pub fn matches<'a>(&self, attribute: &'a Attribute, ctx: &FilterContext<'_>) -> MatchSet<'a> {
        match self {
            Self::Leaf(predicate) => predicate.select(attribute, ctx),
            Self::And(children) => {
                let mut children = children.iter();
                let Some(first) = children.next() else {
                    return MatchSet::new();
                };
                let mut selected = first.matches(attribute, ctx);
                for child in children {
                    if selected.is_empty() {
                        break;
                    }
                    let next = child.matches(attribute, ctx);
                    selected.retain(|value| next.contains(value));
                }
                selected
            }
            Self::Or(children) => children
                .iter()
                .flat_map(|child| child.matches(attribute, ctx))
                .collect(),
            Self::Not(child) => {
                let excluded = child.matches(attribute, ctx);
                attribute
                    .values
                    .iter()
                    .filter(|value| !excluded.contains(value))
                    .collect()
            }
        }
    }

    pub(crate) fn walk(&self, visit: &mut dyn FnMut(Node<'_>)) {
        visit(Node::Matcher(self));
        match self {
            Self::Leaf(ValuePredicate::Requirement(rule)) => rule.walk(visit),
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

// ============================================================================
// ValuePredicate
// ============================================================================

/// Leaf predicates over attribute values.
#[derive(Debug, Clone)]
pub enum ValuePredicate {
    /// Every value.
    Any,
    /// Values whose comparison string matches. Opaque values never match.
    Value(StringMatch),
    /// Scoped values whose scope matches. Unscoped values never match.
    Scope(StringMatch),
    /// Values the requester asks for in its metadata.
    InMetadata(MetadataMatch),
    /// All values when the requirement is `True`; `False` and `Fail` select none.
    Requirement(Box<RequirementRule>),
}

impl ValuePredicate {
    pub fn select<'a>(&self, attribute: &'a Attribute, ctx: &FilterContext<'_>) -> MatchSet<'a> {
        match self {
            Self::Any => attribute.values.iter().collect(),
            Self::Value(m) => attribute
                .values
                .iter()
                .filter(|value| value.comparison_string().is_some_and(|s| m.matches(s)))
                .collect(),
            Self::Scope(m) => attribute
                .values
                .iter()
                .filter(|value| value.scope().is_some_and(|s| m.matches(s)))
                .collect(),
            Self::InMetadata(rule) => rule.select(attribute, ctx),
            Self::Requirement(rule) => match rule.evaluate(ctx) {
                Tristate::True => attribute.values.iter().collect(),
                Tristate::False => MatchSet::new(),
                Tristate::Fail => {
                    warn!(policy_id = ctx.policy_id(), attribute_id = %attribute.id, "Requirement used as value matcher could not be evaluated; selecting no values");
                    MatchSet::new()
                }
            },
        }
    }
}

// ============================================================================
// MetadataMatch
// ============================================================================

/// Release only what the requester declares as requested in its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMatch {
    /// Name the attribute is requested under. Defaults to the attribute id.
    pub attribute_name: Option<String>,
    /// Name format the request must carry, if any.
    pub name_format: Option<String>,
    /// Ignore requested attributes not marked as required.
    pub only_if_required: bool,
    /// Select every value when metadata lists no requested attributes at all.
    pub match_if_silent: bool,
}

impl MetadataMatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only_if_required(mut self) -> Self {
        self.only_if_required = true;
        self
    }

    pub fn match_if_silent(mut self) -> Self {
        self.match_if_silent = true;
        self
    }

    pub fn with_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attribute_name = Some(name.into());
        self
    }

    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    fn select<'a>(&self, attribute: &'a Attribute, ctx: &FilterContext<'_>) -> MatchSet<'a> {
        let Some(requested) = ctx.request().requested_attributes() else {
            warn!(policy_id = ctx.policy_id(), attribute_id = %attribute.id, "Requester metadata unavailable; selecting no values");
            return MatchSet::new();
        };

        if requested.is_empty() {
            return if self.match_if_silent {
                attribute.values.iter().collect()
            } else {
                MatchSet::new()
            };
        }

        let name = self
            .attribute_name
            .as_deref()
            .unwrap_or(attribute.id.as_str());

        let mut selected = MatchSet::new();
        for request in requested.iter().filter(|r| r.name == name) {
            if self
                .name_format
                .as_deref()
                .is_some_and(|format| request.name_format.as_deref() != Some(format))
            {
                continue;
            }
            if self.only_if_required && !request.is_required {
                continue;
            }
            if request.values.is_empty() {
                selected.extend(attribute.values.iter());
            } else {
                selected.extend(attribute.values.iter().filter(|value| {
                    value
                        .comparison_string()
                        .is_some_and(|s| request.values.iter().any(|wanted| wanted == s))
                }));
            }
        }
        selected
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EntityMetadata, RequestedAttribute, StaticContext};

    fn select(matcher: &ValueMatcher, attribute: &Attribute, request: &StaticContext) -> Vec<String> {
        let ctx = FilterContext::new(request, std::slice::from_ref(attribute));
        let selected = matcher.matches(attribute, &ctx);
        // Report in attribute order so assertions are deterministic.
        attribute
            .values
            .iter()
            .filter(|v| selected.contains(v))
            .map(ToString::to_string)
            .collect()
    }

    fn affiliation() -> Attribute {
        Attribute::with_values("affiliation", ["member", "staff", "student"])
    }

    #[test]
    fn any_selects_everything() {
        let got = select(&ValueMatcher::any(), &affiliation(), &StaticContext::new());
        assert_eq!(got, vec!["member", "staff", "student"]);
    }

    #[test]
    fn value_string_and_regex() {
        let request = StaticContext::new();
        let exact = ValueMatcher::value(StringMatch::exact("staff"));
        assert_eq!(select(&exact, &affiliation(), &request), vec!["staff"]);

        let regex = ValueMatcher::value(StringMatch::regex("s.*").unwrap());
        assert_eq!(select(&regex, &affiliation(), &request), vec!["staff", "student"]);

        let partial = ValueMatcher::value(StringMatch::regex("taf").unwrap());
        assert!(select(&partial, &affiliation(), &request).is_empty());
    }

    #[test]
    fn value_matcher_uses_value_half_of_scoped_values() {
        let attr = Attribute::new("scopedAffiliation")
            .with_value(AttributeValue::scoped("member", "x.org"))
            .with_value(AttributeValue::scoped("staff", "y.org"));
        let m = ValueMatcher::value(StringMatch::exact("member"));
        assert_eq!(select(&m, &attr, &StaticContext::new()), vec!["member@x.org"]);
    }

    #[test]
    fn opaque_values_never_match_string_leaves() {
        let attr = Attribute::new("cert")
            .with_value(AttributeValue::opaque(b"member".to_vec()))
            .with_value("member");
        let m = ValueMatcher::value(StringMatch::regex(".*").unwrap());
        assert_eq!(select(&m, &attr, &StaticContext::new()), vec!["member"]);
    }

    #[test]
    fn scope_matcher_skips_unscoped_values() {
        let attr = Attribute::new("mail")
            .with_value(AttributeValue::scoped("a", "x.org"))
            .with_value(AttributeValue::scoped("b", "y.com"))
            .with_value("c@x.org");
        let m = ValueMatcher::scope(StringMatch::regex(r".*\.org").unwrap());
        assert_eq!(select(&m, &attr, &StaticContext::new()), vec!["a@x.org"]);
    }

    #[test]
    fn and_is_intersection() {
        let m = ValueMatcher::And(vec![
            ValueMatcher::value(StringMatch::regex("s.*").unwrap()),
            ValueMatcher::value(StringMatch::regex(".*t").unwrap()),
        ]);
        assert_eq!(select(&m, &affiliation(), &StaticContext::new()), vec!["student"]);
    }

    #[test]
    fn or_is_union() {
        let m = ValueMatcher::Or(vec![
            ValueMatcher::value(StringMatch::exact("member")),
            ValueMatcher::value(StringMatch::exact("student")),
        ]);
        assert_eq!(
            select(&m, &affiliation(), &StaticContext::new()),
            vec!["member", "student"]
        );
    }

    #[test]
    fn not_is_complement_within_attribute() {
        let m = ValueMatcher::negate(ValueMatcher::value(StringMatch::exact("student")));
        assert_eq!(
            select(&m, &affiliation(), &StaticContext::new()),
            vec!["member", "staff"]
        );
    }

    #[test]
    fn empty_combinators_select_nothing() {
        let request = StaticContext::new();
        assert!(select(&ValueMatcher::And(vec![]), &affiliation(), &request).is_empty());
        assert!(select(&ValueMatcher::Or(vec![]), &affiliation(), &request).is_empty());
    }

    #[test]
    fn requirement_as_matcher() {
        let sp = StaticContext::new().with_requester("https://sp.example.org");
        let yes = ValueMatcher::when(RequirementRule::requester(StringMatch::exact(
            "https://sp.example.org",
        )));
        let no = ValueMatcher::when(RequirementRule::requester(StringMatch::exact(
            "https://other.example.org",
        )));
        let fails = ValueMatcher::when(RequirementRule::issuer(StringMatch::exact("x")));

        assert_eq!(select(&yes, &affiliation(), &sp).len(), 3);
        assert!(select(&no, &affiliation(), &sp).is_empty());
        assert!(select(&fails, &affiliation(), &sp).is_empty());
    }

    #[test]
    fn not_of_failed_requirement_matcher_selects_everything() {
        // The matcher layer has no FAIL state: a failed inner requirement is an
        // empty selection, and its complement is every value. Negating
        // context-derived matchers is therefore best done at the requirement
        // layer, where FAIL survives Not.
        let request = StaticContext::new();
        let m = ValueMatcher::negate(ValueMatcher::when(RequirementRule::issuer(
            StringMatch::exact("x"),
        )));
        assert_eq!(select(&m, &affiliation(), &request).len(), 3);

        let safe = ValueMatcher::when(RequirementRule::negate(RequirementRule::issuer(
            StringMatch::exact("x"),
        )));
        assert!(select(&safe, &affiliation(), &request).is_empty());
    }

    fn metadata_request(requested: Vec<RequestedAttribute>) -> StaticContext {
        StaticContext::new().with_metadata(EntityMetadata {
            requested_attributes: requested,
            ..EntityMetadata::default()
        })
    }

    #[test]
    fn in_metadata_without_metadata_selects_nothing() {
        let m = ValueMatcher::in_metadata(MetadataMatch::new().match_if_silent());
        assert!(select(&m, &affiliation(), &StaticContext::new()).is_empty());
    }

    #[test]
    fn in_metadata_silent_metadata() {
        let request = metadata_request(vec![]);
        let strict = ValueMatcher::in_metadata(MetadataMatch::new());
        let lenient = ValueMatcher::in_metadata(MetadataMatch::new().match_if_silent());

        assert!(select(&strict, &affiliation(), &request).is_empty());
        assert_eq!(select(&lenient, &affiliation(), &request).len(), 3);
    }

    #[test]
    fn in_metadata_requested_attribute() {
        let request = metadata_request(vec![
            RequestedAttribute::new("affiliation"),
            RequestedAttribute::new("mail").required(),
        ]);

        let m = ValueMatcher::in_metadata(MetadataMatch::new());
        assert_eq!(select(&m, &affiliation(), &request).len(), 3);

        let required_only = ValueMatcher::in_metadata(MetadataMatch::new().only_if_required());
        assert!(select(&required_only, &affiliation(), &request).is_empty());

        let mail = Attribute::with_values("mail", ["a@x.org"]);
        assert_eq!(select(&required_only, &mail, &request), vec!["a@x.org"]);
    }

    #[test]
    fn in_metadata_requested_values_restrict_release() {
        let request = metadata_request(vec![
            RequestedAttribute::new("urn:oid:1.3.6.1.4.1.5923.1.1.1.1")
                .with_name_format("urn:oasis:names:tc:SAML:2.0:attrname-format:uri")
                .with_value("staff"),
        ]);
        let m = ValueMatcher::in_metadata(
            MetadataMatch::new()
                .with_attribute_name("urn:oid:1.3.6.1.4.1.5923.1.1.1.1")
                .with_name_format("urn:oasis:names:tc:SAML:2.0:attrname-format:uri"),
        );
        assert_eq!(select(&m, &affiliation(), &request), vec!["staff"]);

        let wrong_format = ValueMatcher::in_metadata(
            MetadataMatch::new()
                .with_attribute_name("urn:oid:1.3.6.1.4.1.5923.1.1.1.1")
                .with_name_format("urn:mace:shibboleth:1.0:attributeNamespace:uri"),
        );
        assert!(select(&wrong_format, &affiliation(), &request).is_empty());
    }

    #[test]
    fn matched_values_are_borrowed_from_the_attribute() {
        let attr = affiliation();
        let request = StaticContext::new();
        let ctx = FilterContext::new(&request, std::slice::from_ref(&attr));
        let selected = ValueMatcher::any().matches(&attr, &ctx);
        for value in selected {
            assert!(attr.values.iter().any(|v| std::ptr::eq(v, value)));
        }
    }
}
