//! Attribute rules: one attribute, one matcher, permit or deny.

use serde::{Deserialize, Serialize};
use veil_types::{Attribute, AttributeId};

use crate::context::FilterContext;
use crate::matcher::{MatchSet, ValueMatcher};

/// Whether matched values are released or withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Release matched values, unless another active rule denies them.
    Permit,
    /// Withhold matched values, whatever any other rule permits.
    Deny,
}

impl Default for Disposition {
    /// Defaults to `Deny` (safe default: withhold unless explicitly permitted).
    fn default() -> Self {
        Self::Deny
    }
}

/// Binds one attribute to one value matcher.
///
/// The disposition is not interpreted here; the engine folds it into the
/// permit and deny sets it builds per attribute.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    /// Attribute this rule applies to.
    pub attribute_id: AttributeId,
    /// What happens to matched values.
    pub disposition: Disposition,
    /// Selects the values the disposition applies to.
    pub matcher: ValueMatcher,
}

impl AttributeRule {
    pub fn new(
        attribute_id: impl Into<AttributeId>,
        disposition: Disposition,
        matcher: ValueMatcher,
    ) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            disposition,
            matcher,
        }
    }

    pub fn permit(attribute_id: impl Into<AttributeId>, matcher: ValueMatcher) -> Self {
        Self::new(attribute_id, Disposition::Permit, matcher)
    }

    pub fn deny(attribute_id: impl Into<AttributeId>, matcher: ValueMatcher) -> Self {
        Self::new(attribute_id, Disposition::Deny, matcher)
    }

    pub fn applies_to(&self, attribute: &Attribute) -> bool {
        self.attribute_id == attribute.id
    }

    /// Values of `attribute` this rule's matcher selects.
    pub fn evaluate<'a>(&self, attribute: &'a Attribute, ctx: &FilterContext<'_>) -> MatchSet<'a> {
        self.matcher.matches(attribute, ctx)
    }
}
