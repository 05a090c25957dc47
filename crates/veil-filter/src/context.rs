//! Request context seen by leaf predicates.
//!
//! The engine never interprets request facts itself. Leaf predicates read them
//! through [`RequestContext`], whose accessors return `None` when the
//! corresponding navigation state (protocol message, entity metadata) is not
//! available for this request. Predicates map `None` to `Tristate::Fail` or an
//! empty match, never to a match.

use serde::{Deserialize, Serialize};
use veil_types::{Attribute, AttributeId};

// ============================================================================
// RequestContext
// ============================================================================

/// Accessors over the facts of a single attribute release request.
pub trait RequestContext: Send + Sync {
    /// Entity id of the party asking for attributes.
    fn requester_id(&self) -> Option<&str>;

    /// Entity id of the party releasing attributes.
    fn issuer_id(&self) -> Option<&str>;

    /// How the subject authenticated (e.g., an authentication context class).
    fn authentication_method(&self) -> Option<&str>;

    /// Name of the authenticated principal.
    fn principal_name(&self) -> Option<&str>;

    /// Values of an entity attribute tag from the requester's metadata.
    ///
    /// `None` when no requester metadata is available. `Some(vec![])` when
    /// metadata exists but carries no such tag.
    fn requester_metadata_attribute(&self, name: &str, name_format: Option<&str>)
    -> Option<Vec<String>>;

    /// Whether the requester belongs to the named entity group.
    fn in_entity_group(&self, group: &str) -> Option<bool>;

    /// Attributes the requester declares in its metadata.
    fn requested_attributes(&self) -> Option<&[RequestedAttribute]>;
}

// ============================================================================
// Metadata model
// ============================================================================

/// An attribute the requester declares it wants, from its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    pub name: String,
    #[serde(default)]
    pub name_format: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    /// When non-empty, only these values are wanted.
    #[serde(default)]
    pub values: Vec<String>,
}

impl RequestedAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            is_required: false,
            values: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }
}

/// An entity attribute tag attached to metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAttribute {
    pub name: String,
    #[serde(default)]
    pub name_format: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

impl EntityAttribute {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            name_format: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }
}

/// Everything known about the requester from entity metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityMetadata {
    /// Entity groups the requester is a member of.
    pub groups: Vec<String>,
    /// Entity attributes as they appear in metadata.
    pub entity_attributes: Vec<EntityAttribute>,
    /// Entity attributes already translated to internal names.
    pub mapped_attributes: Vec<EntityAttribute>,
    /// Requested attributes from the requester's service descriptor.
    pub requested_attributes: Vec<RequestedAttribute>,
}

// ============================================================================
// StaticContext
// ============================================================================

/// A fully materialized [`RequestContext`].
///
/// Collaborators resolve every fact before the engine runs; this type simply
/// holds them. `metadata: None` models a request whose requester metadata
/// could not be located.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticContext {
    pub requester_id: Option<String>,
    pub issuer_id: Option<String>,
    pub authentication_method: Option<String>,
    pub principal_name: Option<String>,
    pub metadata: Option<EntityMetadata>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_requester(mut self, id: impl Into<String>) -> Self {
        self.requester_id = Some(id.into());
        self
    }

    pub fn with_issuer(mut self, id: impl Into<String>) -> Self {
        self.issuer_id = Some(id.into());
        self
    }

    pub fn with_authentication_method(mut self, method: impl Into<String>) -> Self {
        self.authentication_method = Some(method.into());
        self
    }

    pub fn with_principal(mut self, name: impl Into<String>) -> Self {
        self.principal_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl RequestContext for StaticContext {
    fn requester_id(&self) -> Option<&str> {
        self.requester_id.as_deref()
    }

    fn issuer_id(&self) -> Option<&str> {
        self.issuer_id.as_deref()
    }

    fn authentication_method(&self) -> Option<&str> {
        self.authentication_method.as_deref()
    }

    fn principal_name(&self) -> Option<&str> {
        self.principal_name.as_deref()
    }

    /// Union of raw and mapped entity attribute values, deduplicated in
    /// first-seen order.
    ///
    /// Raw attributes match on name, and on format when one is asked for.
    /// Mapped attributes already carry internal names and match on name only.
    fn requester_metadata_attribute(
        &self,
        name: &str,
        name_format: Option<&str>,
    ) -> Option<Vec<String>> {
        let metadata = self.metadata.as_ref()?;

        let raw = metadata.entity_attributes.iter().filter(|attr| {
            attr.name == name
                && name_format.is_none_or(|format| attr.name_format.as_deref() == Some(format))
        });
        let mapped = metadata
            .mapped_attributes
            .iter()
            .filter(|attr| attr.name == name);

        let mut values: Vec<String> = Vec::new();
        for value in raw.chain(mapped).flat_map(|attr| attr.values.iter()) {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        Some(values)
    }

    fn in_entity_group(&self, group: &str) -> Option<bool> {
        let metadata = self.metadata.as_ref()?;
        Some(metadata.groups.iter().any(|g| g == group))
    }

    fn requested_attributes(&self) -> Option<&[RequestedAttribute]> {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.requested_attributes.as_slice())
    }
}

// ============================================================================
// FilterContext
// ============================================================================

/// Per-request evaluation input handed to every predicate.
///
/// Pairs the request facts with the candidate attribute set of the current
/// release pass, so predicates can look at attributes other than the one
/// being filtered. Carries the id of the policy being evaluated for logging.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    request: &'a dyn RequestContext,
    candidates: &'a [Attribute],
    policy_id: Option<&'a str>,
}

impl<'a> FilterContext<'a> {
    pub fn new(request: &'a dyn RequestContext, candidates: &'a [Attribute]) -> Self {
        Self {
            request,
            candidates,
            policy_id: None,
        }
    }

    /// The same context, attributed to `policy_id` in log records.
    #[must_use]
    pub fn for_policy(self, policy_id: &'a str) -> Self {
        Self {
            policy_id: Some(policy_id),
            ..self
        }
    }

    /// Id of the policy under evaluation, or `"-"` outside a policy.
    pub fn policy_id(&self) -> &'a str {
        self.policy_id.unwrap_or("-")
    }

    pub fn request(&self) -> &'a dyn RequestContext {
        self.request
    }

    pub fn candidates(&self) -> &'a [Attribute] {
        self.candidates
    }

    /// The candidate attribute with the given id.
    pub fn candidate(&self, id: &AttributeId) -> Option<&'a Attribute> {
        self.candidates.iter().find(|attr| attr.id == *id)
    }
}

impl std::fmt::Debug for FilterContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterContext")
            .field("requester_id", &self.request.requester_id())
            .field("candidates", &self.candidates.len())
            .field("policy_id", &self.policy_id)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
