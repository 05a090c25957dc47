//! # veil-types: Core types for `Veil`
//!
//! This crate contains the attribute data model shared across the `Veil` system:
//! - Attributes ([`Attribute`]) and their identifiers ([`AttributeId`])
//! - Attribute values ([`AttributeValue`], [`ScopedValue`])
//!
//! Values are compared structurally. Two values with the same variant and the
//! same content are the same value, regardless of which attribute or request
//! they came from.

use std::fmt::{self, Display};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of an attribute (e.g., `"mail"`, `"eduPersonAffiliation"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AttributeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for AttributeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AttributeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ============================================================================
// Scoped Value
// ============================================================================

/// A value of the form `value@scope`, e.g. `member@example.org`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedValue {
    pub value: String,
    pub scope: String,
}

impl ScopedValue {
    pub fn new(value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            scope: scope.into(),
        }
    }

    /// Splits `value@scope` on the last `@`.
    ///
    /// Returns `None` when there is no `@` or either half is empty.
    ///
    /// ```
    /// # use veil_types::ScopedValue;
    /// let scoped = ScopedValue::parse("staff@example.org").unwrap();
    /// assert_eq!(scoped.value, "staff");
    /// assert_eq!(scoped.scope, "example.org");
    /// assert!(ScopedValue::parse("no-scope").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let (value, scope) = raw.rsplit_once('@')?;
        if value.is_empty() || scope.is_empty() {
            return None;
        }
        Some(Self::new(value, scope))
    }
}

impl Display for ScopedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.scope)
    }
}

// ============================================================================
// Attribute Value
// ============================================================================

/// A single value of an attribute.
///
/// Serialized untagged: a JSON string is a [`AttributeValue::String`], an
/// object with `value` and `scope` is a [`AttributeValue::Scoped`], and a byte
/// array is [`AttributeValue::Opaque`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Plain string value.
    String(String),
    /// Scoped value (`value@scope`).
    Scoped(ScopedValue),
    /// Binary or otherwise non-string value. Has no comparison string.
    Opaque(Bytes),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn scoped(value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Scoped(ScopedValue::new(value, scope))
    }

    pub fn opaque(bytes: impl Into<Bytes>) -> Self {
        Self::Opaque(bytes.into())
    }

    /// The string leaf matchers compare against.
    ///
    /// Plain strings project to themselves, scoped values to their `value`
    /// half. Opaque values have no projection.
    pub fn comparison_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Scoped(scoped) => Some(&scoped.value),
            Self::Opaque(_) => None,
        }
    }

    /// The scope half of a scoped value.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::Scoped(scoped) => Some(&scoped.scope),
            Self::String(_) | Self::Opaque(_) => None,
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Scoped(scoped) => Display::fmt(scoped, f),
            Self::Opaque(bytes) => write!(f, "<opaque {} bytes>", bytes.len()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ScopedValue> for AttributeValue {
    fn from(value: ScopedValue) -> Self {
        Self::Scoped(value)
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// An attribute about a subject: an id plus an ordered sequence of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    #[serde(default)]
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute with no values.
    pub fn new(id: impl Into<AttributeId>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Creates an attribute from an iterator of values.
    pub fn with_values<I, V>(id: impl Into<AttributeId>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self {
            id: id.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends a value (builder pattern).
    pub fn with_value(mut self, value: impl Into<AttributeValue>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.contains(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(AttributeValue::string("alice"), Some("alice"); "plain string")]
    #[test_case(AttributeValue::scoped("staff", "x.org"), Some("staff"); "scoped value half")]
    #[test_case(AttributeValue::opaque(vec![0u8, 1, 2]), None; "opaque has no projection")]
    fn comparison_string_projection(value: AttributeValue, expected: Option<&str>) {
        assert_eq!(value.comparison_string(), expected);
    }

    #[test]
    fn scope_only_for_scoped_values() {
        assert_eq!(AttributeValue::scoped("a", "x.org").scope(), Some("x.org"));
        assert_eq!(AttributeValue::string("a@x.org").scope(), None);
        assert_eq!(AttributeValue::opaque(vec![1u8]).scope(), None);
    }

    #[test_case("member@x.org", Some(("member", "x.org")); "simple")]
    #[test_case("a@b@c.org", Some(("a@b", "c.org")); "splits on last at")]
    #[test_case("@x.org", None; "empty value")]
    #[test_case("member@", None; "empty scope")]
    #[test_case("member", None; "no at sign")]
    fn scoped_value_parse(raw: &str, expected: Option<(&str, &str)>) {
        let parsed = ScopedValue::parse(raw);
        assert_eq!(
            parsed.as_ref().map(|s| (s.value.as_str(), s.scope.as_str())),
            expected
        );
    }

    #[test]
    fn structural_equality() {
        assert_eq!(
            AttributeValue::scoped("a", "x.org"),
            AttributeValue::Scoped(ScopedValue::parse("a@x.org").unwrap())
        );
        assert_ne!(
            AttributeValue::string("a@x.org"),
            AttributeValue::scoped("a", "x.org")
        );
    }

    #[test]
    fn display_renders_scope() {
        assert_eq!(AttributeValue::scoped("a", "x.org").to_string(), "a@x.org");
        assert_eq!(
            AttributeValue::opaque(vec![0u8; 4]).to_string(),
            "<opaque 4 bytes>"
        );
    }

    #[test]
    fn attribute_builder() {
        let attr = Attribute::new("mail")
            .with_value("a@x.org")
            .with_value(AttributeValue::scoped("b", "y.org"));

        assert_eq!(attr.id, "mail");
        assert_eq!(attr.len(), 2);
        assert!(attr.contains(&AttributeValue::string("a@x.org")));
        assert!(Attribute::new("empty").is_empty());
    }

    #[test]
    fn untagged_json_representation() {
        let json = r#"{"id":"affiliation","values":["member",{"value":"staff","scope":"x.org"}]}"#;
        let attr: Attribute = serde_json::from_str(json).expect("deserialize attribute");

        assert_eq!(attr.values[0], AttributeValue::string("member"));
        assert_eq!(attr.values[1], AttributeValue::scoped("staff", "x.org"));

        let back = serde_json::to_string(&attr).expect("serialize attribute");
        let again: Attribute = serde_json::from_str(&back).expect("deserialize again");
        assert_eq!(attr, again);
    }
}
