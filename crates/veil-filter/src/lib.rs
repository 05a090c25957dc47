//! # veil-filter: Attribute Release Filtering
//!
//! Decides, per attribute value, what an identity provider may disclose to a
//! requesting party. Policies are authored independently; the engine combines
//! them without a global priority order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Release Request                             │
//! │  (Candidate Attributes + Request Context)    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Policy Activation (once per policy)         │
//! │  └─ RequirementRule → TRUE / FALSE / FAIL    │
//! └─────────────────┬───────────────────────────┘
//!                   │ active policies only
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Per-Attribute Aggregation                   │
//! │  ├─ Permit rules → union of matched values   │
//! │  ├─ Deny rules   → union of matched values   │
//! │  └─ Released = permitted \ denied            │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Released Attributes                         │
//! │  (empty attributes dropped)                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every uncertain path releases less: a requirement that cannot be decided
//! yields `FAIL` and its policy is inactive, and a matcher that cannot
//! decide a value leaves it out.
//!
//! ## Examples
//!
//! ```
//! use veil_filter::{
//!     AttributeRule, FilterPolicy, RequirementRule, StaticContext, StringMatch, ValueMatcher,
//!     filter,
//! };
//! use veil_types::Attribute;
//!
//! let policy = FilterPolicy::builder("research-sp")
//!     .requirement(RequirementRule::requester(StringMatch::exact("https://sp.example.org")))
//!     .rule(AttributeRule::permit("mail", ValueMatcher::any()))
//!     .rule(AttributeRule::deny(
//!         "mail",
//!         ValueMatcher::value(StringMatch::regex(r".*@private\.example\.org")?),
//!     ))
//!     .build()?;
//!
//! let attributes = vec![Attribute::with_values(
//!     "mail",
//!     ["alice@example.org", "alice@private.example.org"],
//! )];
//! let request = StaticContext::new().with_requester("https://sp.example.org");
//!
//! let released = filter(&attributes, &request, &[policy]);
//! assert_eq!(released[0].values.len(), 1);
//! # Ok::<(), veil_filter::PolicyError>(())
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod policy;
pub mod requirement;
pub mod rule;
pub mod string_match;
pub mod tristate;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;

pub use context::{
    EntityAttribute, EntityMetadata, FilterContext, RequestContext, RequestedAttribute,
    StaticContext,
};
pub use engine::{
    AttributeDecision, FilterEngine, FilterOutcome, FilterReport, PolicyActivation, filter,
    filter_with_report,
};
pub use error::{PolicyError, Result, Severity, ValidationIssue};
pub use matcher::{MatchSet, MetadataMatch, ValueMatcher, ValuePredicate};
pub use policy::{FilterPolicy, FilterPolicyBuilder, PolicySet, ValidationOptions};
pub use requirement::{ContextPredicate, RequirementRule};
pub use rule::{AttributeRule, Disposition};
pub use string_match::StringMatch;
pub use tristate::Tristate;
