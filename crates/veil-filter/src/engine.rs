//! Attribute release aggregation.
//!
//! Every policy's requirement is evaluated once per request. For each
//! candidate attribute, the rules of active policies contribute to a permit
//! set and a deny set; a value is released when permitted and not denied.
//!
//! ```text
//! released(a) = (⋃ permit(a) \ ⋃ deny(a)) ∩ a.values
//! ```
//!
//! Union and difference do not care about iteration order, so the result is
//! independent of the order of policies and of rules within a policy.
//! Attributes left with no values are dropped.
//!
//! Requirements such as [`ContextPredicate::ValueCount`] read the candidate
//! attributes themselves. When a policy set contains one, the pass is
//! repeated over its own output until nothing more is removed. The result is
//! then a fixed point, so filtering it again returns it unchanged.
//!
//! [`ContextPredicate::ValueCount`]: crate::ContextPredicate::ValueCount

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, warn};
use veil_types::{Attribute, AttributeId, AttributeValue};

use crate::context::{FilterContext, RequestContext};
use crate::policy::{FilterPolicy, PolicySet};
use crate::rule::Disposition;
use crate::tristate::Tristate;

// ============================================================================
// Entry points
// ============================================================================

/// Filters `attributes` against `policies` for one request.
///
/// Pure and total: the input is never modified and evaluation cannot fail.
/// Attribute order and value order of the input are preserved.
pub fn filter(
    attributes: &[Attribute],
    request: &dyn RequestContext,
    policies: &[FilterPolicy],
) -> Vec<Attribute> {
    evaluate(attributes, request, policies, true).attributes
}

/// Like [`filter`], also returning a per-policy and per-attribute report.
pub fn filter_with_report(
    attributes: &[Attribute],
    request: &dyn RequestContext,
    policies: &[FilterPolicy],
) -> FilterOutcome {
    evaluate(attributes, request, policies, true)
}

/// Released attributes plus the diagnostics gathered while computing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub attributes: Vec<Attribute>,
    pub report: FilterReport,
}

/// Diagnostics for one filter run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    /// Requirement outcome of every policy in the final pass, in policy
    /// order.
    pub activations: Vec<PolicyActivation>,
    /// One entry per candidate attribute, in input order.
    pub decisions: Vec<AttributeDecision>,
    /// Release passes run. More than one only when a policy inspects
    /// candidate attributes.
    pub passes: usize,
}

impl FilterReport {
    /// Policies whose requirement could not be evaluated.
    pub fn failed_policies(&self) -> impl Iterator<Item = &str> {
        self.activations
            .iter()
            .filter(|a| a.outcome.is_fail())
            .map(|a| a.policy_id.as_str())
    }

    pub fn decision(&self, attribute_id: &str) -> Option<&AttributeDecision> {
        self.decisions.iter().find(|d| d.attribute_id == attribute_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyActivation {
    pub policy_id: String,
    pub outcome: Tristate,
}

/// Value counts for one candidate attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDecision {
    pub attribute_id: AttributeId,
    /// Values offered for release.
    pub candidates: usize,
    /// Distinct values some active rule permitted in the last pass that saw
    /// this attribute.
    pub permitted: usize,
    /// Distinct values some active rule denied in that pass.
    pub denied: usize,
    /// Values actually released.
    pub released: usize,
}

// ============================================================================
// Evaluation
// ============================================================================

fn evaluate(
    attributes: &[Attribute],
    request: &dyn RequestContext,
    policies: &[FilterPolicy],
    log_activation: bool,
) -> FilterOutcome {
    let first = release_pass(attributes, request, policies);
    let mut activations = first.activations;
    let mut decisions = first.decisions;
    let (mut origin, mut released): (Vec<usize>, Vec<Attribute>) = first.kept.into_iter().unzip();
    let mut passes = 1;

    // Predicates that read candidate attributes must agree with what is
    // released, so repeat until a pass removes nothing.
    if policies.iter().any(FilterPolicy::inspects_candidates) {
        let mut previous = value_count(attributes);
        while !released.is_empty() && value_count(&released) < previous {
            previous = value_count(&released);
            let pass = release_pass(&released, request, policies);
            passes += 1;

            for (index, decision) in pass.decisions.into_iter().enumerate() {
                let slot = &mut decisions[origin[index]];
                *slot = AttributeDecision {
                    candidates: slot.candidates,
                    ..decision
                };
            }
            activations = pass.activations;
            let (next_origin, next_released): (Vec<usize>, Vec<Attribute>) = pass
                .kept
                .into_iter()
                .map(|(index, attribute)| (origin[index], attribute))
                .unzip();
            origin = next_origin;
            released = next_released;
        }
        debug!(passes, "Release reached a fixed point");
    }

    let requester = request.requester_id().unwrap_or("<unknown>");
    for activation in &activations {
        log_outcome(
            &activation.policy_id,
            requester,
            activation.outcome,
            log_activation,
        );
    }

    FilterOutcome {
        attributes: released,
        report: FilterReport {
            activations,
            decisions,
            passes,
        },
    }
}

/// One evaluation of every policy against a fixed candidate set.
struct ReleasePass {
    activations: Vec<PolicyActivation>,
    /// One entry per candidate, in candidate order.
    decisions: Vec<AttributeDecision>,
    /// Non-empty results, tagged with their candidate index.
    kept: Vec<(usize, Attribute)>,
}

fn release_pass(
    candidates: &[Attribute],
    request: &dyn RequestContext,
    policies: &[FilterPolicy],
) -> ReleasePass {
    let ctx = FilterContext::new(request, candidates);

    let activations: Vec<PolicyActivation> = policies
        .iter()
        .map(|policy| PolicyActivation {
            policy_id: policy.id().to_string(),
            outcome: policy.is_active(&ctx.for_policy(policy.id())),
        })
        .collect();

    let active: Vec<&FilterPolicy> = policies
        .iter()
        .zip(&activations)
        .filter(|(_, activation)| activation.outcome.is_true())
        .map(|(policy, _)| policy)
        .collect();

    let mut kept = Vec::with_capacity(candidates.len());
    let mut decisions = Vec::with_capacity(candidates.len());

    for (index, attribute) in candidates.iter().enumerate() {
        let (released, decision) = filter_attribute(attribute, &active, &ctx);
        decisions.push(decision);
        if !released.is_empty() {
            kept.push((index, released));
        }
    }

    ReleasePass {
        activations,
        decisions,
        kept,
    }
}

fn value_count(attributes: &[Attribute]) -> usize {
    attributes.iter().map(Attribute::len).sum()
}

fn filter_attribute(
    attribute: &Attribute,
    active: &[&FilterPolicy],
    ctx: &FilterContext<'_>,
) -> (Attribute, AttributeDecision) {
    let mut permitted: HashSet<&AttributeValue> = HashSet::new();
    let mut denied: HashSet<&AttributeValue> = HashSet::new();

    for policy in active {
        let policy_ctx = ctx.for_policy(policy.id());
        let rules = policy.rules().iter().filter(|rule| rule.applies_to(attribute));
        for rule in rules {
            let matched = rule.evaluate(attribute, &policy_ctx);
            match rule.disposition {
                Disposition::Permit => permitted.extend(matched),
                Disposition::Deny => denied.extend(matched),
            }
        }
    }

    // Iterating the attribute's own values is also the intersection with them.
    let values: Vec<AttributeValue> = attribute
        .values
        .iter()
        .filter(|value| permitted.contains(value) && !denied.contains(value))
        .cloned()
        .collect();

    let fabricated = permitted
        .iter()
        .filter(|value| !attribute.contains(value))
        .count();
    if fabricated > 0 {
        warn!(
            attribute_id = %attribute.id,
            fabricated,
            "Matcher selected values outside the attribute; ignoring them"
        );
    }

    if values.is_empty() {
        debug!(attribute_id = %attribute.id, "No values released");
    }

    let decision = AttributeDecision {
        attribute_id: attribute.id.clone(),
        candidates: attribute.len(),
        permitted: permitted.len(),
        denied: denied.len(),
        released: values.len(),
    };

    (
        Attribute {
            id: attribute.id.clone(),
            values,
        },
        decision,
    )
}

fn log_outcome(policy_id: &str, requester: &str, outcome: Tristate, verbose: bool) {
    match outcome {
        Tristate::Fail => warn!(
            policy_id,
            requester, "Policy requirement could not be evaluated; treating policy as inactive"
        ),
        Tristate::True if verbose => debug!(policy_id, requester, "Policy active"),
        Tristate::False if verbose => debug!(policy_id, requester, "Policy not active"),
        Tristate::True | Tristate::False => {}
    }
}

// ============================================================================
// FilterEngine
// ============================================================================

/// Holds the current policy set and filters requests against it.
///
/// Each call works on one snapshot of the policy set. [`reload`] publishes a
/// new snapshot; calls already in flight finish with the one they started
/// with.
///
/// [`reload`]: FilterEngine::reload
#[derive(Debug)]
pub struct FilterEngine {
    policies: RwLock<Arc<PolicySet>>,
    log_activation: bool,
}

impl FilterEngine {
    pub fn new(policies: PolicySet) -> Self {
        Self {
            policies: RwLock::new(Arc::new(policies)),
            log_activation: true,
        }
    }

    /// Controls DEBUG logging of TRUE/FALSE activations. FAIL is always
    /// logged at WARN.
    pub fn with_activation_logging(mut self, enabled: bool) -> Self {
        self.log_activation = enabled;
        self
    }

    /// The policy set new calls will use.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        let guard = self.policies.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the policy set, returning the previous one.
    pub fn reload(&self, policies: PolicySet) -> Arc<PolicySet> {
        let next = Arc::new(policies);
        let mut guard = self.policies.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, next);
        debug!(
            previous = previous.len(),
            current = guard.len(),
            "Policy set reloaded"
        );
        previous
    }

    pub fn filter(&self, attributes: &[Attribute], request: &dyn RequestContext) -> Vec<Attribute> {
        self.filter_with_report(attributes, request).attributes
    }

    pub fn filter_with_report(
        &self,
        attributes: &[Attribute],
        request: &dyn RequestContext,
    ) -> FilterOutcome {
        let snapshot = self.snapshot();
        evaluate(attributes, request, snapshot.policies(), self.log_activation)
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(PolicySet::empty())
    }
}

// ============================================================================
// Tests
// ============================================================================
