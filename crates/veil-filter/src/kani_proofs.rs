//! Kani proofs for the tristate algebra and value release.
//!
//! Run with: `cargo kani --tests --harness verify_*`

#[cfg(kani)]
use crate::context::StaticContext;
#[cfg(kani)]
use crate::engine::filter;
#[cfg(kani)]
use crate::matcher::ValueMatcher;
#[cfg(kani)]
use crate::policy::FilterPolicy;
#[cfg(kani)]
use crate::requirement::RequirementRule;
#[cfg(kani)]
use crate::rule::AttributeRule;
#[cfg(kani)]
use crate::tristate::Tristate;
#[cfg(kani)]
use veil_types::Attribute;

#[cfg(kani)]
fn any_tristate() -> Tristate {
    match kani::any::<u8>() % 3 {
        0 => Tristate::True,
        1 => Tristate::False,
        _ => Tristate::Fail,
    }
}

/// **Property**: `!(a ∧ b) == !a ∨ !b` for every pair of tristates.
#[cfg(kani)]
#[kani::proof]
fn verify_de_morgan_and() {
    let a = any_tristate();
    let b = any_tristate();

    assert_eq!(!Tristate::all([a, b]), Tristate::any([!a, !b]));
}

/// **Property**: `!(a ∨ b) == !a ∧ !b` for every pair of tristates.
#[cfg(kani)]
#[kani::proof]
fn verify_de_morgan_or() {
    let a = any_tristate();
    let b = any_tristate();

    assert_eq!(!Tristate::any([a, b]), Tristate::all([!a, !b]));
}

/// **Property**: FAIL never becomes TRUE under negation or conjunction.
#[cfg(kani)]
#[kani::proof]
fn verify_fail_is_never_promoted() {
    let a = any_tristate();

    assert_eq!(!Tristate::Fail, Tristate::Fail);
    assert_ne!(Tristate::all([Tristate::Fail, a]), Tristate::True);
    assert_ne!(Tristate::all([a, Tristate::Fail]), Tristate::True);
}

/// **Property**: A policy that is not active releases nothing.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(4)]
fn verify_inactive_policy_releases_nothing() {
    let requirement = if kani::any() {
        RequirementRule::negate(RequirementRule::any())
    } else {
        RequirementRule::Or(vec![])
    };
    let Ok(policy) = FilterPolicy::builder("p")
        .requirement(requirement)
        .rule(AttributeRule::permit("a", ValueMatcher::any()))
        .build()
    else {
        return;
    };

    let attrs = vec![Attribute::with_values("a", ["v"])];
    assert!(filter(&attrs, &StaticContext::new(), &[policy]).is_empty());
}
