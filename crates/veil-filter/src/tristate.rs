//! Three-valued logic for policy activation.
//!
//! `Fail` means "could not be determined" and is kept distinct from `False`
//! ("determined, does not apply") through every combinator. Neither `And` nor
//! `Or` ever turns a `Fail` into `True`.

use std::fmt::{self, Display};
use std::ops::Not;

use serde::{Deserialize, Serialize};

// ============================================================================
// Tristate
// ============================================================================

/// Result of evaluating a requirement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tristate {
    /// Determined, applies.
    True,
    /// Determined, does not apply.
    False,
    /// Could not be determined (e.g., required context missing).
    Fail,
}

impl Tristate {
    /// All three values, in declaration order.
    pub const ALL: [Tristate; 3] = [Tristate::True, Tristate::False, Tristate::Fail];

    pub fn is_true(self) -> bool {
        self == Self::True
    }

    pub fn is_fail(self) -> bool {
        self == Self::Fail
    }

    /// Conjunction over lazily produced operands.
    ///
    /// Operands are consumed in order. The first `Fail` or `False` ends the
    /// evaluation and is the result; remaining operands are never produced.
    /// No operands yields `True`.
    pub fn all<I>(operands: I) -> Self
    where
        I: IntoIterator<Item = Tristate>,
    {
        for operand in operands {
            match operand {
                Self::True => {}
                other => return other,
            }
        }
        Self::True
    }

    /// Disjunction over lazily produced operands.
    ///
    /// The exact dual of [`Tristate::all`]: the first `True` or `Fail` ends the
    /// evaluation and is the result. No operands yields `False`.
    pub fn any<I>(operands: I) -> Self
    where
        I: IntoIterator<Item = Tristate>,
    {
        for operand in operands {
            match operand {
                Self::False => {}
                other => return other,
            }
        }
        Self::False
    }
}

impl Not for Tristate {
    type Output = Tristate;

    fn not(self) -> Self::Output {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Fail => Self::Fail,
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Fail => "FAIL",
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Tristate::{Fail, False, True};
    use super::*;
    use std::cell::Cell;
    use test_case::test_case;

    #[test_case(True, False)]
    #[test_case(False, True)]
    #[test_case(Fail, Fail)]
    fn not_truth_table(input: Tristate, expected: Tristate) {
        assert_eq!(!input, expected);
    }

    #[test_case(True, True => True)]
    #[test_case(True, False => False)]
    #[test_case(True, Fail => Fail)]
    #[test_case(False, True => False)]
    #[test_case(False, False => False)]
    #[test_case(False, Fail => False; "false short-circuits before fail")]
    #[test_case(Fail, True => Fail)]
    #[test_case(Fail, False => Fail)]
    #[test_case(Fail, Fail => Fail)]
    fn and_truth_table(a: Tristate, b: Tristate) -> Tristate {
        Tristate::all([a, b])
    }

    #[test_case(True, True => True)]
    #[test_case(True, False => True)]
    #[test_case(True, Fail => True)]
    #[test_case(False, True => True)]
    #[test_case(False, False => False)]
    #[test_case(False, Fail => Fail)]
    #[test_case(Fail, True => Fail; "fail short-circuits before true")]
    #[test_case(Fail, False => Fail)]
    #[test_case(Fail, Fail => Fail)]
    fn or_truth_table(a: Tristate, b: Tristate) -> Tristate {
        Tristate::any([a, b])
    }

    #[test]
    fn empty_combinators_are_identities() {
        assert_eq!(Tristate::all(Vec::new()), True);
        assert_eq!(Tristate::any(Vec::new()), False);
    }

    #[test]
    fn de_morgan_holds_for_all_nine_pairs() {
        for a in Tristate::ALL {
            for b in Tristate::ALL {
                assert_eq!(
                    !Tristate::all([a, b]),
                    Tristate::any([!a, !b]),
                    "Not(And({a}, {b})) != Or(Not({a}), Not({b}))"
                );
                assert_eq!(
                    !Tristate::any([a, b]),
                    Tristate::all([!a, !b]),
                    "Not(Or({a}, {b})) != And(Not({a}), Not({b}))"
                );
            }
        }
    }

    #[test]
    fn and_stops_consuming_after_fail() {
        let consumed = Cell::new(0);
        let operands = [Fail, True, True].into_iter().inspect(|_| {
            consumed.set(consumed.get() + 1);
        });

        assert_eq!(Tristate::all(operands), Fail);
        assert_eq!(consumed.get(), 1);
    }

    #[test]
    fn or_stops_consuming_after_true() {
        let consumed = Cell::new(0);
        let operands = [False, True, Fail].into_iter().inspect(|_| {
            consumed.set(consumed.get() + 1);
        });

        assert_eq!(Tristate::any(operands), True);
        assert_eq!(consumed.get(), 2);
    }

    #[test]
    fn display_and_serde_use_upper_case() {
        assert_eq!(Fail.to_string(), "FAIL");
        assert_eq!(serde_json::to_string(&True).unwrap(), "\"TRUE\"");
        let parsed: Tristate = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(parsed, Fail);
    }
}
