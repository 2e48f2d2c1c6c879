//! Atomic building blocks of exmonomials: `v^k` and `exp(-λ·v)`.

use bigdecimal::BigDecimal;
use num_traits::Zero;
use std::cmp::Ordering;
use std::fmt;

use stodex_common::{Variable, exp_decimal, pow_decimal};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomicTerm {
    /// `variable ^ exponent`
    Monomial { variable: Variable, exponent: u32 },
    /// `exp(-rate * variable)`
    Exponential { variable: Variable, rate: BigDecimal },
}

impl AtomicTerm {
    pub fn monomial(variable: Variable, exponent: u32) -> Self {
        AtomicTerm::Monomial { variable, exponent }
    }

    pub fn exponential(variable: Variable, rate: BigDecimal) -> Self {
        AtomicTerm::Exponential { variable, rate }
    }

    pub fn variable(&self) -> &Variable {
        match self {
            AtomicTerm::Monomial { variable, .. } => variable,
            AtomicTerm::Exponential { variable, .. } => variable,
        }
    }

    /// `v^0` and `exp(-0·v)` are multiplicative units; normalization
    /// drops them.
    pub fn is_neutral(&self) -> bool {
        match self {
            AtomicTerm::Monomial { exponent, .. } => *exponent == 0,
            AtomicTerm::Exponential { rate, .. } => rate.is_zero(),
        }
    }

    pub fn rename(&mut self, from: &Variable, to: &Variable) {
        let variable = match self {
            AtomicTerm::Monomial { variable, .. } => variable,
            AtomicTerm::Exponential { variable, .. } => variable,
        };
        if variable == from {
            *variable = to.clone();
        }
    }

    /// Value at a finite point of the term's variable.
    ///
    /// Limits at infinite points depend on the whole per-variable factor
    /// (polynomial against exponential) and live in
    /// [`Exmonomial::bind`](crate::exmonomial::Exmonomial::bind).
    pub fn evaluate(&self, value: &BigDecimal) -> stodex_common::OmegaDecimal {
        match self {
            AtomicTerm::Monomial { exponent, .. } => {
                stodex_common::OmegaDecimal::Finite(pow_decimal(value, *exponent))
            }
            AtomicTerm::Exponential { rate, .. } => exp_decimal(&(-(rate * value))),
        }
    }

    /// Derivative with respect to the term's own variable: a scalar
    /// coefficient and the residual term (`None` when it degenerates to a
    /// constant).
    pub fn derivative(&self) -> (BigDecimal, Option<AtomicTerm>) {
        match self {
            AtomicTerm::Monomial { variable, exponent } => {
                if *exponent == 0 {
                    (BigDecimal::zero(), None)
                } else if *exponent == 1 {
                    (BigDecimal::from(1), None)
                } else {
                    (
                        BigDecimal::from(*exponent as i64),
                        Some(AtomicTerm::monomial(variable.clone(), exponent - 1)),
                    )
                }
            }
            AtomicTerm::Exponential { rate, .. } => (-rate, Some(self.clone())),
        }
    }

    /// Ordering key used for the canonical term order inside exmonomials:
    /// by variable first, monomials before exponentials.
    fn kind_rank(&self) -> u8 {
        match self {
            AtomicTerm::Monomial { .. } => 0,
            AtomicTerm::Exponential { .. } => 1,
        }
    }
}

impl PartialOrd for AtomicTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AtomicTerm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.variable()
            .cmp(other.variable())
            .then(self.kind_rank().cmp(&other.kind_rank()))
            .then_with(|| match (self, other) {
                (
                    AtomicTerm::Monomial { exponent: a, .. },
                    AtomicTerm::Monomial { exponent: b, .. },
                ) => a.cmp(b),
                (
                    AtomicTerm::Exponential { rate: a, .. },
                    AtomicTerm::Exponential { rate: b, .. },
                ) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

// The rendered form is re-parseable by stodex-parse (modulo the ground
// variable, which never appears in densities).
impl fmt::Display for AtomicTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicTerm::Monomial { variable, exponent } => {
                if *exponent == 1 {
                    write!(f, "{variable}")
                } else {
                    write!(f, "{variable}^{exponent}")
                }
            }
            AtomicTerm::Exponential { variable, rate } => {
                write!(f, "Exp(-{}*{variable})", rate.normalized())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn neutral_terms() {
        let v = Variable::new("a");
        assert!(AtomicTerm::monomial(v.clone(), 0).is_neutral());
        assert!(AtomicTerm::exponential(v.clone(), dec("0")).is_neutral());
        assert!(!AtomicTerm::monomial(v, 2).is_neutral());
    }

    #[test]
    fn finite_evaluation() {
        let v = Variable::new("a");
        let m = AtomicTerm::monomial(v.clone(), 3);
        assert_eq!(
            m.evaluate(&dec("2")),
            stodex_common::OmegaDecimal::Finite(dec("8"))
        );
        let e = AtomicTerm::exponential(v, dec("1"));
        let val = e.evaluate(&dec("0"));
        assert_eq!(val, stodex_common::OmegaDecimal::one());
    }

    #[test]
    fn derivatives() {
        let v = Variable::new("a");
        let (c, t) = AtomicTerm::monomial(v.clone(), 3).derivative();
        assert_eq!(c, dec("3"));
        assert_eq!(t, Some(AtomicTerm::monomial(v.clone(), 2)));
        let (c, t) = AtomicTerm::exponential(v.clone(), dec("2")).derivative();
        assert_eq!(c, dec("-2"));
        assert!(t.is_some());
    }

    #[test]
    fn canonical_order_groups_by_variable() {
        let a = Variable::new("a");
        let b = Variable::new("b");
        let mut terms = vec![
            AtomicTerm::exponential(b.clone(), dec("1")),
            AtomicTerm::exponential(a.clone(), dec("1")),
            AtomicTerm::monomial(b, 1),
            AtomicTerm::monomial(a.clone(), 2),
        ];
        terms.sort();
        assert_eq!(terms[0].variable(), &a);
        assert!(matches!(terms[0], AtomicTerm::Monomial { .. }));
        assert!(matches!(terms[1], AtomicTerm::Exponential { .. }));
    }
}
