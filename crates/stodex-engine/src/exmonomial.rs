//! A single product term `c · Π atomicᵢ` of an expolynomial.
//!
//! The distinguished constant `c` is an [`OmegaDecimal`]; the atomic terms
//! are kept in canonical order (by variable, monomial before exponential),
//! so that after [`normalize`](Exmonomial::normalize) two exmonomials are
//! *similar* (addable) iff their term lists are equal.

use bigdecimal::BigDecimal;
use num_traits::{One, Signed, Zero};
use smallvec::SmallVec;
use std::fmt;

use stodex_common::{
    EngineError, OmegaDecimal, Variable, div_decimal, exp_decimal, pow_decimal,
};

use crate::atom::AtomicTerm;
use crate::expolynomial::Expolynomial;

pub type TermList = SmallVec<[AtomicTerm; 4]>;

/// Binomial coefficient as a decimal; exponents in densities stay small.
fn binomial(k: u32, i: u32) -> BigDecimal {
    let mut acc: u128 = 1;
    let i = i.min(k - i);
    for j in 0..i {
        acc = acc * (k - j) as u128 / (j + 1) as u128;
    }
    BigDecimal::from(acc)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Exmonomial {
    constant: OmegaDecimal,
    terms: TermList,
}

impl Exmonomial {
    pub fn new(constant: OmegaDecimal) -> Self {
        Exmonomial {
            constant,
            terms: SmallVec::new(),
        }
    }

    pub fn with_terms(constant: OmegaDecimal, terms: impl IntoIterator<Item = AtomicTerm>) -> Self {
        let mut out = Exmonomial {
            constant,
            terms: terms.into_iter().collect(),
        };
        out.normalize();
        out
    }

    pub fn one() -> Self {
        Exmonomial::new(OmegaDecimal::one())
    }

    pub fn constant(&self) -> &OmegaDecimal {
        &self.constant
    }

    pub fn terms(&self) -> &[AtomicTerm] {
        &self.terms
    }

    pub fn is_zero(&self) -> bool {
        self.constant.is_zero()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn scale(&mut self, factor: &BigDecimal) {
        self.constant = &self.constant * &OmegaDecimal::Finite(factor.clone());
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.terms.iter().map(|t| t.variable())
    }

    pub fn depends_on(&self, v: &Variable) -> bool {
        self.terms.iter().any(|t| t.variable() == v)
    }

    /// Total monomial degree in `v` (at most one monomial term after
    /// normalization).
    pub fn degree_of(&self, v: &Variable) -> u32 {
        self.terms
            .iter()
            .filter_map(|t| match t {
                AtomicTerm::Monomial { variable, exponent } if variable == v => Some(*exponent),
                _ => None,
            })
            .sum()
    }

    /// Accumulated exponential rate on `v`.
    pub fn rate_of(&self, v: &Variable) -> BigDecimal {
        let mut rate = BigDecimal::zero();
        for t in &self.terms {
            if let AtomicTerm::Exponential { variable, rate: r } = t {
                if variable == v {
                    rate = &rate + r;
                }
            }
        }
        rate
    }

    /// Merge terms sharing a variable and kind (exponents add, rates sum),
    /// drop units, and sort into the canonical order.
    pub fn normalize(&mut self) {
        if self.constant.is_zero() {
            self.terms.clear();
            return;
        }
        self.terms.sort();
        let mut merged: TermList = SmallVec::new();
        for term in self.terms.drain(..) {
            match (merged.last_mut(), term) {
                (
                    Some(AtomicTerm::Monomial { variable: pv, exponent: pe }),
                    AtomicTerm::Monomial { variable, exponent },
                ) if *pv == variable => {
                    *pe += exponent;
                }
                (
                    Some(AtomicTerm::Exponential { variable: pv, rate: pr }),
                    AtomicTerm::Exponential { variable, rate },
                ) if *pv == variable => {
                    *pr = &*pr + &rate;
                }
                (_, term) => merged.push(term),
            }
        }
        merged.retain(|t| !t.is_neutral());
        self.terms = merged;
    }

    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.normalize();
        out
    }

    /// Similar exmonomials have the same normalized term multiset and may
    /// be added by summing constants.
    pub fn is_similar(&self, other: &Exmonomial) -> bool {
        self.normalized().terms == other.normalized().terms
    }

    pub fn add_constant(&mut self, other: &OmegaDecimal) {
        self.constant = &self.constant + other;
    }

    pub fn multiply(&self, other: &Exmonomial) -> Exmonomial {
        let mut out = Exmonomial {
            constant: &self.constant * &other.constant,
            terms: self.terms.iter().chain(other.terms.iter()).cloned().collect(),
        };
        out.normalize();
        out
    }

    /// Rename `from` to `to` (pure renaming, no translation).
    pub fn substitute(&mut self, from: &Variable, to: &Variable) {
        for t in &mut self.terms {
            t.rename(from, to);
        }
        self.normalize();
    }

    /// Partial evaluation: fix `v` to `value` and fold the per-variable
    /// factor `v^k · exp(−λv)` into the constant.
    ///
    /// At infinite points the factor is the joint limit, where exponential
    /// decay dominates polynomial growth.
    pub fn bind(&self, v: &Variable, value: &OmegaDecimal) -> Exmonomial {
        let base = self.normalized();
        let k = base.degree_of(v);
        let lambda = base.rate_of(v);
        if k == 0 && lambda.is_zero() {
            return base;
        }
        let factor = match value {
            OmegaDecimal::Finite(x) => {
                &OmegaDecimal::Finite(pow_decimal(x, k)) * &exp_decimal(&(-(&lambda * x)))
            }
            OmegaDecimal::PosInfinite => {
                if lambda.is_positive() {
                    OmegaDecimal::zero()
                } else if lambda.is_negative() || k > 0 {
                    OmegaDecimal::PosInfinite
                } else {
                    OmegaDecimal::one()
                }
            }
            OmegaDecimal::NegInfinite => {
                if lambda.is_negative() {
                    OmegaDecimal::zero()
                } else if lambda.is_zero() && k == 0 {
                    OmegaDecimal::one()
                } else if k % 2 == 1 {
                    OmegaDecimal::NegInfinite
                } else {
                    OmegaDecimal::PosInfinite
                }
            }
        };
        let terms: TermList = base
            .terms
            .iter()
            .filter(|t| t.variable() != v)
            .cloned()
            .collect();
        Exmonomial {
            constant: &base.constant * &factor,
            terms,
        }
    }

    /// `v ↦ v + u`: binomial expansion over the two variables.
    pub fn shift(&self, v: &Variable, u: &Variable) -> Expolynomial {
        let base = self.normalized();
        let k = base.degree_of(v);
        let lambda = base.rate_of(v);
        let mut common: TermList = base
            .terms
            .iter()
            .filter(|t| t.variable() != v)
            .cloned()
            .collect();
        if !lambda.is_zero() {
            common.push(AtomicTerm::exponential(v.clone(), lambda.clone()));
            common.push(AtomicTerm::exponential(u.clone(), lambda.clone()));
        }
        let mut out = Expolynomial::zero();
        for i in 0..=k {
            let coeff = OmegaDecimal::Finite(binomial(k, i));
            let mut terms = common.clone();
            if i > 0 {
                terms.push(AtomicTerm::monomial(v.clone(), i));
            }
            if k - i > 0 {
                terms.push(AtomicTerm::monomial(u.clone(), k - i));
            }
            out.push(Exmonomial::with_terms(&base.constant * &coeff, terms));
        }
        out.normalize();
        out
    }

    /// `v ↦ ±target + offset` with a finite offset; `target = None` fixes
    /// `v` to the constant `offset`.
    pub fn substitute_affine(
        &self,
        v: &Variable,
        negate: bool,
        target: Option<&Variable>,
        offset: &BigDecimal,
    ) -> Expolynomial {
        let base = self.normalized();
        let k = base.degree_of(v);
        let lambda = base.rate_of(v);
        let mut constant = base.constant.clone();
        let mut common: TermList = base
            .terms
            .iter()
            .filter(|t| t.variable() != v)
            .cloned()
            .collect();
        if !lambda.is_zero() {
            constant = &constant * &exp_decimal(&(-(&lambda * offset)));
            if let Some(t) = target {
                let rate = if negate { -&lambda } else { lambda.clone() };
                common.push(AtomicTerm::exponential((*t).clone(), rate));
            }
        }
        let mut out = Expolynomial::zero();
        match target {
            None => {
                let factor = OmegaDecimal::Finite(pow_decimal(offset, k));
                out.push(Exmonomial {
                    constant: &constant * &factor,
                    terms: common,
                });
            }
            Some(t) => {
                for i in 0..=k {
                    let mut coeff = &binomial(k, i) * &pow_decimal(offset, k - i);
                    if negate && i % 2 == 1 {
                        coeff = -coeff;
                    }
                    let mut terms = common.clone();
                    if i > 0 {
                        terms.push(AtomicTerm::monomial((*t).clone(), i));
                    }
                    out.push(Exmonomial::with_terms(
                        &constant * &OmegaDecimal::Finite(coeff),
                        terms,
                    ));
                }
            }
        }
        out.normalize();
        out
    }

    /// Antiderivative with respect to `v`:
    /// `∫ v^k e^{−λv} dv = −e^{−λv} Σⱼ k!/(λ^{j+1}(k−j)!) v^{k−j}` when
    /// `λ ≠ 0`, the polynomial rule otherwise. Terms in other variables
    /// pass through as multiplicative constants.
    pub fn integrate(&self, v: &Variable) -> Result<Expolynomial, EngineError> {
        let base = self.normalized();
        let c = base.constant.expect_finite()?.clone();
        let k = base.degree_of(v);
        let lambda = base.rate_of(v);
        let rest: TermList = base
            .terms
            .iter()
            .filter(|t| t.variable() != v)
            .cloned()
            .collect();
        let mut out = Expolynomial::zero();
        if lambda.is_zero() {
            let coeff = div_decimal(&c, &BigDecimal::from((k + 1) as i64))?;
            let mut terms = rest;
            terms.push(AtomicTerm::monomial(v.clone(), k + 1));
            out.push(Exmonomial::with_terms(OmegaDecimal::Finite(coeff), terms));
        } else {
            let mut falling = BigDecimal::one();
            for j in 0..=k {
                if j > 0 {
                    falling = &falling * &BigDecimal::from((k - j + 1) as i64);
                }
                let denom = pow_decimal(&lambda, j + 1);
                let coeff = -div_decimal(&(&c * &falling), &denom)?;
                let mut terms = rest.clone();
                if k - j > 0 {
                    terms.push(AtomicTerm::monomial(v.clone(), k - j));
                }
                terms.push(AtomicTerm::exponential(v.clone(), lambda.clone()));
                out.push(Exmonomial::with_terms(OmegaDecimal::Finite(coeff), terms));
            }
        }
        out.normalize();
        Ok(out)
    }

    /// Derivative with respect to `v` by the product rule:
    /// `d/dv (c v^k e^{−λv} R) = c (k v^{k−1} − λ v^k) e^{−λv} R`.
    pub fn derivative(&self, v: &Variable) -> Expolynomial {
        let base = self.normalized();
        let k = base.degree_of(v);
        let lambda = base.rate_of(v);
        let rest: TermList = base
            .terms
            .iter()
            .filter(|t| t.variable() != v)
            .cloned()
            .collect();
        let mut out = Expolynomial::zero();
        if k > 0 {
            let mut terms = rest.clone();
            if k - 1 > 0 {
                terms.push(AtomicTerm::monomial(v.clone(), k - 1));
            }
            if !lambda.is_zero() {
                terms.push(AtomicTerm::exponential(v.clone(), lambda.clone()));
            }
            out.push(Exmonomial::with_terms(
                &base.constant * &OmegaDecimal::Finite(BigDecimal::from(k as i64)),
                terms,
            ));
        }
        if !lambda.is_zero() {
            let mut terms = rest;
            if k > 0 {
                terms.push(AtomicTerm::monomial(v.clone(), k));
            }
            terms.push(AtomicTerm::exponential(v.clone(), lambda.clone()));
            out.push(Exmonomial::with_terms(
                &base.constant * &OmegaDecimal::Finite(-lambda),
                terms,
            ));
        }
        out.normalize();
        out
    }
}

impl fmt::Display for Exmonomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "{}", self.constant);
        }
        let one = OmegaDecimal::one();
        let minus_one = -&one;
        if self.constant == minus_one {
            f.write_str("-")?;
        } else if self.constant != one {
            write!(f, "{}*", self.constant)?;
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}
