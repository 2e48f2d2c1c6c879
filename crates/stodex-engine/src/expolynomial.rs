//! Sums of exmonomials, with the full symbolic calculus of the engine:
//! ring operations, substitutions, partial evaluation, antiderivatives,
//! and value-based equality on the canonical (normalized) form.

use bigdecimal::BigDecimal;
use num_traits::Zero;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};

use stodex_common::{EngineError, OmegaDecimal, Variable, exp_decimal};
use stodex_parse::types::ExprNode;

use crate::atom::AtomicTerm;
use crate::exmonomial::{Exmonomial, TermList};

#[derive(Debug, Clone, Eq)]
pub struct Expolynomial {
    terms: Vec<Exmonomial>,
}

impl Expolynomial {
    pub fn zero() -> Self {
        Expolynomial { terms: Vec::new() }
    }

    pub fn one() -> Self {
        Expolynomial {
            terms: vec![Exmonomial::one()],
        }
    }

    pub fn constant(value: OmegaDecimal) -> Self {
        Expolynomial {
            terms: vec![Exmonomial::new(value)],
        }
    }

    pub fn variable(v: Variable) -> Self {
        Expolynomial {
            terms: vec![Exmonomial::with_terms(
                OmegaDecimal::one(),
                [AtomicTerm::monomial(v, 1)],
            )],
        }
    }

    pub fn from_exmonomial(m: Exmonomial) -> Self {
        let mut out = Expolynomial { terms: vec![m] };
        out.normalize();
        out
    }

    pub fn terms(&self) -> &[Exmonomial] {
        &self.terms
    }

    pub fn push(&mut self, m: Exmonomial) {
        self.terms.push(m);
    }

    pub fn is_zero(&self) -> bool {
        self.normalized().terms.is_empty()
    }

    /// Free variables in first-occurrence order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = Vec::new();
        for m in &self.terms {
            for v in m.variables() {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
        }
        out
    }

    pub fn depends_on(&self, v: &Variable) -> bool {
        self.terms.iter().any(|m| m.depends_on(v))
    }

    /// Merge similar exmonomials and drop vanished ones. Insertion order
    /// of the surviving exmonomials is preserved.
    pub fn normalize(&mut self) {
        let mut merged: Vec<Exmonomial> = Vec::new();
        for m in self.terms.drain(..) {
            let m = m.normalized();
            if m.is_zero() {
                continue;
            }
            match merged.iter_mut().find(|e| e.terms() == m.terms()) {
                Some(existing) => existing.add_constant(m.constant()),
                None => merged.push(m),
            }
        }
        merged.retain(|m| !m.is_zero());
        self.terms = merged;
    }

    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.normalize();
        out
    }

    fn canonical(&self) -> Vec<Exmonomial> {
        let mut terms = self.normalized().terms;
        terms.sort_by(|a, b| {
            a.terms()
                .cmp(b.terms())
                .then_with(|| a.constant().cmp(b.constant()))
        });
        terms
    }

    pub fn scale(&mut self, factor: &BigDecimal) {
        for m in &mut self.terms {
            m.scale(factor);
        }
    }

    pub fn scaled(&self, factor: &BigDecimal) -> Self {
        let mut out = self.clone();
        out.scale(factor);
        out.normalize();
        out
    }

    pub fn div_constant(&self, divisor: &BigDecimal) -> Result<Self, EngineError> {
        if divisor.is_zero() {
            return Err(EngineError::ZeroDivisor);
        }
        let mut out = Expolynomial::zero();
        for m in &self.terms {
            let constant = m.constant().divide(divisor)?;
            out.push(Exmonomial::with_terms(constant, m.terms().iter().cloned()));
        }
        out.normalize();
        Ok(out)
    }

    pub fn pow(&self, exponent: u32) -> Self {
        let mut acc = Expolynomial::one();
        for _ in 0..exponent {
            acc = &acc * self;
        }
        acc
    }

    /// Rename `from` to `to`.
    pub fn substitute(&mut self, from: &Variable, to: &Variable) {
        for m in &mut self.terms {
            m.substitute(from, to);
        }
        self.normalize();
    }

    /// `v ↦ u + c`.
    pub fn substitute_with_constant(&self, v: &Variable, u: &Variable, c: &BigDecimal) -> Self {
        self.substitute_affine(v, false, Some(u), c)
    }

    /// `v ↦ ±target + offset`; `target = None` fixes `v` to `offset`.
    pub fn substitute_affine(
        &self,
        v: &Variable,
        negate: bool,
        target: Option<&Variable>,
        offset: &BigDecimal,
    ) -> Self {
        let mut out = Expolynomial::zero();
        for m in &self.terms {
            let expanded = m.substitute_affine(v, negate, target, offset);
            for e in expanded.terms {
                out.push(e);
            }
        }
        out.normalize();
        out
    }

    /// `v ↦ v + u`.
    pub fn shift(&self, v: &Variable, u: &Variable) -> Self {
        let mut out = Expolynomial::zero();
        for m in &self.terms {
            for e in m.shift(v, u).terms {
                out.push(e);
            }
        }
        out.normalize();
        out
    }

    /// Partial evaluation of one variable, including infinite points.
    pub fn bind(&self, v: &Variable, value: &OmegaDecimal) -> Self {
        let mut out = Expolynomial::zero();
        for m in &self.terms {
            out.push(m.bind(v, value));
        }
        out.normalize();
        out
    }

    /// Total evaluation under the given bindings.
    pub fn evaluate(&self, bindings: &[(Variable, OmegaDecimal)]) -> Result<OmegaDecimal, EngineError> {
        let mut acc = self.clone();
        for (v, value) in bindings {
            acc = acc.bind(v, value);
        }
        acc.constant_value()
    }

    /// The value of a variable-free expolynomial.
    pub fn constant_value(&self) -> Result<OmegaDecimal, EngineError> {
        let norm = self.normalized();
        let mut acc = OmegaDecimal::zero();
        for m in &norm.terms {
            if let Some(v) = m.variables().next() {
                return Err(EngineError::UnboundVariable(v.clone()));
            }
            acc = &acc + m.constant();
        }
        Ok(acc)
    }

    /// Antiderivative with respect to `v`.
    pub fn integrate(&self, v: &Variable) -> Result<Self, EngineError> {
        let mut out = Expolynomial::zero();
        for m in &self.terms {
            for e in m.integrate(v)?.terms {
                out.push(e);
            }
        }
        out.normalize();
        Ok(out)
    }

    /// Derivative with respect to `v`.
    pub fn derivative(&self, v: &Variable) -> Self {
        let mut out = Expolynomial::zero();
        for m in &self.terms {
            for e in m.derivative(v).terms {
                out.push(e);
            }
        }
        out.normalize();
        out
    }

    /// Parse an expression string into an expolynomial.
    ///
    /// The grammar allows literals, variables, `+ - * /`, integer `^`, and
    /// `Exp(affine)`; division is restricted to nonzero constant divisors.
    pub fn parse(source: &str) -> Result<Self, EngineError> {
        let ast = stodex_parse::parse(source).map_err(|e| EngineError::Parse(e.to_string()))?;
        Self::from_ast(&ast.simplify())
    }

    fn from_ast(node: &ExprNode) -> Result<Self, EngineError> {
        match node {
            ExprNode::Number(n) => Ok(Expolynomial::constant(OmegaDecimal::Finite(n.clone()))),
            ExprNode::Symbol(s) => Ok(Expolynomial::variable(Variable::new(s.clone()))),
            ExprNode::Neg(e) => Ok(-&Self::from_ast(e)?),
            ExprNode::Add(l, r) => Ok(&Self::from_ast(l)? + &Self::from_ast(r)?),
            ExprNode::Sub(l, r) => Ok(&Self::from_ast(l)? - &Self::from_ast(r)?),
            ExprNode::Mul(l, r) => Ok(&Self::from_ast(l)? * &Self::from_ast(r)?),
            ExprNode::Div(l, r) => {
                let divisor = Self::from_ast(r)?
                    .constant_value()
                    .map_err(|_| EngineError::Parse("divisor must be a constant".into()))?;
                Self::from_ast(l)?.div_constant(divisor.expect_finite()?)
            }
            ExprNode::Pow(b, k) => Ok(Self::from_ast(b)?.pow(*k)),
            ExprNode::Exp(arg) => Self::exponential_of(&Self::from_ast(arg)?),
        }
    }

    /// `e^{c₀ + Σ cᵢ·vᵢ}` as a single exmonomial; rejects non-affine
    /// arguments.
    fn exponential_of(arg: &Expolynomial) -> Result<Self, EngineError> {
        let norm = arg.normalized();
        let mut constant = OmegaDecimal::one();
        let mut terms = TermList::new();
        for m in &norm.terms {
            let vars: Vec<&Variable> = m.variables().collect();
            if vars.is_empty() {
                constant = &constant * &exp_decimal(m.constant().expect_finite()?);
            } else if vars.len() == 1 && m.degree_of(vars[0]) == 1 && m.rate_of(vars[0]).is_zero() {
                let v = vars[0].clone();
                let coefficient = m.constant().expect_finite()?.clone();
                terms.push(AtomicTerm::exponential(v, -coefficient));
            } else {
                return Err(EngineError::Parse(
                    "Exp argument must be affine in the variables".into(),
                ));
            }
        }
        Ok(Expolynomial::from_exmonomial(Exmonomial::with_terms(
            constant, terms,
        )))
    }
}

/* ── operators ─────────────────────────────────────────────────────── */

impl Add for &Expolynomial {
    type Output = Expolynomial;

    fn add(self, rhs: &Expolynomial) -> Expolynomial {
        let mut out = Expolynomial {
            terms: self.terms.iter().chain(rhs.terms.iter()).cloned().collect(),
        };
        out.normalize();
        out
    }
}

impl Sub for &Expolynomial {
    type Output = Expolynomial;

    fn sub(self, rhs: &Expolynomial) -> Expolynomial {
        self + &-rhs
    }
}

impl Neg for &Expolynomial {
    type Output = Expolynomial;

    fn neg(self) -> Expolynomial {
        let mut out = self.clone();
        out.scale(&BigDecimal::from(-1));
        out
    }
}

impl Mul for &Expolynomial {
    type Output = Expolynomial;

    fn mul(self, rhs: &Expolynomial) -> Expolynomial {
        let mut out = Expolynomial::zero();
        for a in &self.terms {
            for b in &rhs.terms {
                out.push(a.multiply(b));
            }
        }
        out.normalize();
        out
    }
}

/// Value equality on the canonical form, insensitive to term order and
/// associative/commutative rewrites.
impl PartialEq for Expolynomial {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Hash for Expolynomial {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for Expolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        for (i, m) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn fin(s: &str) -> OmegaDecimal {
        OmegaDecimal::Finite(dec(s))
    }

    fn var(s: &str) -> Variable {
        Variable::new(s)
    }

    #[test]
    fn ring_identities() {
        let e = Expolynomial::parse("2*x^2 + Exp(-1*x)").unwrap();
        assert_eq!(&e + &Expolynomial::zero(), e);
        assert_eq!(&e * &Expolynomial::one(), e);
        assert!((&e - &e).is_zero());
    }

    #[test]
    fn equality_is_order_insensitive() {
        let a = Expolynomial::parse("x + y").unwrap();
        let b = Expolynomial::parse("y + x").unwrap();
        assert_eq!(a, b);
        let c = Expolynomial::parse("x*(1 + y)").unwrap();
        let d = Expolynomial::parse("x + y*x").unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn substitution_is_an_involution() {
        let x = var("x");
        let y = var("y");
        let original = Expolynomial::parse("x^2*Exp(-2*x) + 3*x").unwrap();
        let mut e = original.clone();
        e.substitute(&x, &y);
        assert!(!e.depends_on(&x));
        e.substitute(&y, &x);
        assert_eq!(e, original);
    }

    #[test]
    fn evaluation_with_bindings() {
        let e = Expolynomial::parse("x*y + 2").unwrap();
        let value = e
            .evaluate(&[(var("x"), fin("3")), (var("y"), fin("4"))])
            .unwrap();
        assert_eq!(value, fin("14"));
        let partial = e.bind(&var("x"), &fin("3"));
        assert!(partial.depends_on(&var("y")));
        assert_eq!(
            partial.constant_value(),
            Err(EngineError::UnboundVariable(var("y")))
        );
    }

    #[test]
    fn definite_integration_of_the_unit_exponential() {
        // integral over [0, inf) of exp(-x) is exactly 1
        let e = Expolynomial::parse("Exp(-1*x)").unwrap();
        let x = var("x");
        let anti = e.integrate(&x).unwrap();
        let upper = anti.bind(&x, &OmegaDecimal::PosInfinite);
        let lower = anti.bind(&x, &fin("0"));
        let mass = (&upper - &lower).constant_value().unwrap();
        assert_eq!(mass, OmegaDecimal::one());
    }

    #[test]
    fn definite_integration_of_erlang_two() {
        // integral over [0, inf) of x*exp(-x) is 1
        let e = Expolynomial::parse("x*Exp(-1*x)").unwrap();
        let x = var("x");
        let anti = e.integrate(&x).unwrap();
        let mass = (&anti.bind(&x, &OmegaDecimal::PosInfinite) - &anti.bind(&x, &fin("0")))
            .constant_value()
            .unwrap();
        assert_eq!(mass, OmegaDecimal::one());
    }

    #[test]
    fn shift_distributes_over_the_support() {
        // (v + u)^2 at v=1, u=2 equals 9
        let v = var("v");
        let u = var("u");
        let e = Expolynomial::parse("v^2").unwrap();
        let shifted = e.shift(&v, &u);
        let value = shifted
            .evaluate(&[(v, fin("1")), (u, fin("2"))])
            .unwrap();
        assert_eq!(value, fin("9"));
    }

    #[test]
    fn parse_rejects_non_affine_exponentials_and_zero_divisors() {
        assert!(matches!(
            Expolynomial::parse("Exp(-1*x^2)"),
            Err(EngineError::Parse(_))
        ));
        assert_eq!(Expolynomial::parse("x / 0"), Err(EngineError::ZeroDivisor));
        assert!(matches!(
            Expolynomial::parse("x / y"),
            Err(EngineError::Parse(_))
        ));
    }

    #[test]
    fn parse_folds_division_into_coefficients() {
        let e = Expolynomial::parse("x / 2").unwrap();
        assert_eq!(
            e.bind(&var("x"), &fin("3")).constant_value().unwrap(),
            fin("1.5")
        );
    }

    #[test]
    fn derivative_matches_the_product_rule() {
        let x = var("x");
        let e = Expolynomial::parse("x^2*Exp(-1*x)").unwrap();
        // d/dx = (2x - x^2) e^{-x}; at x=1 that is e^{-1}
        let d = e.derivative(&x);
        let at_one = d.bind(&x, &fin("1")).constant_value().unwrap();
        let expected = exp_decimal(&dec("-1"));
        assert_eq!(at_one, expected);
    }

    #[test]
    fn hashing_agrees_with_value_equality() {
        use std::collections::hash_map::DefaultHasher;
        let a = Expolynomial::parse("x + y").unwrap();
        let b = Expolynomial::parse("y + x").unwrap();
        let hash = |e: &Expolynomial| {
            let mut h = DefaultHasher::new();
            e.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }
}
