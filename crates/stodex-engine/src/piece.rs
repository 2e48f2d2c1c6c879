//! One multidimensional PDF piece: an expolynomial density supported on
//! one DBM zone.
//!
//! Pieces own their zone and density outright; cloning a piece is a deep
//! copy, and callers clone before mutating shared inputs.

use bigdecimal::BigDecimal;
use num_traits::{One, Signed, Zero};

use stodex_common::{EngineError, OmegaDecimal, Variable, div_decimal, pow_decimal};

use crate::atom::AtomicTerm;
use crate::exmonomial::Exmonomial;
use crate::expolynomial::Expolynomial;
use crate::zone::{DbmZone, PivotBound, Subzone};

#[derive(Debug, Clone)]
pub struct Gen {
    pub domain: DbmZone,
    pub density: Expolynomial,
}

impl Gen {
    pub fn new(domain: DbmZone, density: Expolynomial) -> Self {
        Gen { domain, density }
    }

    /// The neutral piece: the trivial zone with density one.
    pub fn one() -> Self {
        Gen {
            domain: DbmZone::trivial(),
            density: Expolynomial::one(),
        }
    }

    /// `Uniform(a, b)` over the scratch variable.
    pub fn uniform(a: &BigDecimal, b: &BigDecimal) -> Result<Self, EngineError> {
        let width = b - a;
        if !width.is_positive() {
            return Err(EngineError::DegenerateSupport(format!("[{a}, {b}]")));
        }
        let density = Expolynomial::one().div_constant(&width)?;
        Ok(Gen {
            domain: DbmZone::scratch_interval(
                OmegaDecimal::Finite(a.clone()),
                OmegaDecimal::Finite(b.clone()),
            ),
            density,
        })
    }

    /// `EXP(rate)` over the scratch variable: `rate · e^{−rate·x}` on
    /// `[0, ∞)`.
    pub fn exponential(rate: &BigDecimal) -> Result<Self, EngineError> {
        if !rate.is_positive() {
            return Err(EngineError::InvalidRate(rate.to_string()));
        }
        let x = Variable::scratch();
        let density = Expolynomial::from_exmonomial(Exmonomial::with_terms(
            OmegaDecimal::Finite(rate.clone()),
            [AtomicTerm::exponential(x, rate.clone())],
        ));
        Ok(Gen {
            domain: DbmZone::scratch_interval(OmegaDecimal::zero(), OmegaDecimal::PosInfinite),
            density,
        })
    }

    /// `Erlang(shape, rate)` over the scratch variable:
    /// `rate^k x^{k−1} e^{−rate·x} / (k−1)!` on `[0, ∞)`.
    pub fn erlang(shape: u32, rate: &BigDecimal) -> Result<Self, EngineError> {
        if shape == 0 || !rate.is_positive() {
            return Err(EngineError::InvalidRate(rate.to_string()));
        }
        let x = Variable::scratch();
        let mut factorial = BigDecimal::one();
        for i in 2..shape {
            factorial = &factorial * &BigDecimal::from(i as i64);
        }
        let coefficient = div_decimal(&pow_decimal(rate, shape), &factorial)?;
        let mut terms = vec![AtomicTerm::exponential(x.clone(), rate.clone())];
        if shape > 1 {
            terms.push(AtomicTerm::monomial(x, shape - 1));
        }
        let density = Expolynomial::from_exmonomial(Exmonomial::with_terms(
            OmegaDecimal::Finite(coefficient),
            terms,
        ));
        Ok(Gen {
            domain: DbmZone::scratch_interval(OmegaDecimal::zero(), OmegaDecimal::PosInfinite),
            density,
        })
    }

    /// A piece from a density expression and its support.
    pub fn from_expression(expression: &str, domain: DbmZone) -> Result<Self, EngineError> {
        Ok(Gen {
            domain,
            density: Expolynomial::parse(expression)?,
        })
    }

    /// Evaluate an antiderivative at one pivot limit.
    fn eval_bound(
        antiderivative: &Expolynomial,
        pivot: &Variable,
        bound: &PivotBound,
    ) -> Result<Expolynomial, EngineError> {
        match (&bound.var, &bound.offset) {
            (None, offset) => Ok(antiderivative.bind(pivot, offset)),
            (Some(holder), OmegaDecimal::Finite(offset)) => {
                Ok(antiderivative.substitute_affine(pivot, bound.inverted, Some(holder), offset))
            }
            (Some(_), _) => Err(EngineError::NotFinite),
        }
    }

    /// `F(upper) − F(lower)` for one subzone.
    fn definite(
        antiderivative: &Expolynomial,
        subzone: &Subzone,
    ) -> Result<Expolynomial, EngineError> {
        let upper = Self::eval_bound(antiderivative, &subzone.pivot, &subzone.upper)?;
        let lower = Self::eval_bound(antiderivative, &subzone.pivot, &subzone.lower)?;
        Ok(&upper - &lower)
    }

    /// Total mass of the piece: recursive integration, one pivot at a
    /// time, summed across pivot subzones.
    pub fn integrate_over_domain(&self) -> Result<BigDecimal, EngineError> {
        let zone = self.domain.normalized();
        if !zone.is_full_dimensional() {
            return Ok(BigDecimal::zero());
        }
        let pivot = match zone.timer_variables().next() {
            Some(v) => v.clone(),
            None => {
                let value = self.density.constant_value()?;
                return match value {
                    OmegaDecimal::Finite(v) => Ok(v),
                    _ => Err(EngineError::DivergentIntegral),
                };
            }
        };
        let antiderivative = self.density.integrate(&pivot)?;
        let mut total = BigDecimal::zero();
        for subzone in zone.pivot_subzones(&pivot)? {
            let integral = Self::definite(&antiderivative, &subzone)?;
            let part = Gen::new(subzone.domain, integral).integrate_over_domain()?;
            total = &total + &part;
        }
        Ok(total)
    }

    /// Integrate out `v`, producing one piece per pivot subzone (still
    /// unmerged).
    pub fn project(&self, v: &Variable) -> Result<Vec<Gen>, EngineError> {
        let zone = self.domain.normalized();
        if !zone.is_full_dimensional() {
            return Ok(Vec::new());
        }
        let antiderivative = self.density.integrate(v)?;
        let mut out = Vec::new();
        for subzone in zone.pivot_subzones(v)? {
            let integral = Self::definite(&antiderivative, &subzone)?;
            out.push(Gen::new(subzone.domain, integral));
        }
        Ok(out)
    }

    /// Re-express every other timer as its advance past `v`, then
    /// integrate `v` out: the fundamental firing projection.
    pub fn shift_and_project(&self, v: &Variable) -> Result<Vec<Gen>, EngineError> {
        let zone = self.domain.normalized();
        if !zone.is_full_dimensional() {
            return Ok(Vec::new());
        }
        let mut shifted = self.density.clone();
        for u in zone.timer_variables() {
            if u != v {
                shifted = shifted.shift(u, v);
            }
        }
        let antiderivative = shifted.integrate(v)?;
        let mut out = Vec::new();
        for subzone in zone.shifted_subzones(v)? {
            let integral = Self::definite(&antiderivative, &subzone)?;
            out.push(Gen::new(subzone.domain, integral));
        }
        Ok(out)
    }

    /// Product of two independent PDFs.
    pub fn cartesian_product(&self, other: &Gen) -> Result<Gen, EngineError> {
        Ok(Gen {
            domain: self.domain.cartesian_product(&other.domain)?,
            density: &self.density * &other.density,
        })
    }

    pub fn substitute(&mut self, old: &Variable, new: &Variable) -> Result<(), EngineError> {
        self.domain.substitute(old, new)?;
        self.density.substitute(old, new);
        Ok(())
    }

    /// `old ↦ new + c` on both the zone and the density.
    pub fn substitute_with_constant(
        &mut self,
        old: &Variable,
        new: &Variable,
        c: &BigDecimal,
    ) -> Result<(), EngineError> {
        self.domain.substitute_with_constant(old, new, c)?;
        self.density = self.density.substitute_with_constant(old, new, c);
        Ok(())
    }

    /// Shift every variable in `shifted` by `+c`.
    pub fn constant_shift(&mut self, c: &BigDecimal, shifted: &[Variable]) {
        self.domain.constant_shift(c, shifted);
        let negated = -c;
        for v in shifted {
            if self.density.depends_on(v) {
                self.density = self.density.substitute_with_constant(v, v, &negated);
            }
        }
    }

    /// Firing re-expression against a deterministic timer: replace the
    /// fired variable by `value − new_var` and every other timer by its
    /// advance past the firing.
    pub fn substitute_and_shift(
        &self,
        fired: &Variable,
        new_var: &Variable,
        value: &BigDecimal,
    ) -> Result<Gen, EngineError> {
        let zone = self.domain.normalized();
        let ground = Variable::ground();
        let others: Vec<Variable> = zone
            .timer_variables()
            .filter(|u| *u != fired)
            .cloned()
            .collect();

        let val = OmegaDecimal::Finite(value.clone());
        let mut out_zone = DbmZone::new(
            std::iter::once(new_var.clone())
                .chain(others.iter().cloned())
                .collect::<Vec<_>>(),
        );
        out_zone.set_bound(new_var, &ground, zone.bound(&ground, fired)? + &val)?;
        out_zone.set_bound(&ground, new_var, zone.bound(fired, &ground)? - &val)?;
        for u in &others {
            out_zone.set_bound(u, &ground, zone.bound(u, fired)?.clone())?;
            out_zone.set_bound(&ground, u, zone.bound(fired, u)?.clone())?;
            out_zone.set_bound(u, new_var, zone.bound(u, &ground)? - &val)?;
            out_zone.set_bound(new_var, u, zone.bound(&ground, u)? + &val)?;
            for w in &others {
                if u != w {
                    out_zone.set_bound(u, w, zone.bound(u, w)?.clone())?;
                }
            }
        }
        out_zone.normalize();

        let mut density = self.density.clone();
        for u in &others {
            density = density.shift(u, fired);
        }
        density = density.substitute_affine(fired, true, Some(new_var), value);
        Ok(Gen::new(out_zone, density))
    }

    /// Tighten to `min ≤ v ≤ max` and renormalize the piece; `None` when
    /// the conditioned support is degenerate or carries no mass.
    pub fn condition_to_bound(
        &self,
        v: &Variable,
        min: &OmegaDecimal,
        max: &OmegaDecimal,
    ) -> Result<Option<(Gen, BigDecimal)>, EngineError> {
        let ground = Variable::ground();
        let mut zone = self.domain.clone();
        zone.impose_bound(v, &ground, max.clone())?;
        zone.impose_bound(&ground, v, -min)?;
        zone.normalize();
        if !zone.is_full_dimensional() {
            return Ok(None);
        }
        let conditioned = Gen::new(zone, self.density.clone());
        let mass = conditioned.integrate_over_domain()?;
        if !mass.is_positive() {
            return Ok(None);
        }
        let density = conditioned.density.div_constant(&mass)?;
        Ok(Some((Gen::new(conditioned.domain, density), mass)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn var(s: &str) -> Variable {
        Variable::new(s)
    }

    fn close(a: &BigDecimal, b: &str) -> bool {
        (a - dec(b)).abs() < dec("1e-9")
    }

    #[test]
    fn uniform_mass_is_one() {
        let piece = Gen::uniform(&dec("1"), &dec("3")).unwrap();
        let mass = piece.integrate_over_domain().unwrap();
        assert_eq!(mass, dec("1"));
    }

    #[test]
    fn unit_exponential_mass_is_exactly_one() {
        let piece = Gen::exponential(&dec("1")).unwrap();
        assert_eq!(piece.integrate_over_domain().unwrap(), dec("1"));
    }

    #[test]
    fn erlang_mass_is_one() {
        let piece = Gen::erlang(3, &dec("2")).unwrap();
        let mass = piece.integrate_over_domain().unwrap();
        assert!(close(&mass, "1"), "mass was {mass}");
    }

    #[test]
    fn product_of_uniforms_integrates_to_one() {
        let a = Gen::uniform(&dec("0"), &dec("1")).unwrap();
        let mut b = Gen::uniform(&dec("0"), &dec("2")).unwrap();
        b.substitute(&Variable::scratch(), &var("u")).unwrap();
        let joint = a.cartesian_product(&b).unwrap();
        let mass = joint.integrate_over_domain().unwrap();
        assert!(close(&mass, "1"), "mass was {mass}");
    }

    #[test]
    fn projection_preserves_mass() {
        let a = Gen::uniform(&dec("0"), &dec("2")).unwrap();
        let mut b = Gen::exponential(&dec("1")).unwrap();
        b.substitute(&Variable::scratch(), &var("u")).unwrap();
        let joint = a.cartesian_product(&b).unwrap();
        let before = joint.integrate_over_domain().unwrap();
        let pieces = joint.project(&Variable::scratch()).unwrap();
        let mut after = BigDecimal::zero();
        for p in &pieces {
            after = &after + &p.integrate_over_domain().unwrap();
        }
        assert!(
            (&after - &before).abs() < dec("1e-9"),
            "before {before} after {after}"
        );
    }

    #[test]
    fn shift_and_project_preserves_mass() {
        // two independent uniforms conditioned so the fired one is the
        // minimum are not needed for mass preservation; the raw joint
        // support already splits into subzones
        let a = Gen::uniform(&dec("0"), &dec("1")).unwrap();
        let mut b = Gen::uniform(&dec("0"), &dec("2")).unwrap();
        b.substitute(&Variable::scratch(), &var("u")).unwrap();
        let joint = a.cartesian_product(&b).unwrap();
        let pieces = joint.shift_and_project(&Variable::scratch()).unwrap();
        let mut after = BigDecimal::zero();
        for p in &pieces {
            assert!(!p.domain.contains(&Variable::scratch()));
            after = &after + &p.integrate_over_domain().unwrap();
        }
        assert!(close(&after, "1"), "mass after firing was {after}");
    }

    #[test]
    fn substitute_and_shift_rebuilds_the_support() {
        // fired ~ U(0,1), u ~ U(0,2); firing against a deterministic
        // timer of value 3 re-expresses the state over (d, u - fired)
        // with d = 3 - fired in [2, 3]
        let fired = Gen::uniform(&dec("0"), &dec("1")).unwrap();
        let mut other = Gen::uniform(&dec("0"), &dec("2")).unwrap();
        other.substitute(&Variable::scratch(), &var("u")).unwrap();
        let joint = fired.cartesian_product(&other).unwrap();
        let moved = joint
            .substitute_and_shift(&Variable::scratch(), &var("d"), &dec("3"))
            .unwrap();
        assert!(!moved.domain.contains(&Variable::scratch()));
        let ground = Variable::ground();
        let z = moved.domain.normalized();
        assert_eq!(z.bound(&var("d"), &ground).unwrap(), &OmegaDecimal::from(3));
        assert_eq!(z.bound(&ground, &var("d")).unwrap(), &OmegaDecimal::from(-2));
        let mass = moved.integrate_over_domain().unwrap();
        assert!(close(&mass, "1"), "mass was {mass}");
    }

    #[test]
    fn conditioning_renormalizes_the_piece() {
        // U(1,3) conditioned to [2, inf) keeps half the mass
        let piece = Gen::uniform(&dec("1"), &dec("3")).unwrap();
        let (conditioned, mass) = piece
            .condition_to_bound(
                &Variable::scratch(),
                &OmegaDecimal::from(2),
                &OmegaDecimal::PosInfinite,
            )
            .unwrap()
            .unwrap();
        assert_eq!(mass, dec("0.5"));
        assert_eq!(conditioned.integrate_over_domain().unwrap(), dec("1"));
    }

    #[test]
    fn degenerate_conditioning_is_absent() {
        let piece = Gen::uniform(&dec("1"), &dec("3")).unwrap();
        let out = piece
            .condition_to_bound(
                &Variable::scratch(),
                &OmegaDecimal::from(5),
                &OmegaDecimal::from(7),
            )
            .unwrap();
        assert!(out.is_none());
    }
}
