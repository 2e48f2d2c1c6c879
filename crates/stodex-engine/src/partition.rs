//! Piecewise PDFs: ordered lists of disjoint full-dimensional GEN pieces.
//!
//! Per-piece operations are lifted and the resulting list re-merged:
//! whenever two pieces have a full-dimensional intersection they are
//! replaced by their *subzone induction* — the overlap with summed
//! densities plus the disjoint remainders of both — until the list is
//! pairwise disjoint.

use bigdecimal::BigDecimal;
use num_traits::Zero;
use once_cell::sync::Lazy;
use tracing::trace;

use stodex_common::{EngineError, OmegaDecimal, Variable};

use crate::expolynomial::Expolynomial;
use crate::piece::Gen;
use crate::zone::DbmZone;

/// Pieces whose conditioned mass falls below this threshold are dropped.
pub static MASS_EPSILON: Lazy<BigDecimal> =
    Lazy::new(|| "0.0000001".parse().expect("literal epsilon"));

#[derive(Debug, Clone)]
pub struct PartitionedGen {
    pieces: Vec<Gen>,
}

impl PartitionedGen {
    /// The neutral element of cartesian products: one piece on the
    /// trivial zone with density one.
    pub fn one() -> Self {
        PartitionedGen {
            pieces: vec![Gen::one()],
        }
    }

    pub fn empty() -> Self {
        PartitionedGen { pieces: Vec::new() }
    }

    /// Build from raw pieces, re-merging overlaps; an empty result is
    /// replaced by the neutral instance.
    pub fn from_pieces(pieces: Vec<Gen>) -> Result<Self, EngineError> {
        let merged = merge(pieces)?;
        if merged.is_empty() {
            return Ok(PartitionedGen::one());
        }
        Ok(PartitionedGen { pieces: merged })
    }

    pub fn from_gen(piece: Gen) -> Self {
        PartitionedGen {
            pieces: vec![piece],
        }
    }

    pub fn uniform(a: &BigDecimal, b: &BigDecimal) -> Result<Self, EngineError> {
        Ok(Self::from_gen(Gen::uniform(a, b)?))
    }

    pub fn exponential(rate: &BigDecimal) -> Result<Self, EngineError> {
        Ok(Self::from_gen(Gen::exponential(rate)?))
    }

    pub fn erlang(shape: u32, rate: &BigDecimal) -> Result<Self, EngineError> {
        Ok(Self::from_gen(Gen::erlang(shape, rate)?))
    }

    /// A density expression on a zone over the scratch variable.
    pub fn from_expression(expression: &str, domain: DbmZone) -> Result<Self, EngineError> {
        Ok(Self::from_gen(Gen::from_expression(expression, domain)?))
    }

    pub fn pieces(&self) -> &[Gen] {
        &self.pieces
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Timer variables of the support (identical across pieces).
    pub fn variables(&self) -> Vec<Variable> {
        match self.pieces.first() {
            Some(p) => p.domain.timer_variables().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, v: &Variable) -> bool {
        self.pieces.first().is_some_and(|p| p.domain.contains(v))
    }

    pub fn cartesian_product(&self, other: &PartitionedGen) -> Result<PartitionedGen, EngineError> {
        let mut pieces = Vec::with_capacity(self.pieces.len() * other.pieces.len());
        for a in &self.pieces {
            for b in &other.pieces {
                pieces.push(a.cartesian_product(b)?);
            }
        }
        Ok(PartitionedGen { pieces })
    }

    pub fn substitute(&mut self, old: &Variable, new: &Variable) -> Result<(), EngineError> {
        for p in &mut self.pieces {
            p.substitute(old, new)?;
        }
        Ok(())
    }

    /// `old ↦ new + c` on every piece.
    pub fn substitute_with_constant(
        &mut self,
        old: &Variable,
        new: &Variable,
        c: &BigDecimal,
    ) -> Result<(), EngineError> {
        for p in &mut self.pieces {
            p.substitute_with_constant(old, new, c)?;
        }
        Ok(())
    }

    pub fn constant_shift(&mut self, c: &BigDecimal, shifted: &[Variable]) {
        for p in &mut self.pieces {
            p.constant_shift(c, shifted);
        }
    }

    /// Integrate out `v` across all pieces and re-merge.
    pub fn project(&mut self, v: &Variable) -> Result<(), EngineError> {
        let mut raw = Vec::new();
        for p in &self.pieces {
            raw.extend(p.project(v)?);
        }
        *self = PartitionedGen::from_pieces(raw)?;
        Ok(())
    }

    /// Re-express every other timer relative to `v`, then integrate `v`
    /// out across all pieces and re-merge.
    pub fn shift_and_project(&mut self, v: &Variable) -> Result<(), EngineError> {
        let mut raw = Vec::new();
        for p in &self.pieces {
            raw.extend(p.shift_and_project(v)?);
        }
        *self = PartitionedGen::from_pieces(raw)?;
        Ok(())
    }

    /// Firing re-expression against a deterministic timer, on every piece.
    pub fn substitute_and_shift(
        &mut self,
        fired: &Variable,
        new_var: &Variable,
        value: &BigDecimal,
    ) -> Result<(), EngineError> {
        let mut raw = Vec::new();
        for p in &self.pieces {
            raw.push(p.substitute_and_shift(fired, new_var, value)?);
        }
        *self = PartitionedGen::from_pieces(raw)?;
        Ok(())
    }

    /// Tighten every piece with `left − right ≤ bound`, dropping pieces
    /// that lose full dimension. No renormalization happens here.
    pub fn impose(
        &mut self,
        left: &Variable,
        right: &Variable,
        bound: OmegaDecimal,
    ) -> Result<(), EngineError> {
        let mut kept = Vec::with_capacity(self.pieces.len());
        for mut p in self.pieces.drain(..) {
            p.domain.impose_bound(left, right, bound.clone())?;
            p.domain.normalize();
            if p.domain.is_full_dimensional() {
                kept.push(p);
            }
        }
        self.pieces = kept;
        Ok(())
    }

    /// Wipe the support entirely (an infeasible constant constraint).
    pub fn clear(&mut self) {
        self.pieces.clear();
    }

    pub fn integrate_over_domain(&self) -> Result<BigDecimal, EngineError> {
        let mut total = BigDecimal::zero();
        for p in &self.pieces {
            total = &total + &p.integrate_over_domain()?;
        }
        Ok(total)
    }

    /// Renormalize by the total mass: integrate every piece, drop pieces
    /// below [`MASS_EPSILON`], divide the survivors by the total, and
    /// return the pre-normalization total.
    pub fn normalize_by_total(&mut self) -> Result<BigDecimal, EngineError> {
        let mut masses = Vec::with_capacity(self.pieces.len());
        let mut total = BigDecimal::zero();
        for p in &self.pieces {
            let mass = p.integrate_over_domain()?;
            total = &total + &mass;
            masses.push(mass);
        }
        if total < *MASS_EPSILON {
            trace!(total = %total, "conditioned mass vanished, clearing the support");
            self.pieces.clear();
            return Ok(total);
        }
        let mut kept = Vec::with_capacity(self.pieces.len());
        for (p, mass) in self.pieces.drain(..).zip(masses) {
            if mass < *MASS_EPSILON {
                trace!(mass = %mass, "dropping a negligible piece");
                continue;
            }
            kept.push(Gen::new(p.domain, p.density.div_constant(&total)?));
        }
        self.pieces = kept;
        Ok(total)
    }

    /// Condition to `min ≤ v ≤ max`; returns the pre-normalization mass.
    pub fn condition_to_bound(
        &mut self,
        v: &Variable,
        min: &OmegaDecimal,
        max: &OmegaDecimal,
    ) -> Result<BigDecimal, EngineError> {
        let ground = Variable::ground();
        self.impose(v, &ground, max.clone())?;
        self.impose(&ground, v, -min)?;
        self.normalize_by_total()
    }

    /// `E[v]` of a normalized piecewise PDF.
    pub fn mean_of(&self, v: &Variable) -> Result<BigDecimal, EngineError> {
        let weight = Expolynomial::variable(v.clone());
        let mut total = BigDecimal::zero();
        for p in &self.pieces {
            let weighted = Gen::new(p.domain.clone(), &p.density * &weight);
            total = &total + &weighted.integrate_over_domain()?;
        }
        Ok(total)
    }
}

/// Repeated subzone induction until the pieces are pairwise disjoint.
fn merge(mut pieces: Vec<Gen>) -> Result<Vec<Gen>, EngineError> {
    pieces.retain(|p| p.domain.normalized().is_full_dimensional());
    'scan: loop {
        for i in 0..pieces.len() {
            for j in (i + 1)..pieces.len() {
                let mut overlap = pieces[i].domain.intersect(&pieces[j].domain);
                overlap.normalize();
                if overlap.is_full_dimensional() {
                    trace!(pieces = pieces.len(), "inducting an overlapping pair");
                    let b = pieces.swap_remove(j);
                    let a = pieces.swap_remove(i);
                    induct(a, b, overlap, &mut pieces)?;
                    continue 'scan;
                }
            }
        }
        break;
    }
    Ok(pieces)
}

/// Replace an overlapping pair by disjoint pieces covering their union,
/// with densities summed on the overlap.
fn induct(a: Gen, b: Gen, overlap: DbmZone, out: &mut Vec<Gen>) -> Result<(), EngineError> {
    out.push(Gen::new(overlap.clone(), &a.density + &b.density));
    subtract_into(a, &overlap, out)?;
    subtract_into(b, &overlap, out)?;
    Ok(())
}

/// Decompose `piece ∖ overlap` into disjoint zones, one per violated
/// constraint of the overlap.
fn subtract_into(piece: Gen, overlap: &DbmZone, out: &mut Vec<Gen>) -> Result<(), EngineError> {
    let mut rest = piece.domain.normalized();
    let vars: Vec<Variable> = overlap.variables().to_vec();
    for i in 0..vars.len() {
        for j in 0..vars.len() {
            if i == j {
                continue;
            }
            let c = overlap.bound(&vars[i], &vars[j])?.clone();
            if !c.is_finite() {
                continue;
            }
            let mut complement = rest.clone();
            complement.impose_bound(&vars[j], &vars[i], -&c)?;
            complement.normalize();
            if complement.is_full_dimensional() {
                out.push(Gen::new(complement, piece.density.clone()));
            }
            rest.impose_bound(&vars[i], &vars[j], c)?;
        }
    }
    Ok(())
}
