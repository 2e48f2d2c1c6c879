//! Exact collapse of immediate sub-graphs.
//!
//! Vanishing states are left in zero time; the numeric analyzer only sees
//! a reduced graph whose edges carry exponential rates. The absorption
//! probabilities of each vanishing node onto the tangible ones solve
//! `N = (I − Q)⁻¹`, `A = N·R` over exact rationals; a singular `I − Q`
//! means the immediate transitions cycle without exit — a time-lock.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use stodex_common::EngineError;

fn ten_to(exponent: u64) -> BigInt {
    let mut acc = BigInt::one();
    let ten = BigInt::from(10);
    for _ in 0..exponent {
        acc = acc * &ten;
    }
    acc
}

/// Exact rational view of a decimal (`mantissa · 10^{−scale}`).
pub fn rational_from_decimal(d: &BigDecimal) -> BigRational {
    let (mantissa, scale) = d.as_bigint_and_exponent();
    if scale >= 0 {
        BigRational::new(mantissa, ten_to(scale as u64))
    } else {
        BigRational::from_integer(mantissa * ten_to(scale.unsigned_abs()))
    }
}

/// Small dense matrix over `BigRational`.
#[derive(Debug, Clone, PartialEq)]
pub struct RationalMatrix {
    rows: usize,
    cols: usize,
    data: Vec<BigRational>,
}

impl RationalMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        RationalMatrix {
            rows,
            cols,
            data: vec![BigRational::zero(); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, BigRational::one());
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> &BigRational {
        &self.data[i * self.cols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: BigRational) {
        self.data[i * self.cols + j] = value;
    }

    pub fn sub(&self, other: &RationalMatrix) -> RationalMatrix {
        assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        let mut out = Self::zeros(self.rows, self.cols);
        for i in 0..self.data.len() {
            out.data[i] = &self.data[i] - &other.data[i];
        }
        out
    }

    pub fn mul(&self, other: &RationalMatrix) -> RationalMatrix {
        assert_eq!(self.cols, other.rows);
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a.is_zero() {
                    continue;
                }
                for j in 0..other.cols {
                    let acc = out.get(i, j) + a * other.get(k, j);
                    out.set(i, j, acc);
                }
            }
        }
        out
    }

    /// Gauss–Jordan inversion; `None` when singular.
    pub fn invert(&self) -> Option<RationalMatrix> {
        assert_eq!(self.rows, self.cols);
        let n = self.rows;
        let mut work = self.clone();
        let mut inv = Self::identity(n);
        for col in 0..n {
            let pivot_row = (col..n).find(|&r| !work.get(r, col).is_zero())?;
            if pivot_row != col {
                for j in 0..n {
                    let a = work.get(col, j).clone();
                    let b = work.get(pivot_row, j).clone();
                    work.set(col, j, b);
                    work.set(pivot_row, j, a);
                    let a = inv.get(col, j).clone();
                    let b = inv.get(pivot_row, j).clone();
                    inv.set(col, j, b);
                    inv.set(pivot_row, j, a);
                }
            }
            let pivot = work.get(col, col).clone();
            for j in 0..n {
                work.set(col, j, work.get(col, j) / &pivot);
                inv.set(col, j, inv.get(col, j) / &pivot);
            }
            for r in 0..n {
                if r == col || work.get(r, col).is_zero() {
                    continue;
                }
                let factor = work.get(r, col).clone();
                for j in 0..n {
                    let w = work.get(r, j) - &factor * work.get(col, j);
                    work.set(r, j, w);
                    let v = inv.get(r, j) - &factor * inv.get(col, j);
                    inv.set(r, j, v);
                }
            }
        }
        Some(inv)
    }
}

/// One immediate sub-graph: transition probabilities among vanishing
/// nodes (`Q`) and from vanishing onto tangible nodes (`R`).
#[derive(Debug, Clone)]
pub struct ImmediateSubgraph {
    q: RationalMatrix,
    r: RationalMatrix,
}

impl ImmediateSubgraph {
    pub fn new(vanishing: usize, tangible: usize) -> Self {
        ImmediateSubgraph {
            q: RationalMatrix::zeros(vanishing, vanishing),
            r: RationalMatrix::zeros(vanishing, tangible),
        }
    }

    /// Probability of moving from one vanishing node to another.
    pub fn record_immediate(&mut self, from: usize, to: usize, probability: BigRational) {
        let p = self.q.get(from, to) + &probability;
        self.q.set(from, to, p);
    }

    /// Probability of leaving a vanishing node onto a tangible one.
    pub fn record_exit(&mut self, from: usize, to: usize, probability: BigRational) {
        let p = self.r.get(from, to) + &probability;
        self.r.set(from, to, p);
    }

    /// `(I − Q)⁻¹ R`: row `v` holds the absorption distribution of
    /// vanishing node `v` over the tangible nodes.
    pub fn absorption_vectors(&self) -> Result<RationalMatrix, EngineError> {
        let fundamental = RationalMatrix::identity(self.q.rows())
            .sub(&self.q)
            .invert()
            .ok_or(EngineError::TimeLock)?;
        Ok(fundamental.mul(&self.r))
    }
}

/// Destination of a rate edge before reduction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Target {
    Tangible(usize),
    Vanishing(usize),
}

/// Collapse tangible→vanishing→tangible paths into direct rate edges,
/// merging parallel edges by summing rates.
pub fn reduce_edges(
    edges: &[(usize, Target, BigRational)],
    subgraph: &ImmediateSubgraph,
) -> Result<Vec<(usize, usize, BigRational)>, EngineError> {
    let absorption = subgraph.absorption_vectors()?;
    let mut out: Vec<(usize, usize, BigRational)> = Vec::new();
    let mut push = |from: usize, to: usize, rate: BigRational| {
        match out.iter_mut().find(|(f, t, _)| *f == from && *t == to) {
            Some((_, _, existing)) => *existing = &*existing + &rate,
            None => out.push((from, to, rate)),
        }
    };
    for (from, target, rate) in edges {
        match target {
            Target::Tangible(j) => push(*from, *j, rate.clone()),
            Target::Vanishing(v) => {
                for j in 0..absorption.cols() {
                    let p = absorption.get(*v, j);
                    if !p.is_zero() {
                        push(*from, j, rate * p);
                    }
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn decimal_to_rational_is_exact() {
        let d: BigDecimal = "0.125".parse().unwrap();
        assert_eq!(rational_from_decimal(&d), ratio(1, 8));
        let neg: BigDecimal = "-2.5".parse().unwrap();
        assert_eq!(rational_from_decimal(&neg), ratio(-5, 2));
    }

    #[test]
    fn inversion_round_trips() {
        let mut m = RationalMatrix::identity(2);
        m.set(0, 1, ratio(1, 2));
        m.set(1, 0, ratio(1, 3));
        let inv = m.invert().unwrap();
        assert_eq!(m.mul(&inv), RationalMatrix::identity(2));
    }

    #[test]
    fn singular_matrices_have_no_inverse() {
        let mut m = RationalMatrix::zeros(2, 2);
        m.set(0, 0, ratio(1, 1));
        m.set(1, 0, ratio(2, 1));
        assert!(m.invert().is_none());
    }

    #[test]
    fn absorption_of_a_two_step_chain() {
        // v0: 1/2 to t0, 1/2 to v1; v1: all to t1
        let mut sg = ImmediateSubgraph::new(2, 2);
        sg.record_exit(0, 0, ratio(1, 2));
        sg.record_immediate(0, 1, ratio(1, 2));
        sg.record_exit(1, 1, ratio(1, 1));
        let a = sg.absorption_vectors().unwrap();
        assert_eq!(a.get(0, 0), &ratio(1, 2));
        assert_eq!(a.get(0, 1), &ratio(1, 2));
        assert_eq!(a.get(1, 1), &ratio(1, 1));
    }

    #[test]
    fn immediate_cycle_raises_a_time_lock() {
        // three vanishing nodes cycling with probability one
        let mut sg = ImmediateSubgraph::new(3, 1);
        sg.record_immediate(0, 1, ratio(1, 1));
        sg.record_immediate(1, 2, ratio(1, 1));
        sg.record_immediate(2, 0, ratio(1, 1));
        assert_eq!(sg.absorption_vectors(), Err(EngineError::TimeLock));
    }

    #[test]
    fn cycles_with_an_exit_still_absorb() {
        // v0 -> v1 -> v0 with escape probability 1/2 at v1
        let mut sg = ImmediateSubgraph::new(2, 1);
        sg.record_immediate(0, 1, ratio(1, 1));
        sg.record_immediate(1, 0, ratio(1, 2));
        sg.record_exit(1, 0, ratio(1, 2));
        let a = sg.absorption_vectors().unwrap();
        assert_eq!(a.get(0, 0), &ratio(1, 1));
        assert_eq!(a.get(1, 0), &ratio(1, 1));
    }

    #[test]
    fn reduction_collapses_through_vanishing_nodes() {
        let mut sg = ImmediateSubgraph::new(1, 2);
        sg.record_exit(0, 0, ratio(1, 4));
        sg.record_exit(0, 1, ratio(3, 4));
        let edges = vec![
            (0usize, Target::Vanishing(0), ratio(2, 1)),
            (0usize, Target::Tangible(0), ratio(1, 1)),
        ];
        let reduced = reduce_edges(&edges, &sg).unwrap();
        // rate 2 splits 1/4 vs 3/4, and the direct edge merges in
        assert_eq!(reduced.len(), 2);
        assert!(reduced.contains(&(0, 0, ratio(3, 2))));
        assert!(reduced.contains(&(0, 1, ratio(3, 2))));
    }
}
