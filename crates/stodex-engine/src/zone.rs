//! Difference-bound-matrix zones.
//!
//! A zone stores, for an ordered variable set containing the ground `t*`
//! at index 0, the upper bound of every pairwise difference
//! `xᵢ − xⱼ ≤ B(i,j)`. After [`normalize`](DbmZone::normalize) (all-pairs
//! shortest paths) the matrix is the tightest representation; a negative
//! diagonal entry marks the zone infeasible.
//!
//! [`pivot_subzones`](DbmZone::pivot_subzones) decomposes a zone against a
//! pivot variable into subzones on which the pivot's upper and lower
//! limits are each fixed by one specific variable (or by the ground);
//! [`shifted_subzones`](DbmZone::shifted_subzones) is the analogous
//! decomposition after re-expressing every other variable relative to the
//! pivot, where variable-held limits show up with inverted direction
//! (`offset − var`).

use rustc_hash::FxHashMap;
use std::fmt;

use bigdecimal::BigDecimal;
use stodex_common::{EngineError, OmegaDecimal, Variable};

/// One limit of a pivot variable inside a [`Subzone`]: the value
/// `±var + offset`, with `var = None` denoting the ground (a constant
/// limit, possibly infinite).
#[derive(Debug, Clone, PartialEq)]
pub struct PivotBound {
    pub var: Option<Variable>,
    pub offset: OmegaDecimal,
    pub inverted: bool,
}

impl PivotBound {
    fn constant(offset: OmegaDecimal) -> Self {
        PivotBound {
            var: None,
            offset,
            inverted: false,
        }
    }
}

/// One element of a pivot decomposition: the zone over the remaining
/// variables together with the pivot's two limits on it.
#[derive(Debug, Clone)]
pub struct Subzone {
    pub domain: DbmZone,
    pub pivot: Variable,
    pub lower: PivotBound,
    pub upper: PivotBound,
}

/// Saturating min-plus addition for bounds: `+∞` absorbs.
fn bound_sum(a: &OmegaDecimal, b: &OmegaDecimal) -> OmegaDecimal {
    if matches!(a, OmegaDecimal::PosInfinite) || matches!(b, OmegaDecimal::PosInfinite) {
        OmegaDecimal::PosInfinite
    } else {
        a + b
    }
}

#[derive(Debug, Clone)]
pub struct DbmZone {
    variables: Vec<Variable>,
    index: FxHashMap<Variable, usize>,
    bounds: Vec<OmegaDecimal>,
}

impl DbmZone {
    /// A zone over the given variables plus the ground, unconstrained.
    pub fn new(vars: impl IntoIterator<Item = Variable>) -> Self {
        let mut variables = vec![Variable::ground()];
        for v in vars {
            if !variables.contains(&v) {
                variables.push(v);
            }
        }
        let n = variables.len();
        let mut bounds = vec![OmegaDecimal::PosInfinite; n * n];
        for i in 0..n {
            bounds[i * n + i] = OmegaDecimal::zero();
        }
        let index = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        DbmZone {
            variables,
            index,
            bounds,
        }
    }

    /// The trivial zone over the ground alone.
    pub fn trivial() -> Self {
        DbmZone::new([])
    }

    /// A zone over the scratch variable with `min ≤ x ≤ max`, the usual
    /// support template of one-dimensional PDFs.
    pub fn scratch_interval(min: OmegaDecimal, max: OmegaDecimal) -> Self {
        let x = Variable::scratch();
        let mut zone = DbmZone::new([x.clone()]);
        let ground = Variable::ground();
        zone.set_bound(&x, &ground, max).unwrap();
        zone.set_bound(&ground, &x, -min).unwrap();
        zone
    }

    fn len(&self) -> usize {
        self.variables.len()
    }

    fn idx(&self, v: &Variable) -> Result<usize, EngineError> {
        self.index
            .get(v)
            .copied()
            .ok_or_else(|| EngineError::MissingVariable(v.clone()))
    }

    fn at(&self, i: usize, j: usize) -> &OmegaDecimal {
        &self.bounds[i * self.len() + j]
    }

    fn set_at(&mut self, i: usize, j: usize, value: OmegaDecimal) {
        let n = self.len();
        self.bounds[i * n + j] = value;
    }

    /// All variables, the ground first.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Variables other than the ground, in insertion order.
    pub fn timer_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().skip(1)
    }

    pub fn contains(&self, v: &Variable) -> bool {
        self.index.contains_key(v)
    }

    pub fn dimension(&self) -> usize {
        self.len() - 1
    }

    pub fn add_variable(&mut self, v: Variable) -> Result<(), EngineError> {
        if self.contains(&v) {
            return Err(EngineError::DuplicateVariable(v));
        }
        let old = self.len();
        let n = old + 1;
        let mut bounds = vec![OmegaDecimal::PosInfinite; n * n];
        for i in 0..old {
            for j in 0..old {
                bounds[i * n + j] = self.at(i, j).clone();
            }
        }
        bounds[(n - 1) * n + (n - 1)] = OmegaDecimal::zero();
        self.index.insert(v.clone(), old);
        self.variables.push(v);
        self.bounds = bounds;
        Ok(())
    }

    /// Look up the upper bound of `i − j`.
    pub fn bound(&self, i: &Variable, j: &Variable) -> Result<&OmegaDecimal, EngineError> {
        Ok(self.at(self.idx(i)?, self.idx(j)?))
    }

    /// Assign the upper bound of `i − j` directly.
    pub fn set_bound(
        &mut self,
        i: &Variable,
        j: &Variable,
        value: OmegaDecimal,
    ) -> Result<(), EngineError> {
        let (i, j) = (self.idx(i)?, self.idx(j)?);
        self.set_at(i, j, value);
        Ok(())
    }

    /// Tighten the bound of `i − j` to `min(current, value)` without
    /// touching the rest of the matrix.
    pub fn impose_bound(
        &mut self,
        i: &Variable,
        j: &Variable,
        value: OmegaDecimal,
    ) -> Result<(), EngineError> {
        let (i, j) = (self.idx(i)?, self.idx(j)?);
        if &value < self.at(i, j) {
            self.set_at(i, j, value);
        }
        Ok(())
    }

    /// Floyd–Warshall all-pairs tightening. A negative diagonal afterwards
    /// marks the zone infeasible; see [`is_empty`](DbmZone::is_empty).
    pub fn normalize(&mut self) {
        let n = self.len();
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    let through = bound_sum(self.at(i, k), self.at(k, j));
                    if &through < self.at(i, j) {
                        self.set_at(i, j, through);
                    }
                }
            }
        }
    }

    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.normalize();
        out
    }

    /// Infeasible (empty) after normalization.
    pub fn is_empty(&self) -> bool {
        (0..self.len()).any(|i| self.at(i, i) < &OmegaDecimal::zero())
    }

    /// Strictly positive two-cycles everywhere: no dimension collapsed.
    pub fn is_full_dimensional(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let n = self.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if bound_sum(self.at(i, j), self.at(j, i)) <= OmegaDecimal::zero() {
                    return false;
                }
            }
        }
        true
    }

    /// Elementwise minimum over the union of variable sets; missing
    /// rows/columns default to `+∞`.
    pub fn intersect(&self, other: &DbmZone) -> DbmZone {
        let vars = self
            .timer_variables()
            .chain(other.timer_variables())
            .cloned()
            .collect::<Vec<_>>();
        let mut out = DbmZone::new(vars);
        for zone in [self, other] {
            for (i, vi) in zone.variables.iter().enumerate() {
                for (j, vj) in zone.variables.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    out.impose_bound(vi, vj, zone.at(i, j).clone()).unwrap();
                }
            }
        }
        out
    }

    /// Rename one axis.
    pub fn substitute(&mut self, old: &Variable, new: &Variable) -> Result<(), EngineError> {
        if old == new {
            return Ok(());
        }
        if self.contains(new) {
            return Err(EngineError::DuplicateVariable(new.clone()));
        }
        let i = self.idx(old)?;
        self.index.remove(old);
        self.index.insert(new.clone(), i);
        self.variables[i] = new.clone();
        Ok(())
    }

    /// Rename and translate one axis: `old ↦ new + c`.
    pub fn substitute_with_constant(
        &mut self,
        old: &Variable,
        new: &Variable,
        c: &BigDecimal,
    ) -> Result<(), EngineError> {
        let v = self.idx(old)?;
        let shift = OmegaDecimal::Finite(c.clone());
        for i in 0..self.len() {
            if i == v {
                continue;
            }
            let col = bound_sum(self.at(i, v), &shift);
            self.set_at(i, v, col);
            let row = bound_sum(self.at(v, i), &(-&shift));
            self.set_at(v, i, row);
        }
        if old != new {
            self.substitute(old, new)?;
        }
        Ok(())
    }

    /// Shift every variable in `shifted` by `+c` relative to the ground.
    pub fn constant_shift(&mut self, c: &BigDecimal, shifted: &[Variable]) {
        let marks: Vec<bool> = self
            .variables
            .iter()
            .map(|v| !v.is_ground() && shifted.contains(v))
            .collect();
        let shift = OmegaDecimal::Finite(c.clone());
        for i in 0..self.len() {
            for j in 0..self.len() {
                if marks[i] == marks[j] {
                    continue;
                }
                let value = if marks[i] {
                    bound_sum(self.at(i, j), &shift)
                } else {
                    bound_sum(self.at(i, j), &(-&shift))
                };
                self.set_at(i, j, value);
            }
        }
    }

    /// Combine two zones on disjoint timer sets; cross pairs stay
    /// unconstrained.
    pub fn cartesian_product(&self, other: &DbmZone) -> Result<DbmZone, EngineError> {
        for v in other.timer_variables() {
            if self.contains(v) {
                return Err(EngineError::DuplicateVariable(v.clone()));
            }
        }
        let vars = self
            .timer_variables()
            .chain(other.timer_variables())
            .cloned()
            .collect::<Vec<_>>();
        let mut out = DbmZone::new(vars);
        for zone in [self, other] {
            for (i, vi) in zone.variables.iter().enumerate() {
                for (j, vj) in zone.variables.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    out.set_bound(vi, vj, zone.at(i, j).clone()).unwrap();
                }
            }
        }
        Ok(out)
    }

    /// Drop one axis of a normalized zone (the projection of the
    /// polyhedron onto the remaining variables).
    pub fn project_variable(&mut self, v: &Variable) -> Result<(), EngineError> {
        let drop = self.idx(v)?;
        self.normalize();
        let n = self.len();
        let mut variables = Vec::with_capacity(n - 1);
        let mut bounds = Vec::with_capacity((n - 1) * (n - 1));
        for i in 0..n {
            if i == drop {
                continue;
            }
            variables.push(self.variables[i].clone());
            for j in 0..n {
                if j == drop {
                    continue;
                }
                bounds.push(self.at(i, j).clone());
            }
        }
        self.index = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        self.variables = variables;
        self.bounds = bounds;
        Ok(())
    }

    /// Decompose against a pivot: one subzone per admissible pair of
    /// (lower-limit holder, upper-limit holder) among the remaining
    /// variables and the ground. Only full-dimensional subzones are kept;
    /// together they partition the projection up to measure-zero
    /// boundaries.
    pub fn pivot_subzones(&self, pivot: &Variable) -> Result<Vec<Subzone>, EngineError> {
        let zone = self.normalized();
        let p = zone.idx(pivot)?;
        if zone.is_empty() {
            return Ok(Vec::new());
        }
        let others: Vec<usize> = (0..zone.len()).filter(|&i| i != p).collect();

        // candidates hold a finite limit for the pivot; an empty set means
        // the matching side is unbounded
        let lower: Vec<usize> = others
            .iter()
            .copied()
            .filter(|&j| zone.at(j, p).is_finite())
            .collect();
        let upper: Vec<usize> = others
            .iter()
            .copied()
            .filter(|&j| zone.at(p, j).is_finite())
            .collect();

        let lower_iter: Vec<Option<usize>> = if lower.is_empty() {
            vec![None]
        } else {
            lower.iter().copied().map(Some).collect()
        };
        let upper_iter: Vec<Option<usize>> = if upper.is_empty() {
            vec![None]
        } else {
            upper.iter().copied().map(Some).collect()
        };

        let mut out = Vec::new();
        for &l in &lower_iter {
            for &u in &upper_iter {
                let mut sub = zone.clone();
                sub.project_variable(pivot)?;
                if let Some(l) = l {
                    let vl = &zone.variables[l];
                    for &j in &lower {
                        if j == l {
                            continue;
                        }
                        let vj = &zone.variables[j];
                        sub.impose_bound(vj, vl, zone.at(j, p) - zone.at(l, p))?;
                    }
                    if let Some(u) = u {
                        if l != u {
                            let vu = &zone.variables[u];
                            sub.impose_bound(vl, vu, zone.at(l, p) + zone.at(p, u))?;
                        }
                    }
                }
                if let Some(u) = u {
                    let vu = &zone.variables[u];
                    for &j in &upper {
                        if j == u {
                            continue;
                        }
                        let vj = &zone.variables[j];
                        sub.impose_bound(vu, vj, zone.at(p, j) - zone.at(p, u))?;
                    }
                }
                sub.normalize();
                if !sub.is_full_dimensional() {
                    continue;
                }
                let lower_bound = match l {
                    Some(l) => PivotBound {
                        var: (l != 0).then(|| zone.variables[l].clone()),
                        offset: -zone.at(l, p),
                        inverted: false,
                    },
                    None => PivotBound::constant(OmegaDecimal::NegInfinite),
                };
                let upper_bound = match u {
                    Some(u) => PivotBound {
                        var: (u != 0).then(|| zone.variables[u].clone()),
                        offset: zone.at(p, u).clone(),
                        inverted: false,
                    },
                    None => PivotBound::constant(OmegaDecimal::PosInfinite),
                };
                out.push(Subzone {
                    domain: sub,
                    pivot: pivot.clone(),
                    lower: lower_bound,
                    upper: upper_bound,
                });
            }
        }
        Ok(out)
    }

    /// Decompose for shift-and-project: every remaining variable is
    /// re-expressed as its advance past the pivot (`u' = u − pivot`), and
    /// the subzones carry the pivot's limits in the new coordinates.
    /// Variable-held limits come from the old ground bounds and are
    /// *inverted* (`offset − u'`).
    pub fn shifted_subzones(&self, pivot: &Variable) -> Result<Vec<Subzone>, EngineError> {
        let zone = self.normalized();
        let p = zone.idx(pivot)?;
        if zone.is_empty() {
            return Ok(Vec::new());
        }
        let timers: Vec<usize> = (1..zone.len()).filter(|&i| i != p).collect();

        // the base domain in shifted coordinates: differences between
        // timers survive, and the old pivot bounds become ground bounds
        let mut base = DbmZone::new(
            timers
                .iter()
                .map(|&i| zone.variables[i].clone())
                .collect::<Vec<_>>(),
        );
        for &i in &timers {
            let vi = &zone.variables[i];
            base.set_bound(vi, &Variable::ground(), zone.at(i, p).clone())?;
            base.set_bound(&Variable::ground(), vi, zone.at(p, i).clone())?;
            for &j in &timers {
                if i == j {
                    continue;
                }
                base.set_bound(vi, &zone.variables[j], zone.at(i, j).clone())?;
            }
        }

        let ground = Variable::ground();
        // limit sources for the pivot in shifted coordinates
        let upper_const = zone.at(p, 0).is_finite();
        let lower_const = zone.at(0, p).is_finite();
        let upper_vars: Vec<usize> = timers
            .iter()
            .copied()
            .filter(|&j| zone.at(j, 0).is_finite())
            .collect();
        let lower_vars: Vec<usize> = timers
            .iter()
            .copied()
            .filter(|&j| zone.at(0, j).is_finite())
            .collect();

        let mut upper_sources: Vec<Option<usize>> = Vec::new();
        if upper_const {
            upper_sources.push(None);
        }
        upper_sources.extend(upper_vars.iter().copied().map(Some));
        let unbounded_above = upper_sources.is_empty();
        if unbounded_above {
            upper_sources.push(None);
        }

        let mut lower_sources: Vec<Option<usize>> = Vec::new();
        if lower_const {
            lower_sources.push(None);
        }
        lower_sources.extend(lower_vars.iter().copied().map(Some));
        let unbounded_below = lower_sources.is_empty();
        if unbounded_below {
            lower_sources.push(None);
        }

        let mut out = Vec::new();
        for &lo in &lower_sources {
            for &up in &upper_sources {
                let mut sub = base.clone();
                match up {
                    None if unbounded_above => {}
                    None => {
                        // the constant holds the minimum of the upper limits
                        for &k in &upper_vars {
                            let vk = &zone.variables[k];
                            sub.impose_bound(vk, &ground, zone.at(k, 0) - zone.at(p, 0))?;
                        }
                    }
                    Some(j) => {
                        let vj = &zone.variables[j];
                        for &k in &upper_vars {
                            if k == j {
                                continue;
                            }
                            let vk = &zone.variables[k];
                            sub.impose_bound(vk, vj, zone.at(k, 0) - zone.at(j, 0))?;
                        }
                        if upper_const {
                            sub.impose_bound(&ground, vj, zone.at(p, 0) - zone.at(j, 0))?;
                        }
                    }
                }
                match lo {
                    None if unbounded_below => {}
                    None => {
                        for &k in &lower_vars {
                            let vk = &zone.variables[k];
                            sub.impose_bound(&ground, vk, zone.at(0, k) - zone.at(0, p))?;
                        }
                    }
                    Some(j) => {
                        let vj = &zone.variables[j];
                        for &k in &lower_vars {
                            if k == j {
                                continue;
                            }
                            let vk = &zone.variables[k];
                            sub.impose_bound(vj, vk, zone.at(0, k) - zone.at(0, j))?;
                        }
                        if lower_const {
                            sub.impose_bound(vj, &ground, zone.at(0, p) - zone.at(0, j))?;
                        }
                    }
                }
                // the pivot's admissible interval must be nonempty
                match (lo, up) {
                    (Some(j), None) if !unbounded_above => {
                        let vj = &zone.variables[j];
                        sub.impose_bound(&ground, vj, zone.at(p, 0) + zone.at(0, j))?;
                    }
                    (None, Some(j)) if !unbounded_below => {
                        let vj = &zone.variables[j];
                        sub.impose_bound(vj, &ground, zone.at(j, 0) + zone.at(0, p))?;
                    }
                    (Some(j), Some(k)) if j != k => {
                        let vj = &zone.variables[j];
                        let vk = &zone.variables[k];
                        sub.impose_bound(vk, vj, zone.at(k, 0) + zone.at(0, j))?;
                    }
                    _ => {}
                }
                sub.normalize();
                if !sub.is_full_dimensional() {
                    continue;
                }
                let lower_bound = match lo {
                    Some(j) => PivotBound {
                        var: Some(zone.variables[j].clone()),
                        offset: -zone.at(0, j),
                        inverted: true,
                    },
                    None if unbounded_below => PivotBound::constant(OmegaDecimal::NegInfinite),
                    None => PivotBound::constant(-zone.at(0, p)),
                };
                let upper_bound = match up {
                    Some(j) => PivotBound {
                        var: Some(zone.variables[j].clone()),
                        offset: zone.at(j, 0).clone(),
                        inverted: true,
                    },
                    None if unbounded_above => PivotBound::constant(OmegaDecimal::PosInfinite),
                    None => PivotBound::constant(zone.at(p, 0).clone()),
                };
                out.push(Subzone {
                    domain: sub,
                    pivot: pivot.clone(),
                    lower: lower_bound,
                    upper: upper_bound,
                });
            }
        }
        Ok(out)
    }
}

impl fmt::Display for DbmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (i, vi) in self.variables.iter().enumerate() {
            for (j, vj) in self.variables.iter().enumerate() {
                if i == j || !self.at(i, j).is_finite() {
                    continue;
                }
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{vi} - {vj} <= {}", self.at(i, j))?;
                first = false;
            }
        }
        if first {
            f.write_str("unconstrained")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn fin(s: &str) -> OmegaDecimal {
        OmegaDecimal::Finite(dec(s))
    }

    fn var(s: &str) -> Variable {
        Variable::new(s)
    }

    /// `a ≤ x ≤ b, c ≤ y ≤ d` as a zone.
    fn box_zone(a: &str, b: &str, c: &str, d: &str) -> DbmZone {
        let (x, y, g) = (var("x"), var("y"), Variable::ground());
        let mut z = DbmZone::new([x.clone(), y.clone()]);
        z.set_bound(&x, &g, fin(b)).unwrap();
        z.set_bound(&g, &x, -fin(a)).unwrap();
        z.set_bound(&y, &g, fin(d)).unwrap();
        z.set_bound(&g, &y, -fin(c)).unwrap();
        z
    }

    #[test]
    fn normalization_tightens_differences() {
        let z = box_zone("0", "1", "0", "5").normalized();
        // x - y <= x_max - y_min = 1
        assert_eq!(z.bound(&var("x"), &var("y")).unwrap(), &fin("1"));
        assert_eq!(z.bound(&var("y"), &var("x")).unwrap(), &fin("5"));
        assert!(z.is_full_dimensional());
    }

    #[test]
    fn infeasible_zones_report_empty() {
        let (x, g) = (var("x"), Variable::ground());
        let mut z = DbmZone::new([x.clone()]);
        z.set_bound(&x, &g, fin("1")).unwrap();
        z.set_bound(&g, &x, fin("-2")).unwrap(); // x >= 2 but x <= 1
        z.normalize();
        assert!(z.is_empty());
        assert!(!z.is_full_dimensional());
    }

    #[test]
    fn collapsed_dimensions_are_not_full_dimensional() {
        let z = box_zone("2", "2", "0", "1").normalized();
        assert!(!z.is_empty());
        assert!(!z.is_full_dimensional());
    }

    #[test]
    fn intersect_defaults_missing_pairs_to_infinity() {
        let a = box_zone("0", "4", "0", "4");
        let (w, g) = (var("w"), Variable::ground());
        let mut b = DbmZone::new([var("x"), w.clone()]);
        b.set_bound(&var("x"), &g, fin("2")).unwrap();
        b.set_bound(&w, &g, fin("9")).unwrap();
        let z = a.intersect(&b).normalized();
        assert_eq!(z.bound(&var("x"), &g).unwrap(), &fin("2"));
        assert_eq!(z.bound(&w, &g).unwrap(), &fin("9"));
        assert_eq!(z.bound(&var("y"), &g).unwrap(), &fin("4"));
    }

    #[test]
    fn substitution_round_trips() {
        let mut z = box_zone("0", "3", "1", "2");
        let before = format!("{}", z.normalized());
        z.substitute(&var("x"), &var("z")).unwrap();
        assert!(z.contains(&var("z")));
        assert!(!z.contains(&var("x")));
        z.substitute(&var("z"), &var("x")).unwrap();
        assert_eq!(format!("{}", z.normalized()), before);
    }

    #[test]
    fn translated_substitution_moves_the_interval() {
        // x in [1, 3], x = z + 1  =>  z in [0, 2]
        let (x, z, g) = (var("x"), var("z"), Variable::ground());
        let mut zone = DbmZone::new([x.clone()]);
        zone.set_bound(&x, &g, fin("3")).unwrap();
        zone.set_bound(&g, &x, fin("-1")).unwrap();
        zone.substitute_with_constant(&x, &z, &dec("1")).unwrap();
        zone.normalize();
        assert_eq!(zone.bound(&z, &g).unwrap(), &fin("2"));
        assert_eq!(zone.bound(&g, &z).unwrap(), &fin("0"));
    }

    #[test]
    fn constant_shift_moves_only_the_selected_set() {
        // x in [0, 2], y in [0, 5]; shift x by +1
        let mut z = box_zone("0", "2", "0", "5");
        z.constant_shift(&dec("1"), &[var("x")]);
        z.normalize();
        let g = Variable::ground();
        assert_eq!(z.bound(&var("x"), &g).unwrap(), &fin("3"));
        assert_eq!(z.bound(&g, &var("x")).unwrap(), &fin("-1"));
        assert_eq!(z.bound(&var("y"), &g).unwrap(), &fin("5"));
    }

    #[test]
    fn cartesian_product_keeps_blocks_independent() {
        let a = DbmZone::scratch_interval(fin("0"), fin("1"));
        let mut a2 = a.clone();
        a2.substitute(&Variable::scratch(), &var("u")).unwrap();
        let p = a.cartesian_product(&a2).unwrap();
        assert_eq!(p.dimension(), 2);
        assert_eq!(
            p.bound(&Variable::scratch(), &var("u")).unwrap(),
            &OmegaDecimal::PosInfinite
        );
        assert!(a.cartesian_product(&a).is_err());
    }

    #[test]
    fn pivot_subzones_split_on_the_overlap() {
        // x in [0, 2], y in [0, 3]: projecting x splits y at the point
        // where x's upper limit switches between its own bound and y
        let (x, y) = (var("x"), var("y"));
        let mut z = box_zone("0", "2", "0", "3");
        z.set_bound(&x, &y, fin("0")).unwrap(); // x <= y
        let subzones = z.pivot_subzones(&x).unwrap();
        assert!(!subzones.is_empty());
        for sz in &subzones {
            assert!(sz.domain.is_full_dimensional());
            assert!(!sz.domain.contains(&x));
            assert_eq!(sz.pivot, x);
        }
        // upper-limit holders must include both the ground and y
        let holders: Vec<Option<&Variable>> =
            subzones.iter().map(|s| s.upper.var.as_ref()).collect();
        assert!(holders.contains(&None));
        assert!(holders.contains(&Some(&y)));
    }

    #[test]
    fn pivot_subzones_handle_unbounded_supports() {
        let z = DbmZone::scratch_interval(fin("0"), OmegaDecimal::PosInfinite);
        let subzones = z.pivot_subzones(&Variable::scratch()).unwrap();
        assert_eq!(subzones.len(), 1);
        assert_eq!(subzones[0].lower.offset, fin("0"));
        assert_eq!(subzones[0].upper.offset, OmegaDecimal::PosInfinite);
        assert!(subzones[0].upper.var.is_none());
    }

    #[test]
    fn shifted_subzones_invert_variable_held_limits() {
        let (x, y) = (var("x"), var("y"));
        let mut z = box_zone("0", "2", "0", "3");
        z.set_bound(&x, &y, fin("0")).unwrap(); // x <= y: x is the minimum
        z.normalize();
        let subzones = z.shifted_subzones(&x).unwrap();
        assert!(!subzones.is_empty());
        for sz in &subzones {
            assert!(!sz.domain.contains(&x));
            if let Some(v) = &sz.upper.var {
                assert_eq!(v, &y);
                assert!(sz.upper.inverted);
            }
        }
    }

    proptest! {
        #[test]
        fn normalize_satisfies_the_triangle_inequality(
            raw in proptest::collection::vec(-4i64..8, 9)
        ) {
            let (x, y) = (Variable::new("x"), Variable::new("y"));
            let mut z = DbmZone::new([x.clone(), y.clone()]);
            let vars = [Variable::ground(), x, y];
            let mut it = raw.into_iter();
            for i in &vars {
                for j in &vars {
                    if i == j { continue; }
                    let c = it.next().unwrap();
                    z.set_bound(i, j, OmegaDecimal::from(c)).unwrap();
                }
            }
            z.normalize();
            if !z.is_empty() {
                for i in &vars {
                    for j in &vars {
                        for k in &vars {
                            let direct = z.bound(i, j).unwrap().clone();
                            let through = bound_sum(z.bound(i, k).unwrap(), z.bound(k, j).unwrap());
                            prop_assert!(direct <= through);
                        }
                    }
                }
                // idempotence on feasible zones
                let again = z.normalized();
                for i in &vars {
                    for j in &vars {
                        prop_assert_eq!(z.bound(i, j).unwrap(), again.bound(i, j).unwrap());
                    }
                }
            }
        }
    }
}
