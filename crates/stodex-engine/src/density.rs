//! Joint PDF over the deterministic, synchronized, and continuous timers
//! of one state.
//!
//! The three kind sets are disjoint; every synchronized entry points at an
//! existing continuous variable; all pieces of the continuous partition
//! share one variable set. Exponential timers are memoryless and kept as a
//! plain rate map, never materialized into the partition (the successor
//! evaluator materializes their race minimum on demand).

use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use num_traits::{One, Signed, Zero};

use stodex_common::{EngineError, OmegaDecimal, Variable, div_decimal};

use crate::partition::PartitionedGen;

/// Kind of a timer inside a [`StateDensity`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Deterministic,
    Synchronized,
    Exponential,
    Continuous,
}

/// A deterministic delay relative to a continuous (distributed) timer:
/// the synchronized variable equals `distributed + delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct Synchronization {
    pub distributed: Variable,
    pub delay: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct StateDensity {
    deterministic: IndexMap<Variable, BigDecimal>,
    synchronized: IndexMap<Variable, Synchronization>,
    exp_rates: IndexMap<Variable, BigDecimal>,
    continuous: PartitionedGen,
}

impl Default for StateDensity {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDensity {
    pub fn new() -> Self {
        StateDensity {
            deterministic: IndexMap::new(),
            synchronized: IndexMap::new(),
            exp_rates: IndexMap::new(),
            continuous: PartitionedGen::one(),
        }
    }

    /* ── inspection ───────────────────────────────────────────── */

    pub fn kind(&self, v: &Variable) -> Option<VariableKind> {
        if self.deterministic.contains_key(v) {
            Some(VariableKind::Deterministic)
        } else if self.synchronized.contains_key(v) {
            Some(VariableKind::Synchronized)
        } else if self.exp_rates.contains_key(v) {
            Some(VariableKind::Exponential)
        } else if self.continuous.contains(v) {
            Some(VariableKind::Continuous)
        } else {
            None
        }
    }

    /// All timers, in kind order then insertion order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = Vec::new();
        out.extend(self.deterministic.keys().cloned());
        out.extend(self.synchronized.keys().cloned());
        out.extend(self.exp_rates.keys().cloned());
        out.extend(self.continuous.variables());
        out
    }

    pub fn deterministic_value(&self, v: &Variable) -> Option<&BigDecimal> {
        self.deterministic.get(v)
    }

    pub fn synchronization(&self, v: &Variable) -> Option<&Synchronization> {
        self.synchronized.get(v)
    }

    pub fn deterministic_entries(&self) -> impl Iterator<Item = (&Variable, &BigDecimal)> {
        self.deterministic.iter()
    }

    pub fn synchronized_entries(&self) -> impl Iterator<Item = (&Variable, &Synchronization)> {
        self.synchronized.iter()
    }

    pub fn exp_rate(&self, v: &Variable) -> Option<&BigDecimal> {
        self.exp_rates.get(v)
    }

    pub fn exp_rates(&self) -> impl Iterator<Item = (&Variable, &BigDecimal)> {
        self.exp_rates.iter()
    }

    pub fn exp_rate_total(&self) -> BigDecimal {
        let mut total = BigDecimal::zero();
        for rate in self.exp_rates.values() {
            total = &total + rate;
        }
        total
    }

    pub fn continuous(&self) -> &PartitionedGen {
        &self.continuous
    }

    /// Smallest deterministic value (first of the ties in insertion
    /// order).
    pub fn min_deterministic(&self) -> Option<(&Variable, &BigDecimal)> {
        let mut best: Option<(&Variable, &BigDecimal)> = None;
        for (v, value) in &self.deterministic {
            match best {
                Some((_, current)) if current <= value => {}
                _ => best = Some((v, value)),
            }
        }
        best
    }

    /// A state is vanishing when some deterministic timer is already due.
    pub fn is_vanishing(&self) -> bool {
        self.deterministic.values().any(|v| v.is_zero())
    }

    fn ensure_absent(&self, v: &Variable) -> Result<(), EngineError> {
        if v.is_ground() || self.kind(v).is_some() {
            return Err(EngineError::DuplicateVariable(v.clone()));
        }
        Ok(())
    }

    /* ── addition ─────────────────────────────────────────────── */

    pub fn add_deterministic(&mut self, v: Variable, value: BigDecimal) -> Result<(), EngineError> {
        self.ensure_absent(&v)?;
        self.deterministic.insert(v, value);
        Ok(())
    }

    pub fn add_synchronized(
        &mut self,
        v: Variable,
        distributed: Variable,
        delay: BigDecimal,
    ) -> Result<(), EngineError> {
        self.ensure_absent(&v)?;
        if !self.continuous.contains(&distributed) {
            return Err(EngineError::MissingVariable(distributed));
        }
        self.synchronized.insert(
            v,
            Synchronization {
                distributed,
                delay,
            },
        );
        Ok(())
    }

    /// Multiply an independent PDF (over the scratch variable) into the
    /// continuous partition under the name `v`.
    pub fn add_continuous(&mut self, v: Variable, pdf: &PartitionedGen) -> Result<(), EngineError> {
        self.ensure_absent(&v)?;
        let mut renamed = pdf.clone();
        renamed.substitute(&Variable::scratch(), &v)?;
        self.continuous = self.continuous.cartesian_product(&renamed)?;
        Ok(())
    }

    /// The memoryless shortcut: an EXP timer is only its rate.
    pub fn add_exponential(&mut self, v: Variable, rate: BigDecimal) -> Result<(), EngineError> {
        self.ensure_absent(&v)?;
        if !rate.is_positive() {
            return Err(EngineError::InvalidRate(rate.to_string()));
        }
        self.exp_rates.insert(v, rate);
        Ok(())
    }

    pub fn remove_exponential(&mut self, v: &Variable) -> Result<BigDecimal, EngineError> {
        self.exp_rates
            .shift_remove(v)
            .ok_or_else(|| EngineError::MissingVariable(v.clone()))
    }

    /// Refresh a marking-dependent exponential rate.
    pub fn set_exp_rate(&mut self, v: &Variable, rate: BigDecimal) -> Result<(), EngineError> {
        if !rate.is_positive() {
            return Err(EngineError::InvalidRate(rate.to_string()));
        }
        match self.exp_rates.get_mut(v) {
            Some(slot) => {
                *slot = rate;
                Ok(())
            }
            None => Err(EngineError::MissingVariable(v.clone())),
        }
    }

    /* ── removal ──────────────────────────────────────────────── */

    /// Remove `v` from whichever set contains it. A continuous variable
    /// with synchronized companions is first re-expressed through the
    /// companion with the smallest delay; one without companions is
    /// integrated out.
    pub fn marginalize(&mut self, v: &Variable) -> Result<(), EngineError> {
        match self.kind(v) {
            None => Err(EngineError::MissingVariable(v.clone())),
            Some(VariableKind::Deterministic) => {
                self.deterministic.shift_remove(v);
                Ok(())
            }
            Some(VariableKind::Synchronized) => {
                self.synchronized.shift_remove(v);
                Ok(())
            }
            Some(VariableKind::Exponential) => {
                self.exp_rates.shift_remove(v);
                Ok(())
            }
            Some(VariableKind::Continuous) => {
                let companion = self
                    .synchronized
                    .iter()
                    .filter(|(_, s)| &s.distributed == v)
                    .min_by(|(_, a), (_, b)| a.delay.cmp(&b.delay))
                    .map(|(name, _)| name.clone());
                match companion {
                    Some(companion) => {
                        self.swap(&companion)?;
                        self.synchronized.shift_remove(v);
                        Ok(())
                    }
                    None => self.continuous.project(v),
                }
            }
        }
    }

    /* ── swap (canonical re-expression) ───────────────────────── */

    /// Re-express a synchronized variable as continuous: if
    /// `v = d + δ`, afterwards `v` is continuous and `d = v − δ` is
    /// synchronized to it; companions of `d` are re-pointed to `v`.
    pub fn swap(&mut self, v: &Variable) -> Result<(), EngineError> {
        let sync = self
            .synchronized
            .shift_remove(v)
            .ok_or_else(|| EngineError::NotSynchronized(v.clone()))?;
        let delta = sync.delay;
        let d = sync.distributed;
        for s in self.synchronized.values_mut() {
            if s.distributed == d {
                s.distributed = v.clone();
                s.delay = &s.delay - &delta;
            }
        }
        let negated = -&delta;
        self.continuous.substitute_with_constant(&d, v, &negated)?;
        self.synchronized.insert(
            d,
            Synchronization {
                distributed: v.clone(),
                delay: negated,
            },
        );
        Ok(())
    }

    /* ── firing update ────────────────────────────────────────── */

    /// The fundamental state update after `fired` wins the race: every
    /// other timer is re-expressed as its advance past the firing and
    /// `fired` leaves the density.
    pub fn shift_and_project(&mut self, fired: &Variable) -> Result<(), EngineError> {
        match self.kind(fired) {
            None | Some(VariableKind::Exponential) => {
                return Err(EngineError::MissingVariable(fired.clone()));
            }
            Some(VariableKind::Deterministic) => {
                let value = self.deterministic[fired].clone();
                self.constant_shift(&value);
                self.deterministic.shift_remove(fired);
                return Ok(());
            }
            Some(VariableKind::Synchronized) => {
                self.swap(fired)?;
            }
            Some(VariableKind::Continuous) => {}
        }

        if let Some((d_star, d_value)) = self.min_deterministic() {
            let d_star = d_star.clone();
            let d_value = d_value.clone();
            self.continuous
                .substitute_and_shift(fired, &d_star, &d_value)?;
            self.deterministic.shift_remove(&d_star);
            let remaining: Vec<(Variable, BigDecimal)> = self.deterministic.drain(..).collect();
            for (v, value) in remaining {
                self.synchronized.insert(
                    v,
                    Synchronization {
                        distributed: d_star.clone(),
                        delay: &value - &d_value,
                    },
                );
            }
        } else {
            self.continuous.shift_and_project(fired)?;
        }

        // timers synchronized with the fired one now hold an absolute
        // remaining time
        let matured: Vec<(Variable, BigDecimal)> = self
            .synchronized
            .iter()
            .filter(|(_, s)| &s.distributed == fired)
            .map(|(v, s)| (v.clone(), s.delay.clone()))
            .collect();
        for (v, delay) in matured {
            self.synchronized.shift_remove(&v);
            self.deterministic.insert(v, delay);
        }
        Ok(())
    }

    /* ── time shift ───────────────────────────────────────────── */

    /// Let `c` time units elapse for every timer.
    pub fn constant_shift(&mut self, c: &BigDecimal) {
        for value in self.deterministic.values_mut() {
            *value = &*value - c;
        }
        let vars = self.continuous.variables();
        let negated = -c;
        self.continuous.constant_shift(&negated, &vars);
        // synchronized delays are relative; both sides progressed
    }

    /// Let `c` time units elapse for the progressing timers only;
    /// synchronized delays adjust when exactly one of the pair
    /// progresses.
    pub fn constant_shift_progressing(
        &mut self,
        c: &BigDecimal,
        progressing: &[Variable],
    ) -> Result<(), EngineError> {
        for (v, value) in self.deterministic.iter_mut() {
            if progressing.contains(v) {
                *value = &*value - c;
            }
        }
        let moving: Vec<Variable> = self
            .continuous
            .variables()
            .into_iter()
            .filter(|v| progressing.contains(v))
            .collect();
        if !moving.is_empty() {
            let negated = -c;
            self.continuous.constant_shift(&negated, &moving);
        }
        for (v, sync) in self.synchronized.iter_mut() {
            let own = progressing.contains(v);
            let dist = progressing.contains(&sync.distributed);
            if own && !dist {
                sync.delay = &sync.delay - c;
            } else if dist && !own {
                sync.delay = &sync.delay + c;
            }
        }
        Ok(())
    }

    /* ── bounds and conditioning ──────────────────────────────── */

    /// Express a timer as `axis + offset` with the axis a continuous
    /// variable or the ground.
    fn resolve(&self, v: &Variable) -> Result<(Option<Variable>, BigDecimal), EngineError> {
        if v.is_ground() {
            return Ok((None, BigDecimal::zero()));
        }
        match self.kind(v) {
            Some(VariableKind::Deterministic) => {
                Ok((None, self.deterministic[v].clone()))
            }
            Some(VariableKind::Synchronized) => {
                let sync = &self.synchronized[v];
                Ok((Some(sync.distributed.clone()), sync.delay.clone()))
            }
            Some(VariableKind::Continuous) => Ok((Some(v.clone()), BigDecimal::zero())),
            Some(VariableKind::Exponential) | None => {
                Err(EngineError::MissingVariable(v.clone()))
            }
        }
    }

    /// Require `left − right ≤ bound` for every right-hand timer.
    /// Deterministic and synchronized operands reduce to ground-relative
    /// constants; an infeasible constant constraint wipes the partition.
    pub fn impose_bound(
        &mut self,
        left: &Variable,
        rights: &[Variable],
        bound: &OmegaDecimal,
    ) -> Result<(), EngineError> {
        let ground = Variable::ground();
        let (left_axis, left_offset) = self.resolve(left)?;
        for right in rights {
            let (right_axis, right_offset) = self.resolve(right)?;
            let adjusted =
                &(bound - &OmegaDecimal::Finite(left_offset.clone()))
                    + &OmegaDecimal::Finite(right_offset.clone());
            if left_axis == right_axis {
                if adjusted < OmegaDecimal::zero() {
                    self.continuous.clear();
                }
                continue;
            }
            let l = left_axis.clone().unwrap_or_else(|| ground.clone());
            let r = right_axis.unwrap_or_else(|| ground.clone());
            self.continuous.impose(&l, &r, adjusted)?;
        }
        Ok(())
    }

    /// Renormalize the partition by its total mass and return the
    /// pre-normalization probability.
    pub fn normalize_by_total(&mut self) -> Result<BigDecimal, EngineError> {
        self.continuous.normalize_by_total()
    }

    /// Condition on `min ≤ v ≤ max`; returns the probability of the
    /// window.
    pub fn condition_all_to_bound(
        &mut self,
        v: &Variable,
        min: &OmegaDecimal,
        max: &OmegaDecimal,
    ) -> Result<BigDecimal, EngineError> {
        let ground = Variable::ground();
        self.impose_bound(v, std::slice::from_ref(&ground), max)?;
        self.impose_bound(&ground, std::slice::from_ref(v), &-min)?;
        self.normalize_by_total()
    }

    /// Condition on membership in a zone over this state's timers;
    /// returns the probability of the zone.
    pub fn condition_to_zone(&mut self, zone: &crate::zone::DbmZone) -> Result<BigDecimal, EngineError> {
        let vars = zone.variables().to_vec();
        for i in &vars {
            for j in &vars {
                if i == j {
                    continue;
                }
                let bound = zone.bound(i, j)?;
                if bound.is_finite() {
                    self.impose_bound(i, std::slice::from_ref(j), bound)?;
                }
            }
        }
        self.normalize_by_total()
    }

    pub fn integrate_over_domain(&self) -> Result<BigDecimal, EngineError> {
        self.continuous.integrate_over_domain()
    }

    /* ── moments ──────────────────────────────────────────────── */

    /// Expected remaining time of a timer.
    pub fn mean(&self, v: &Variable) -> Result<BigDecimal, EngineError> {
        match self.kind(v) {
            None => Err(EngineError::MissingVariable(v.clone())),
            Some(VariableKind::Deterministic) => Ok(self.deterministic[v].clone()),
            Some(VariableKind::Synchronized) => {
                let sync = self.synchronized[v].clone();
                Ok(&self.mean(&sync.distributed)? + &sync.delay)
            }
            Some(VariableKind::Exponential) => {
                div_decimal(&BigDecimal::one(), &self.exp_rates[v])
            }
            Some(VariableKind::Continuous) => self.continuous.mean_of(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionedGen;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn var(s: &str) -> Variable {
        Variable::new(s)
    }

    fn close(a: &BigDecimal, b: &str) -> bool {
        (a - dec(b)).abs() < dec("1e-9")
    }

    fn uniform01(name: &str) -> (StateDensity, Variable) {
        let mut sd = StateDensity::new();
        let v = var(name);
        sd.add_continuous(v.clone(), &PartitionedGen::uniform(&dec("0"), &dec("1")).unwrap())
            .unwrap();
        (sd, v)
    }

    #[test]
    fn kinds_are_disjoint_and_tracked() {
        let (mut sd, u) = uniform01("u");
        sd.add_deterministic(var("d"), dec("2")).unwrap();
        sd.add_synchronized(var("s"), u.clone(), dec("1")).unwrap();
        sd.add_exponential(var("e"), dec("3")).unwrap();
        assert_eq!(sd.kind(&u), Some(VariableKind::Continuous));
        assert_eq!(sd.kind(&var("d")), Some(VariableKind::Deterministic));
        assert_eq!(sd.kind(&var("s")), Some(VariableKind::Synchronized));
        assert_eq!(sd.kind(&var("e")), Some(VariableKind::Exponential));
        assert_eq!(sd.kind(&var("zz")), None);
        assert_eq!(
            sd.add_deterministic(u.clone(), dec("1")),
            Err(EngineError::DuplicateVariable(u))
        );
    }

    #[test]
    fn synchronized_requires_a_continuous_companion() {
        let mut sd = StateDensity::new();
        assert_eq!(
            sd.add_synchronized(var("s"), var("u"), dec("1")),
            Err(EngineError::MissingVariable(var("u")))
        );
    }

    #[test]
    fn exponential_rates_must_be_positive() {
        let mut sd = StateDensity::new();
        assert!(matches!(
            sd.add_exponential(var("e"), dec("0")),
            Err(EngineError::InvalidRate(_))
        ));
    }

    #[test]
    fn swap_re_expresses_the_pair() {
        let (mut sd, u) = uniform01("u");
        sd.add_synchronized(var("s"), u.clone(), dec("1")).unwrap();
        assert!(close(&sd.mean(&var("s")).unwrap(), "1.5"));
        sd.swap(&var("s")).unwrap();
        assert_eq!(sd.kind(&var("s")), Some(VariableKind::Continuous));
        assert_eq!(sd.kind(&u), Some(VariableKind::Synchronized));
        // values are unchanged by the re-expression
        assert!(close(&sd.mean(&var("s")).unwrap(), "1.5"));
        assert!(close(&sd.mean(&u).unwrap(), "0.5"));
        assert!(close(&sd.integrate_over_domain().unwrap(), "1"));
    }

    #[test]
    fn swap_rejects_non_synchronized_variables() {
        let (mut sd, u) = uniform01("u");
        assert_eq!(sd.swap(&u), Err(EngineError::NotSynchronized(u)));
    }

    #[test]
    fn marginalizing_a_referenced_continuous_swaps_first() {
        let (mut sd, u) = uniform01("u");
        sd.add_synchronized(var("s1"), u.clone(), dec("2")).unwrap();
        sd.add_synchronized(var("s2"), u.clone(), dec("1")).unwrap();
        sd.marginalize(&u).unwrap();
        assert_eq!(sd.kind(&u), None);
        // the smallest-delay companion took over the continuous slot
        assert_eq!(sd.kind(&var("s2")), Some(VariableKind::Continuous));
        assert_eq!(sd.kind(&var("s1")), Some(VariableKind::Synchronized));
        assert_eq!(
            sd.synchronization(&var("s1")).unwrap().distributed,
            var("s2")
        );
        assert!(close(&sd.mean(&var("s1")).unwrap(), "2.5"));
    }

    #[test]
    fn marginalizing_the_last_continuous_projects_it_out() {
        let (mut sd, u) = uniform01("u");
        sd.marginalize(&u).unwrap();
        assert_eq!(sd.kind(&u), None);
        assert!(close(&sd.integrate_over_domain().unwrap(), "1"));
    }

    #[test]
    fn deterministic_firing_shifts_the_clock() {
        // u ~ U(1, 3), d = 2 deterministic; d fires
        let mut sd = StateDensity::new();
        let u = var("u");
        sd.add_continuous(u.clone(), &PartitionedGen::uniform(&dec("1"), &dec("3")).unwrap())
            .unwrap();
        sd.add_deterministic(var("d"), dec("2")).unwrap();
        let mass = sd
            .condition_all_to_bound(&var("d"), &OmegaDecimal::zero(), &OmegaDecimal::PosInfinite)
            .unwrap();
        assert!(close(&mass, "1"));
        // require d to be the minimum: u >= 2
        sd.impose_bound(&var("d"), std::slice::from_ref(&u), &OmegaDecimal::zero())
            .unwrap();
        let mass = sd.normalize_by_total().unwrap();
        assert!(close(&mass, "0.5"));
        sd.shift_and_project(&var("d")).unwrap();
        assert_eq!(sd.kind(&var("d")), None);
        // residual u is uniform on (0, 1)
        assert!(close(&sd.integrate_over_domain().unwrap(), "1"));
        assert!(close(&sd.mean(&u).unwrap(), "0.5"));
    }

    #[test]
    fn continuous_firing_against_a_deterministic_timer() {
        // u ~ U(0, 1) fires while d = 2 is pending: afterwards d is the
        // continuous timer 2 − u on [1, 2]
        let (mut sd, u) = uniform01("u");
        sd.add_deterministic(var("d"), dec("2")).unwrap();
        sd.shift_and_project(&u).unwrap();
        assert_eq!(sd.kind(&u), None);
        assert_eq!(sd.kind(&var("d")), Some(VariableKind::Continuous));
        assert!(close(&sd.integrate_over_domain().unwrap(), "1"));
        assert!(close(&sd.mean(&var("d")).unwrap(), "1.5"));
    }

    #[test]
    fn continuous_firing_matures_synchronized_companions() {
        let (mut sd, u) = uniform01("u");
        sd.add_synchronized(var("s"), u.clone(), dec("0.25")).unwrap();
        sd.shift_and_project(&u).unwrap();
        assert_eq!(sd.kind(&var("s")), Some(VariableKind::Deterministic));
        assert_eq!(sd.deterministic_value(&var("s")).unwrap(), &dec("0.25"));
    }

    #[test]
    fn progressing_shift_adjusts_mixed_pairs() {
        let (mut sd, u) = uniform01("u");
        sd.add_synchronized(var("s"), u.clone(), dec("1")).unwrap();
        sd.add_deterministic(var("d"), dec("5")).unwrap();
        // only the synchronized timer and the deterministic one progress
        sd.constant_shift_progressing(&dec("0.5"), &[var("s"), var("d")])
            .unwrap();
        assert_eq!(sd.deterministic_value(&var("d")).unwrap(), &dec("4.5"));
        assert_eq!(sd.synchronization(&var("s")).unwrap().delay, dec("0.5"));
    }

    #[test]
    fn mean_of_an_exponential_is_its_inverse_rate() {
        let mut sd = StateDensity::new();
        sd.add_exponential(var("e"), dec("4")).unwrap();
        assert!(close(&sd.mean(&var("e")).unwrap(), "0.25"));
    }

    #[test]
    fn infeasible_deterministic_constraints_wipe_the_partition() {
        let (mut sd, u) = uniform01("u");
        sd.add_deterministic(var("d1"), dec("3")).unwrap();
        sd.add_deterministic(var("d2"), dec("1")).unwrap();
        // d1 - d2 <= 0 is violated deterministically
        sd.impose_bound(&var("d1"), &[var("d2")], &OmegaDecimal::zero())
            .unwrap();
        let mass = sd.normalize_by_total().unwrap();
        assert!(mass.is_zero());
        assert!(sd.continuous().is_empty());
        let _ = u;
    }
}
