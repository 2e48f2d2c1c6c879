//! Application of one event firing to a `(marking, density)` state.
//!
//! The evaluator consumes the Petri-net layer through
//! [`StochasticModel`] and drives the [`StateDensity`] API: materialize
//! the exponential race minimum, resolve random switches among zero-delay
//! contenders, condition the fired timer to be the minimum, apply the
//! firing projection, and re-align the timer set with the successor
//! marking. A conditioning that loses all mass is a measure-zero outcome,
//! not an error: the successor is simply absent.

use bigdecimal::BigDecimal;
use num_traits::{One, Signed, Zero};
use tracing::debug;

use stodex_common::{EngineError, OmegaDecimal, Variable, div_decimal};

use crate::density::{StateDensity, VariableKind};
use crate::partition::{MASS_EPSILON, PartitionedGen};

/// Name of the auxiliary timer standing for the minimum of all enabled
/// exponential timers. Reserved: models must not use it for a transition.
pub const MIN_EXP_NAME: &str = "minEXP";

/// The remaining-time distribution a transition samples when it becomes
/// enabled.
#[derive(Debug, Clone)]
pub enum FiringPdf {
    Deterministic(BigDecimal),
    /// Memoryless; the effective rate is re-read from the marking.
    Exponential(BigDecimal),
    General(PartitionedGen),
}

impl FiringPdf {
    /// A zero-delay deterministic firing.
    pub fn immediate() -> Self {
        FiringPdf::Deterministic(BigDecimal::zero())
    }

    pub fn uniform(a: &BigDecimal, b: &BigDecimal) -> Result<Self, EngineError> {
        Ok(FiringPdf::General(PartitionedGen::uniform(a, b)?))
    }

    pub fn erlang(shape: u32, rate: &BigDecimal) -> Result<Self, EngineError> {
        Ok(FiringPdf::General(PartitionedGen::erlang(shape, rate)?))
    }
}

/// The Petri-net boundary: enabling, token updates, and per-transition
/// features. Each transition is addressed by its timer variable.
pub trait StochasticModel {
    type Marking: Clone + PartialEq;

    fn enabled(&self, marking: &Self::Marking) -> Vec<Variable>;

    fn successor_marking(&self, marking: &Self::Marking, fired: &Variable) -> Self::Marking;

    fn firing_pdf(&self, transition: &Variable) -> Result<FiringPdf, EngineError>;

    /// Marking-dependent random-switch weight; must be nonnegative.
    fn weight(&self, marking: &Self::Marking, transition: &Variable)
    -> Result<BigDecimal, EngineError>;

    /// Marking-dependent exponential rate; must be positive.
    fn rate(&self, marking: &Self::Marking, transition: &Variable)
    -> Result<BigDecimal, EngineError>;

    fn priority(&self, transition: &Variable) -> u32;
}

#[derive(Debug, Clone)]
pub struct StochasticState<M> {
    pub marking: M,
    pub density: StateDensity,
    pub vanishing: bool,
    pub absorbing: bool,
}

impl<M: Clone + PartialEq> StochasticState<M> {
    /// Compose the initial state from the PDFs of all enabled
    /// transitions.
    pub fn initial<S>(model: &S, marking: M) -> Result<Self, EngineError>
    where
        S: StochasticModel<Marking = M>,
    {
        let enabled = model.enabled(&marking);
        let mut density = StateDensity::new();
        for t in &enabled {
            match model.firing_pdf(t)? {
                FiringPdf::Deterministic(value) => density.add_deterministic(t.clone(), value)?,
                FiringPdf::Exponential(_) => {
                    density.add_exponential(t.clone(), model.rate(&marking, t)?)?
                }
                FiringPdf::General(pdf) => density.add_continuous(t.clone(), &pdf)?,
            }
        }
        let vanishing = density.is_vanishing();
        Ok(StochasticState {
            marking,
            density,
            vanishing,
            absorbing: enabled.is_empty(),
        })
    }
}

/// One edge of the reachability graph: the successor state and its
/// succession probability.
#[derive(Debug, Clone)]
pub struct Succession<M> {
    pub child: StochasticState<M>,
    pub fired: Variable,
    pub probability: BigDecimal,
}

pub struct SuccessionEvaluator<'a, S: StochasticModel> {
    model: &'a S,
}

impl<'a, S: StochasticModel> SuccessionEvaluator<'a, S> {
    pub fn new(model: &'a S) -> Self {
        SuccessionEvaluator { model }
    }

    /// Fire `fired` in `parent`, producing the successor state and its
    /// probability, or `None` when the firing has measure zero (or loses
    /// the random switch).
    pub fn successor(
        &self,
        parent: &StochasticState<S::Marking>,
        fired: &Variable,
    ) -> Result<Option<Succession<S::Marking>>, EngineError> {
        let enabled_parent = self.model.enabled(&parent.marking);
        if !enabled_parent.contains(fired) {
            return Err(EngineError::MissingVariable(fired.clone()));
        }
        let child_marking = self.model.successor_marking(&parent.marking, fired);
        let mut density = parent.density.clone();

        // materialize the exponential race minimum
        let exp_total = density.exp_rate_total();
        let min_exp = Variable::new(MIN_EXP_NAME);
        if exp_total.is_positive() {
            density.add_continuous(min_exp.clone(), &PartitionedGen::exponential(&exp_total)?)?;
        }

        let mut probability = BigDecimal::one();

        // an exponential firing is the race minimum with its rate share
        let firing = if density.kind(fired) == Some(VariableKind::Exponential) {
            let rate = density.remove_exponential(fired)?;
            probability = div_decimal(&rate, &exp_total)?;
            min_exp.clone()
        } else {
            fired.clone()
        };

        // random switch among zero-delay contenders
        match self.random_switch(&parent.marking, &density, fired)? {
            Some(p) => probability = &probability * &p,
            None => {
                debug!(%fired, "firing loses the random switch");
                return Ok(None);
            }
        }

        // the fired timer must be the race minimum
        let others: Vec<Variable> = density
            .variables()
            .into_iter()
            .filter(|v| {
                *v != firing && density.kind(v) != Some(VariableKind::Exponential)
            })
            .collect();
        density.impose_bound(&firing, &others, &OmegaDecimal::zero())?;
        let mass = density.normalize_by_total()?;
        if mass < *MASS_EPSILON {
            debug!(%fired, %mass, "conditioned density has measure zero");
            return Ok(None);
        }
        probability = &probability * &mass;

        density.shift_and_project(&firing)?;
        if exp_total.is_positive() && firing != min_exp {
            density.marginalize(&min_exp)?;
        }

        // re-align the timer set with the successor marking
        let enabled_child = self.model.enabled(&child_marking);
        for t in &enabled_parent {
            if t != fired && !enabled_child.contains(t) {
                density.marginalize(t)?;
            }
        }
        for t in &enabled_child {
            if t != fired && enabled_parent.contains(t) {
                continue; // persistent timer
            }
            match self.model.firing_pdf(t)? {
                FiringPdf::Deterministic(value) => density.add_deterministic(t.clone(), value)?,
                FiringPdf::Exponential(_) => {
                    density.add_exponential(t.clone(), self.model.rate(&child_marking, t)?)?
                }
                FiringPdf::General(pdf) => density.add_continuous(t.clone(), &pdf)?,
            }
        }

        // marking-dependent rates of persistent exponential timers
        let persistent: Vec<Variable> = density.exp_rates().map(|(v, _)| v.clone()).collect();
        for v in persistent {
            let rate = self.model.rate(&child_marking, &v)?;
            density.set_exp_rate(&v, rate)?;
        }

        let vanishing = density.is_vanishing();
        let absorbing = enabled_child.is_empty();
        debug!(%fired, %probability, vanishing, absorbing, "succession evaluated");
        Ok(Some(Succession {
            child: StochasticState {
                marking: child_marking,
                density,
                vanishing,
                absorbing,
            },
            fired: fired.clone(),
            probability,
        }))
    }

    /// Zero-delay contenders of the firing: the maximum-priority subset
    /// decides, weighted by marking-dependent weights. `None` means the
    /// firing loses outright.
    fn random_switch(
        &self,
        marking: &S::Marking,
        density: &StateDensity,
        fired: &Variable,
    ) -> Result<Option<BigDecimal>, EngineError> {
        let mut contenders = vec![fired.clone()];
        match density.kind(fired) {
            Some(VariableKind::Deterministic) => {
                let value = density.deterministic_value(fired).cloned();
                for (v, other) in density.deterministic_entries() {
                    if v != fired && Some(other) == value.as_ref() {
                        contenders.push(v.clone());
                    }
                }
            }
            Some(VariableKind::Synchronized) => {
                let sync = density.synchronization(fired).cloned();
                for (v, other) in density.synchronized_entries() {
                    if v != fired && Some(other) == sync.as_ref() {
                        contenders.push(v.clone());
                    }
                }
            }
            // continuous and exponential ties have probability zero
            _ => {}
        }
        if contenders.len() == 1 {
            return Ok(Some(BigDecimal::one()));
        }
        let top_priority = contenders
            .iter()
            .map(|t| self.model.priority(t))
            .max()
            .unwrap_or(0);
        if self.model.priority(fired) < top_priority {
            return Ok(None);
        }
        let top: Vec<&Variable> = contenders
            .iter()
            .filter(|t| self.model.priority(t) == top_priority)
            .collect();
        if top.len() == 1 {
            return Ok(Some(BigDecimal::one()));
        }
        let mut total = BigDecimal::zero();
        let mut own = BigDecimal::zero();
        for t in &top {
            let w = self.model.weight(marking, t)?;
            if w.is_negative() {
                return Err(EngineError::NegativeWeight(w.to_string()));
            }
            if *t == fired {
                own = w.clone();
            }
            total = &total + &w;
        }
        Ok(Some(div_decimal(&own, &total)?))
    }
}
