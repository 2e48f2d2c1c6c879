//! A minimal Petri-net collaborator used by tests and examples.
//!
//! Plain places with unit arcs are all the succession evaluator needs to
//! be exercised end to end; weights, rates, and priorities are constant
//! per transition.

use bigdecimal::BigDecimal;
use num_traits::One;

use stodex_common::{EngineError, Variable};

use crate::succession::{FiringPdf, StochasticModel};

pub type Marking = Vec<u32>;

#[derive(Debug, Clone)]
pub struct TestTransition {
    name: Variable,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    pdf: FiringPdf,
    weight: BigDecimal,
    rate: BigDecimal,
    priority: u32,
}

impl TestTransition {
    pub fn new(name: &str, inputs: &[usize], outputs: &[usize], pdf: FiringPdf) -> Self {
        let rate = match &pdf {
            FiringPdf::Exponential(r) => r.clone(),
            _ => BigDecimal::one(),
        };
        TestTransition {
            name: Variable::new(name),
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            pdf,
            weight: BigDecimal::one(),
            rate,
            priority: 0,
        }
    }

    pub fn with_weight(mut self, weight: BigDecimal) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_rate(mut self, rate: BigDecimal) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestNet {
    transitions: Vec<TestTransition>,
}

impl TestNet {
    pub fn new() -> Self {
        TestNet {
            transitions: Vec::new(),
        }
    }

    pub fn with_transition(mut self, transition: TestTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    fn find(&self, name: &Variable) -> Option<&TestTransition> {
        self.transitions.iter().find(|t| &t.name == name)
    }
}

impl StochasticModel for TestNet {
    type Marking = Marking;

    fn enabled(&self, marking: &Marking) -> Vec<Variable> {
        self.transitions
            .iter()
            .filter(|t| t.inputs.iter().all(|&p| marking.get(p).copied().unwrap_or(0) > 0))
            .map(|t| t.name.clone())
            .collect()
    }

    fn successor_marking(&self, marking: &Marking, fired: &Variable) -> Marking {
        let mut out = marking.clone();
        if let Some(t) = self.find(fired) {
            for &p in &t.inputs {
                if out[p] > 0 {
                    out[p] -= 1;
                }
            }
            for &p in &t.outputs {
                if p >= out.len() {
                    out.resize(p + 1, 0);
                }
                out[p] += 1;
            }
        }
        out
    }

    fn firing_pdf(&self, transition: &Variable) -> Result<FiringPdf, EngineError> {
        self.find(transition)
            .map(|t| t.pdf.clone())
            .ok_or_else(|| EngineError::MissingVariable(transition.clone()))
    }

    fn weight(&self, _marking: &Marking, transition: &Variable) -> Result<BigDecimal, EngineError> {
        self.find(transition)
            .map(|t| t.weight.clone())
            .ok_or_else(|| EngineError::MissingVariable(transition.clone()))
    }

    fn rate(&self, _marking: &Marking, transition: &Variable) -> Result<BigDecimal, EngineError> {
        self.find(transition)
            .map(|t| t.rate.clone())
            .ok_or_else(|| EngineError::MissingVariable(transition.clone()))
    }

    fn priority(&self, transition: &Variable) -> u32 {
        self.find(transition).map(|t| t.priority).unwrap_or(0)
    }
}
