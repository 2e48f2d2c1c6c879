//! Collapsing immediate sub-graphs onto the tangible states, fed by
//! succession probabilities of the evaluator.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use stodex_common::{EngineError, Variable};
use stodex_engine::succession::{FiringPdf, StochasticState, SuccessionEvaluator};
use stodex_engine::testnet::{TestNet, TestTransition};
use stodex_engine::vanishing::{ImmediateSubgraph, Target, rational_from_decimal, reduce_edges};

fn dec(s: &str) -> BigDecimal {
    s.parse().unwrap()
}

fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

#[test]
fn immediate_cycle_is_a_time_lock() {
    // three immediate transitions cycling among vanishing states
    let mut sg = ImmediateSubgraph::new(3, 2);
    sg.record_immediate(0, 1, ratio(1, 1));
    sg.record_immediate(1, 2, ratio(1, 1));
    sg.record_immediate(2, 0, ratio(1, 1));
    assert_eq!(sg.absorption_vectors(), Err(EngineError::TimeLock));
}

#[test]
fn random_switch_probabilities_feed_the_absorption() {
    // one vanishing state splitting 1/4 vs 3/4 between two tangible ones
    let net = TestNet::new()
        .with_transition(
            TestTransition::new("a", &[0], &[1], FiringPdf::immediate()).with_weight(dec("1")),
        )
        .with_transition(
            TestTransition::new("b", &[0], &[2], FiringPdf::immediate()).with_weight(dec("3")),
        );
    let state = StochasticState::initial(&net, vec![1, 0, 0]).unwrap();
    assert!(state.vanishing);
    let evaluator = SuccessionEvaluator::new(&net);
    let to_a = evaluator
        .successor(&state, &Variable::new("a"))
        .unwrap()
        .unwrap();
    let to_b = evaluator
        .successor(&state, &Variable::new("b"))
        .unwrap()
        .unwrap();
    assert!(!to_a.child.vanishing);

    let mut sg = ImmediateSubgraph::new(1, 2);
    sg.record_exit(0, 0, rational_from_decimal(&to_a.probability));
    sg.record_exit(0, 1, rational_from_decimal(&to_b.probability));
    let absorption = sg.absorption_vectors().unwrap();
    assert_eq!(absorption.get(0, 0), &ratio(1, 4));
    assert_eq!(absorption.get(0, 1), &ratio(3, 4));
}

#[test]
fn reduced_graph_carries_rates_through_vanishing_chains() {
    // tangible 0 fires at rate 5 into a vanishing chain v0 -> v1 that
    // exits onto tangible nodes 0 and 1
    let mut sg = ImmediateSubgraph::new(2, 2);
    sg.record_immediate(0, 1, ratio(1, 2));
    sg.record_exit(0, 0, ratio(1, 2));
    sg.record_exit(1, 1, ratio(1, 1));
    let edges = vec![(0usize, Target::Vanishing(0), ratio(5, 1))];
    let reduced = reduce_edges(&edges, &sg).unwrap();
    assert_eq!(reduced.len(), 2);
    assert!(reduced.contains(&(0, 0, ratio(5, 2))));
    assert!(reduced.contains(&(0, 1, ratio(5, 2))));
}
