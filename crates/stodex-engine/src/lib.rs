//! Symbolic state-density engine for stochastic timed systems.
//!
//! The engine maintains the joint PDF of all enabled timers of a
//! stochastic Petri net, conditioned on the event history, over a
//! piecewise support of DBM zones. Layers, from leaves to composites:
//!
//! - [`atom`], [`exmonomial`], [`expolynomial`] — the symbolic calculus of
//!   sums of `c · Π vᵢ^kᵢ · Π exp(−λⱼ vⱼ)` terms;
//! - [`zone`] — difference-bound matrices with normalization and subzone
//!   decomposition against a pivot variable;
//! - [`piece`], [`partition`] — one expolynomial density on one zone, and
//!   ordered lists of disjoint pieces forming a piecewise PDF;
//! - [`density`] — the joint PDF over deterministic, synchronized, and
//!   continuous timers;
//! - [`succession`] — application of one event firing to a state;
//! - [`vanishing`] — exact rational collapse of immediate sub-graphs.

pub mod atom;
pub mod density;
pub mod exmonomial;
pub mod expolynomial;
pub mod partition;
pub mod piece;
pub mod succession;
pub mod testnet;
pub mod vanishing;
pub mod zone;

pub use atom::AtomicTerm;
pub use density::{StateDensity, Synchronization, VariableKind};
pub use exmonomial::Exmonomial;
pub use expolynomial::Expolynomial;
pub use partition::PartitionedGen;
pub use piece::Gen;
pub use succession::{
    FiringPdf, StochasticModel, StochasticState, Succession, SuccessionEvaluator,
};
pub use vanishing::{ImmediateSubgraph, RationalMatrix, Target, rational_from_decimal, reduce_edges};
pub use zone::{DbmZone, PivotBound, Subzone};

// Re-export common types
pub use stodex_common::{BigDecimal, EngineError, ErrorClass, OmegaDecimal, Variable};
