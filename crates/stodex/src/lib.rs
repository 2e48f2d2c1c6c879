//! Facade over the stodex workspace: the symbolic state-density engine
//! with its expression grammar and shared numeric types.
//!
//! ```
//! use stodex::{Expolynomial, Gen, Variable};
//!
//! let density = Expolynomial::parse("Exp(-1*x)").unwrap();
//! let piece = Gen::new(
//!     stodex::DbmZone::scratch_interval(
//!         stodex::OmegaDecimal::zero(),
//!         stodex::OmegaDecimal::PosInfinite,
//!     ),
//!     density,
//! );
//! assert_eq!(piece.integrate_over_domain().unwrap(), stodex::BigDecimal::from(1));
//! let _ = Variable::ground();
//! ```

pub use stodex_common::{
    BigDecimal, DIVISION_PRECISION, EngineError, ErrorClass, OmegaDecimal, Variable,
};
pub use stodex_engine::{
    AtomicTerm, DbmZone, Exmonomial, Expolynomial, FiringPdf, Gen, ImmediateSubgraph,
    PartitionedGen, PivotBound, RationalMatrix, StateDensity, StochasticModel, StochasticState,
    Subzone, Succession, SuccessionEvaluator, Synchronization, Target, VariableKind,
    rational_from_decimal, reduce_edges,
};
pub use stodex_parse::{ExprNode, ParserError, parse};
