//! The single error type shared across the engine.
//!
//! Variants are partitioned into four classes ([`ErrorClass`]): *domain*
//! errors reject invalid numeric inputs before any mutation, *structural*
//! errors reject inconsistent variable bookkeeping, *analysis* errors
//! propagate conditions the caller must resolve, and *parse* errors wrap
//! expression-grammar failures at the engine boundary.

use crate::variable::Variable;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Domain,
    Structural,
    Analysis,
    Parse,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /* ── domain ───────────────────────────────────────────────── */
    #[error("division by zero")]
    ZeroDivisor,

    #[error("expected a finite value, found an infinity")]
    NotFinite,

    #[error("exponential rate must be positive, got {0}")]
    InvalidRate(String),

    #[error("weight must be a nonnegative number, got {0}")]
    NegativeWeight(String),

    #[error("support interval is degenerate: {0}")]
    DegenerateSupport(String),

    /* ── structural ───────────────────────────────────────────── */
    #[error("variable `{0}` is already present")]
    DuplicateVariable(Variable),

    #[error("variable `{0}` was not found")]
    MissingVariable(Variable),

    #[error("variable `{0}` is not synchronized")]
    NotSynchronized(Variable),

    #[error("expression still depends on `{0}`")]
    UnboundVariable(Variable),

    #[error("zones have incompatible variable sets")]
    IncompatibleZones,

    /* ── analysis ─────────────────────────────────────────────── */
    #[error("time-lock: the immediate transitions form a cycle with no exit")]
    TimeLock,

    #[error("cannot normalize a density with zero total mass")]
    ZeroMass,

    #[error("integral diverges over an unbounded domain")]
    DivergentIntegral,

    /* ── parse ────────────────────────────────────────────────── */
    #[error("parse error: {0}")]
    Parse(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        use EngineError::*;
        match self {
            ZeroDivisor | NotFinite | InvalidRate(_) | NegativeWeight(_)
            | DegenerateSupport(_) => ErrorClass::Domain,
            DuplicateVariable(_) | MissingVariable(_) | NotSynchronized(_)
            | UnboundVariable(_) | IncompatibleZones => ErrorClass::Structural,
            TimeLock | ZeroMass | DivergentIntegral => ErrorClass::Analysis,
            Parse(_) => ErrorClass::Parse,
        }
    }
}
