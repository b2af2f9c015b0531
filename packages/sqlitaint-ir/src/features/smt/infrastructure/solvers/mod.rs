//! Solver backends
//!
//! 1. **Lightweight**: ground evaluation plus contradiction detection over
//!    literal atoms (default, no native dependency)
//! 2. **Z3**: full real/boolean reasoning (optional, feature-gated)

use std::collections::BTreeMap;

#[cfg(not(feature = "z3"))]
use tracing::warn;

use crate::config::SolverKind;
use crate::features::smt::domain::Term;

pub mod lightweight;

#[cfg(feature = "z3")]
pub mod z3_backend;

pub use lightweight::LightweightSolver;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Solver;

/// Incremental solver with an assertion stack
pub trait ConstraintSolver {
    fn name(&self) -> &'static str;

    /// Open a scope; `pop` discards every assertion made since
    fn push(&mut self);

    fn pop(&mut self);

    fn assert(&mut self, term: Term);

    /// Satisfiability of the conjunction of all live assertions
    fn check(&mut self) -> SolverResult;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolverResult {
    /// Satisfiable (with a model when the backend produced one)
    Sat(Option<Model>),

    /// Contradiction
    Unsat,

    /// Timeout, unsupported term, or simply undecided
    Unknown,
}

impl SolverResult {
    /// Only a proven contradiction prunes a path
    pub fn is_feasible(&self) -> bool {
        !matches!(self, SolverResult::Unsat)
    }
}

/// Variable assignment, ordered for stable output
pub type Model = BTreeMap<String, ModelValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Bool(bool),
    Number(f64),
}

/// Backend for a configured solver kind
pub fn create_solver(kind: SolverKind, timeout_ms: u64) -> Box<dyn ConstraintSolver> {
    match kind {
        SolverKind::Lightweight => Box::new(LightweightSolver::new()),
        #[cfg(feature = "z3")]
        SolverKind::Z3 => Box::new(Z3Solver::with_timeout(timeout_ms)),
        #[cfg(not(feature = "z3"))]
        SolverKind::Z3 => {
            warn!(
                timeout_ms,
                "z3 solver requested but the `z3` feature is disabled; using lightweight"
            );
            Box::new(LightweightSolver::new())
        }
    }
}
