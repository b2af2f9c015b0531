//! SMT Module
//!
//! Path-condition feasibility for the path enumerator.
//!
//! ```text
//! smt
//! ├── domain/            # Term language (bool + real)
//! ├── infrastructure/
//! │   ├── constraint_extractor  # IR operand → term
//! │   └── solvers/              # lightweight, z3 (feature-gated)
//! └── application/       # push/assert/check protocol per fork
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{FeasibilityChecker, FeasibilityStats};
pub use domain::Term;
pub use infrastructure::{ConstraintExtractor, ConstraintSolver, SolverResult};
