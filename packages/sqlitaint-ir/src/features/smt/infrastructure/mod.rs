mod constraint_extractor;
pub mod solvers;

pub use constraint_extractor::ConstraintExtractor;
pub use solvers::{create_solver, ConstraintSolver, LightweightSolver, Model, ModelValue, SolverResult};
