//! Path feasibility
//!
//! Wraps a solver with the push/assert/check protocol the path enumerator
//! follows at every fork. Sibling branches share the assumption prefix and
//! each branch's own assumption is popped before the next is tried.

use tracing::trace;

use crate::config::AnalysisConfig;
use crate::features::smt::domain::Term;
use crate::features::smt::infrastructure::{create_solver, ConstraintSolver, SolverResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeasibilityStats {
    pub checks: usize,
    pub pruned: usize,
    pub unknown: usize,
}

pub struct FeasibilityChecker {
    solver: Box<dyn ConstraintSolver>,
    depth: usize,
    stats: FeasibilityStats,
}

impl FeasibilityChecker {
    pub fn new(solver: Box<dyn ConstraintSolver>) -> Self {
        Self {
            solver,
            depth: 0,
            stats: FeasibilityStats::default(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(create_solver(config.solver, config.solver_timeout_ms))
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Push `assumption` and report whether the path stays feasible. The
    /// assumption stays live until the matching [`retract`](Self::retract).
    pub fn assume(&mut self, assumption: Term) -> bool {
        self.solver.push();
        self.depth += 1;

        // ground assumptions need no solver round-trip
        if let Some(value) = assumption.as_bool() {
            self.solver.assert(assumption);
            self.stats.checks += 1;
            if !value {
                self.stats.pruned += 1;
            }
            return value;
        }

        trace!(assumption = %assumption, "checking fork");
        self.solver.assert(assumption);
        self.stats.checks += 1;
        match self.solver.check() {
            SolverResult::Unsat => {
                self.stats.pruned += 1;
                false
            }
            SolverResult::Unknown => {
                self.stats.unknown += 1;
                true
            }
            SolverResult::Sat(_) => true,
        }
    }

    pub fn retract(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
            self.solver.pop();
        }
    }

    /// Live assumption scopes
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stats(&self) -> FeasibilityStats {
        self.stats
    }
}
