//! Lightweight Solver
//!
//! Decides conjunctions of literal atoms without a native solver:
//! - ground terms evaluate directly
//! - `p` together with `¬p` is a contradiction
//! - `x ⋈ c` atoms over the same variable are intersected as an interval
//!   plus a set of excluded points
//!
//! Anything else leaves the result `Unknown`, which callers treat as feasible.

use std::collections::BTreeMap;

use super::{ConstraintSolver, Model, ModelValue, SolverResult};
use crate::features::smt::domain::{CompareOp, Term};

#[derive(Debug, Default)]
pub struct LightweightSolver {
    assertions: Vec<Term>,
    /// Assertion count at each `push`
    frames: Vec<usize>,
}

impl LightweightSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintSolver for LightweightSolver {
    fn name(&self) -> &'static str {
        "lightweight"
    }

    fn push(&mut self) {
        self.frames.push(self.assertions.len());
    }

    fn pop(&mut self) {
        if let Some(len) = self.frames.pop() {
            self.assertions.truncate(len);
        }
    }

    fn assert(&mut self, term: Term) {
        self.assertions.push(term);
    }

    fn check(&mut self) -> SolverResult {
        let mut facts = Facts::default();
        let mut decided = true;

        for term in &self.assertions {
            for atom in term.conjuncts() {
                match facts.add(atom) {
                    Outcome::Contradiction => return SolverResult::Unsat,
                    Outcome::Recorded => {}
                    Outcome::Opaque => decided = false,
                }
            }
        }

        if !decided {
            return SolverResult::Unknown;
        }
        match facts.model() {
            Some(model) => SolverResult::Sat(Some(model)),
            None => SolverResult::Unknown,
        }
    }
}

enum Outcome {
    Recorded,
    Contradiction,
    /// Not an atom this solver understands
    Opaque,
}

#[derive(Debug, Default)]
struct Facts {
    bools: BTreeMap<String, bool>,
    numbers: BTreeMap<String, Range>,
}

impl Facts {
    fn add(&mut self, atom: &Term) -> Outcome {
        match atom {
            Term::Bool(true) => Outcome::Recorded,
            Term::Bool(false) => Outcome::Contradiction,
            Term::BoolVar(name) => self.assign(name, true),
            Term::Not(inner) => match inner.as_ref() {
                Term::BoolVar(name) => self.assign(name, false),
                _ => Outcome::Opaque,
            },
            Term::Compare(op, a, b) => match (a.as_ref(), b.as_ref()) {
                (Term::NumVar(x), Term::Number(c)) => self.bound(x, *op, *c),
                (Term::Number(c), Term::NumVar(x)) => self.bound(x, op.flip(), *c),
                _ => Outcome::Opaque,
            },
            _ => Outcome::Opaque,
        }
    }

    fn assign(&mut self, name: &str, value: bool) -> Outcome {
        match self.bools.insert(name.to_string(), value) {
            Some(previous) if previous != value => Outcome::Contradiction,
            _ => Outcome::Recorded,
        }
    }

    fn bound(&mut self, name: &str, op: CompareOp, c: f64) -> Outcome {
        let range = self.numbers.entry(name.to_string()).or_default();
        range.restrict(op, c);
        if range.is_empty() {
            Outcome::Contradiction
        } else {
            Outcome::Recorded
        }
    }

    fn model(&self) -> Option<Model> {
        let mut model: Model = self
            .bools
            .iter()
            .map(|(name, value)| (name.clone(), ModelValue::Bool(*value)))
            .collect();
        for (name, range) in &self.numbers {
            model.insert(name.clone(), ModelValue::Number(range.witness()?));
        }
        Some(model)
    }
}

/// Feasible values of one numeric variable
#[derive(Debug, Default)]
struct Range {
    /// `(bound, inclusive)`
    lower: Option<(f64, bool)>,
    upper: Option<(f64, bool)>,
    excluded: Vec<f64>,
}

impl Range {
    fn restrict(&mut self, op: CompareOp, c: f64) {
        match op {
            CompareOp::Eq => {
                self.tighten_lower(c, true);
                self.tighten_upper(c, true);
            }
            CompareOp::Ne => self.excluded.push(c),
            CompareOp::Lt => self.tighten_upper(c, false),
            CompareOp::Le => self.tighten_upper(c, true),
            CompareOp::Gt => self.tighten_lower(c, false),
            CompareOp::Ge => self.tighten_lower(c, true),
        }
    }

    fn tighten_lower(&mut self, c: f64, inclusive: bool) {
        self.lower = match self.lower {
            Some((l, inc)) if l > c || (l == c && !inc) => Some((l, inc)),
            _ => Some((c, inclusive)),
        };
    }

    fn tighten_upper(&mut self, c: f64, inclusive: bool) {
        self.upper = match self.upper {
            Some((u, inc)) if u < c || (u == c && !inc) => Some((u, inc)),
            _ => Some((c, inclusive)),
        };
    }

    fn contains(&self, v: f64) -> bool {
        let above = match self.lower {
            Some((l, true)) => v >= l,
            Some((l, false)) => v > l,
            None => true,
        };
        let below = match self.upper {
            Some((u, true)) => v <= u,
            Some((u, false)) => v < u,
            None => true,
        };
        above && below && !self.excluded.contains(&v)
    }

    fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Some((l, li)), Some((u, ui))) => {
                l > u || (l == u && !(li && ui)) || (l == u && self.excluded.contains(&l))
            }
            _ => false,
        }
    }

    /// A value inside the range, when one of the obvious candidates fits
    fn witness(&self) -> Option<f64> {
        let mut candidates = vec![0.0];
        if let Some((l, _)) = self.lower {
            candidates.extend([l, l + 1.0]);
        }
        if let Some((u, _)) = self.upper {
            candidates.extend([u, u - 1.0]);
        }
        if let (Some((l, _)), Some((u, _))) = (self.lower, self.upper) {
            candidates.push((l + u) / 2.0);
        }
        candidates.extend(self.excluded.iter().map(|e| e + 1.0));
        candidates.into_iter().find(|v| self.contains(*v))
    }
}
