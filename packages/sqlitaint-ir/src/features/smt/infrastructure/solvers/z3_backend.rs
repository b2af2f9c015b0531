//! Z3 Solver Backend
//!
//! Numbers are modelled as reals, booleans as booleans. Assertions are kept
//! on our own stack and replayed into a fresh context on every `check`, so
//! no Z3 object outlives the call.
//!
//! Only available when compiled with `--features z3`.

#![cfg(feature = "z3")]

use std::collections::BTreeMap;

use tracing::trace;
use z3::ast::{Ast, Bool, Real};
use z3::{Config, Context, SatResult, Solver};

use super::{ConstraintSolver, Model, ModelValue, SolverResult};
use crate::features::smt::domain::{ArithOp, CompareOp, Term};

/// Decimal places kept when a non-integral literal becomes a rational
const RATIONAL_SCALE: f64 = 1_000_000.0;

#[derive(Debug)]
pub struct Z3Solver {
    timeout_ms: u64,
    assertions: Vec<Term>,
    frames: Vec<usize>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self::with_timeout(5_000)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            assertions: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl ConstraintSolver for Z3Solver {
    fn name(&self) -> &'static str {
        "z3"
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
        let mut cfg = Config::new();
        cfg.set_timeout_msec(self.timeout_ms);
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let mut lowering = Lowering::new(&ctx);

        for term in &self.assertions {
            match lowering.boolean(term) {
                Some(formula) => solver.assert(&formula),
                None => {
                    trace!(term = %term, "term not expressible in z3");
                    return SolverResult::Unknown;
                }
            }
        }

        match solver.check() {
            SatResult::Unsat => SolverResult::Unsat,
            SatResult::Unknown => SolverResult::Unknown,
            SatResult::Sat => SolverResult::Sat(solver.get_model().map(|m| lowering.model(&m))),
        }
    }
}

/// Term → Z3 AST translation for one context
struct Lowering<'ctx> {
    ctx: &'ctx Context,
    bools: BTreeMap<String, Bool<'ctx>>,
    reals: BTreeMap<String, Real<'ctx>>,
}

impl<'ctx> Lowering<'ctx> {
    fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            bools: BTreeMap::new(),
            reals: BTreeMap::new(),
        }
    }

    fn boolean(&mut self, term: &Term) -> Option<Bool<'ctx>> {
        Some(match term {
            Term::Bool(b) => Bool::from_bool(self.ctx, *b),
            Term::BoolVar(name) => {
                let ctx = self.ctx;
                self.bools
                    .entry(name.clone())
                    .or_insert_with(|| Bool::new_const(ctx, name.as_str()))
                    .clone()
            }
            Term::Not(inner) => self.boolean(inner)?.not(),
            Term::And(children) | Term::Or(children) => {
                let lowered = children
                    .iter()
                    .map(|c| self.boolean(c))
                    .collect::<Option<Vec<_>>>()?;
                let refs: Vec<&Bool<'ctx>> = lowered.iter().collect();
                if matches!(term, Term::And(_)) {
                    Bool::and(self.ctx, &refs)
                } else {
                    Bool::or(self.ctx, &refs)
                }
            }
            Term::Xor(a, b) => self.boolean(a)?.xor(&self.boolean(b)?),
            Term::Iff(a, b) => self.boolean(a)?._eq(&self.boolean(b)?),
            Term::Compare(op, a, b) => {
                let (a, b) = (self.real(a)?, self.real(b)?);
                match op {
                    CompareOp::Eq => a._eq(&b),
                    CompareOp::Ne => a._eq(&b).not(),
                    CompareOp::Lt => a.lt(&b),
                    CompareOp::Le => a.le(&b),
                    CompareOp::Gt => a.gt(&b),
                    CompareOp::Ge => a.ge(&b),
                }
            }
            Term::Number(_) | Term::NumVar(_) | Term::Neg(_) | Term::Arith(..) => return None,
        })
    }

    fn real(&mut self, term: &Term) -> Option<Real<'ctx>> {
        Some(match term {
            Term::Number(n) => self.literal(*n)?,
            Term::NumVar(name) => {
                let ctx = self.ctx;
                self.reals
                    .entry(name.clone())
                    .or_insert_with(|| Real::new_const(ctx, name.as_str()))
                    .clone()
            }
            Term::Neg(inner) => self.real(inner)?.unary_minus(),
            Term::Arith(op, a, b) => {
                let (a, b) = (self.real(a)?, self.real(b)?);
                match op {
                    ArithOp::Add => Real::add(self.ctx, &[&a, &b]),
                    ArithOp::Sub => Real::sub(self.ctx, &[&a, &b]),
                    ArithOp::Mul => Real::mul(self.ctx, &[&a, &b]),
                    ArithOp::Div => a.div(&b),
                }
            }
            _ => return None,
        })
    }

    fn literal(&self, n: f64) -> Option<Real<'ctx>> {
        if !n.is_finite() {
            return None;
        }
        if n.fract() == 0.0 && n.abs() <= f64::from(i32::MAX) {
            return Some(Real::from_real(self.ctx, n as i32, 1));
        }
        let numerator = (n * RATIONAL_SCALE).round() as i64;
        Real::from_real_str(
            self.ctx,
            &numerator.to_string(),
            &(RATIONAL_SCALE as i64).to_string(),
        )
    }

    fn model(&self, model: &z3::Model<'ctx>) -> Model {
        let mut out = Model::new();
        for (name, var) in &self.bools {
            if let Some(value) = model.eval(var, true).and_then(|v| v.as_bool()) {
                out.insert(name.clone(), ModelValue::Bool(value));
            }
        }
        for (name, var) in &self.reals {
            if let Some((num, den)) = model.eval(var, true).and_then(|v| v.as_real()) {
                if den != 0 {
                    out.insert(name.clone(), ModelValue::Number(num as f64 / den as f64));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contradicting_bounds_unsat() {
        let x = || Term::NumVar("x".to_string());
        let mut solver = Z3Solver::with_timeout(1_000);
        solver.assert(Term::compare(CompareOp::Gt, x(), Term::Number(10.0)));
        solver.push();
        solver.assert(Term::compare(CompareOp::Lt, x(), Term::Number(2.0)));
        assert_eq!(solver.check(), SolverResult::Unsat);
        solver.pop();
        assert!(matches!(solver.check(), SolverResult::Sat(_)));
    }

    #[test]
    fn test_model_reports_booleans() {
        let mut solver = Z3Solver::new();
        solver.assert(Term::not(Term::BoolVar("p".to_string())));
        match solver.check() {
            SolverResult::Sat(Some(model)) => {
                assert_eq!(model.get("p"), Some(&ModelValue::Bool(false)));
            }
            other => panic!("expected sat with model, got {:?}", other),
        }
    }
}
