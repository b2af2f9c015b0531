//! Constraint Extractor
//!
//! Builds solver terms from IR operands on demand. An operand is resolved
//! through the path's substitutions first (call arguments bound to params,
//! committed φs), then through its literal value or defining op.
//!
//! Operands that cannot be modelled become fresh variables keyed by their
//! id, so the same unknown value met twice on one path is the same variable.

use ahash::AHashMap;

use crate::features::ir::domain::{BinaryOp, CastKind, IrArena, OpKind, OperandId, UnaryOp};
use crate::features::optimizer::domain::Scalar;
use crate::features::optimizer::infrastructure::{evaluate_binary, evaluate_unary};
use crate::features::smt::domain::{ArithOp, CompareOp, Sort, Term};

/// Recursion bound for operand → term translation
const MAX_DEPTH: usize = 64;

/// Upper bound on substitution chains
const MAX_SUBSTITUTIONS: usize = 64;

/// Intermediate value: a known scalar, an external input, or a term
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Concrete(Scalar),
    /// Symbolic input; typed on first use
    Input(String),
    Term(Term),
}

pub struct ConstraintExtractor<'a> {
    arena: &'a IrArena,
    substitutions: &'a AHashMap<OperandId, OperandId>,
    undefined: bool,
}

impl<'a> ConstraintExtractor<'a> {
    pub fn new(arena: &'a IrArena, substitutions: &'a AHashMap<OperandId, OperandId>) -> Self {
        Self {
            arena,
            substitutions,
            undefined: false,
        }
    }

    /// Whether an operand without a model was met since construction
    pub fn saw_undefined(&self) -> bool {
        self.undefined
    }

    /// Boolean term for a branch condition
    pub fn condition(&mut self, cond: OperandId) -> Term {
        let value = self.value(cond, 0);
        self.as_bool(value)
    }

    /// Boolean term for `subject == case` (switch arms)
    pub fn case_equality(&mut self, subject: OperandId, case: OperandId) -> Term {
        let left = self.value(subject, 0);
        let right = self.value(case, 0);
        self.equality(left, right, subject)
    }

    fn resolve(&self, id: OperandId) -> OperandId {
        let mut current = id;
        for _ in 0..MAX_SUBSTITUTIONS {
            match self.substitutions.get(&current) {
                Some(next) if *next != current => current = *next,
                _ => break,
            }
        }
        current
    }

    fn value(&mut self, id: OperandId, depth: usize) -> Value {
        let id = self.resolve(id);
        if let Some(scalar) = self.arena.literal_of(id).and_then(Scalar::from_kind) {
            return Value::Concrete(scalar);
        }
        if self.arena.is_symbolic(id) {
            return Value::Input(format!("in{}", self.arena.value_of(id).index()));
        }
        if depth >= MAX_DEPTH {
            return self.unknown(id);
        }
        let Some(def) = self.arena.operand(id).defs.first().copied() else {
            return self.unknown(id);
        };

        match &self.arena.op(def).kind {
            OpKind::Binary {
                op, left, right, ..
            } => {
                let (op, left, right) = (*op, *left, *right);
                self.binary(op, left, right, id, depth)
            }
            OpKind::Unary { op, expr, .. } => {
                let (op, expr) = (*op, *expr);
                self.unary(op, expr, id, depth)
            }
            OpKind::Assign { expr, .. } => {
                let expr = *expr;
                self.value(expr, depth + 1)
            }
            OpKind::Cast { kind, expr, .. } => {
                let (kind, expr) = (*kind, *expr);
                let inner = self.value(expr, depth + 1);
                match (kind, inner) {
                    (CastKind::Bool, v) => Value::Term(self.as_bool(v)),
                    (CastKind::Int | CastKind::Double, Value::Concrete(s)) => match s.to_number() {
                        Some(n) => Value::Concrete(Scalar::Number(n)),
                        None => self.unknown(id),
                    },
                    (CastKind::Int | CastKind::Double, v) => match self.as_number(v) {
                        Some(t) => Value::Term(t),
                        None => self.unknown(id),
                    },
                    _ => self.unknown(id),
                }
            }
            _ => self.unknown(id),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: OperandId,
        right: OperandId,
        result: OperandId,
        depth: usize,
    ) -> Value {
        let l = self.value(left, depth + 1);
        let r = self.value(right, depth + 1);
        if let (Value::Concrete(a), Value::Concrete(b)) = (&l, &r) {
            if let Some(folded) = evaluate_binary(op, a, b) {
                return Value::Concrete(folded);
            }
        }

        let arith = |op: BinaryOp| match op {
            BinaryOp::Plus => Some(ArithOp::Add),
            BinaryOp::Minus => Some(ArithOp::Sub),
            BinaryOp::Mul => Some(ArithOp::Mul),
            BinaryOp::Div => Some(ArithOp::Div),
            _ => None,
        };
        let compare = |op: BinaryOp| match op {
            BinaryOp::Smaller => Some(CompareOp::Lt),
            BinaryOp::SmallerOrEqual => Some(CompareOp::Le),
            BinaryOp::Greater => Some(CompareOp::Gt),
            BinaryOp::GreaterOrEqual => Some(CompareOp::Ge),
            _ => None,
        };

        match op {
            BinaryOp::Equal => Value::Term(self.equality(l, r, result)),
            BinaryOp::NotEqual => Value::Term(Term::not(self.equality(l, r, result))),
            BinaryOp::Identical => Value::Term(self.identity(l, r, result)),
            BinaryOp::NotIdentical => Value::Term(Term::not(self.identity(l, r, result))),
            BinaryOp::LogicalAnd => Value::Term(Term::and(vec![self.as_bool(l), self.as_bool(r)])),
            BinaryOp::LogicalOr => Value::Term(Term::or(vec![self.as_bool(l), self.as_bool(r)])),
            BinaryOp::LogicalXor => {
                let (a, b) = (self.as_bool(l), self.as_bool(r));
                Value::Term(Term::xor(a, b))
            }
            _ => {
                let numbers = (self.as_number(l), self.as_number(r));
                match (arith(op), compare(op), numbers) {
                    (Some(a), _, (Some(x), Some(y))) => Value::Term(Term::arith(a, x, y)),
                    (_, Some(c), (Some(x), Some(y))) => Value::Term(Term::compare(c, x, y)),
                    _ => self.unknown(result),
                }
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, expr: OperandId, result: OperandId, depth: usize) -> Value {
        let inner = self.value(expr, depth + 1);
        if let Value::Concrete(s) = &inner {
            if let Some(folded) = evaluate_unary(op, s) {
                return Value::Concrete(folded);
            }
        }
        match op {
            UnaryOp::BooleanNot => Value::Term(Term::not(self.as_bool(inner))),
            UnaryOp::UnaryMinus => match self.as_number(inner) {
                Some(t) => Value::Term(Term::neg(t)),
                None => self.unknown(result),
            },
            UnaryOp::UnaryPlus => match self.as_number(inner) {
                Some(t) => Value::Term(t),
                None => self.unknown(result),
            },
            _ => self.unknown(result),
        }
    }

    /// `==` with one or both sides symbolic
    fn equality(&mut self, l: Value, r: Value, at: OperandId) -> Term {
        match (l, r) {
            (Value::Concrete(a), Value::Concrete(b)) => Term::Bool(a.loose_eq(&b)),
            (Value::Concrete(Scalar::Bool(b)), other) | (other, Value::Concrete(Scalar::Bool(b))) => {
                Term::iff(self.as_bool(other), Term::Bool(b))
            }
            (Value::Concrete(Scalar::Null), other) | (other, Value::Concrete(Scalar::Null)) => {
                Term::not(self.as_bool(other))
            }
            (Value::Concrete(c), other) | (other, Value::Concrete(c)) => {
                match (c.to_number(), self.as_number(other)) {
                    (Some(n), Some(t)) => Term::compare(CompareOp::Eq, t, Term::Number(n)),
                    _ => self.unknown_bool(at),
                }
            }
            (Value::Term(a), Value::Term(b)) if a.sort() == Sort::Bool && b.sort() == Sort::Bool => {
                Term::iff(a, b)
            }
            (l, r) => match (self.as_number(l), self.as_number(r)) {
                (Some(x), Some(y)) => Term::compare(CompareOp::Eq, x, y),
                _ => self.unknown_bool(at),
            },
        }
    }

    /// `===`: differing literal variants are never identical
    fn identity(&mut self, l: Value, r: Value, at: OperandId) -> Term {
        match (l, r) {
            (Value::Concrete(a), Value::Concrete(b)) => Term::Bool(a.same_type(&b) && a.strict_eq(&b)),
            (Value::Concrete(Scalar::Bool(b)), Value::Term(t))
            | (Value::Term(t), Value::Concrete(Scalar::Bool(b))) => {
                if t.sort() == Sort::Bool {
                    Term::iff(t, Term::Bool(b))
                } else {
                    Term::Bool(false)
                }
            }
            (Value::Concrete(Scalar::Number(n)), Value::Term(t))
            | (Value::Term(t), Value::Concrete(Scalar::Number(n))) => {
                if t.sort() == Sort::Number {
                    Term::compare(CompareOp::Eq, t, Term::Number(n))
                } else {
                    Term::Bool(false)
                }
            }
            (l, r) => self.equality(l, r, at),
        }
    }

    fn as_bool(&mut self, value: Value) -> Term {
        match value {
            Value::Concrete(s) => Term::Bool(s.truthy()),
            Value::Input(key) => Term::BoolVar(format!("{}:bool", key)),
            Value::Term(t) => t.into_bool(),
        }
    }

    fn as_number(&mut self, value: Value) -> Option<Term> {
        match value {
            Value::Concrete(s) => s.to_number().map(Term::Number),
            Value::Input(key) => Some(Term::NumVar(format!("{}:num", key))),
            Value::Term(t) if t.sort() == Sort::Number => Some(t),
            Value::Term(_) => None,
        }
    }

    fn unknown(&mut self, id: OperandId) -> Value {
        Value::Input(self.unknown_key(id))
    }

    fn unknown_bool(&mut self, id: OperandId) -> Term {
        Term::BoolVar(format!("{}:bool", self.unknown_key(id)))
    }

    fn unknown_key(&mut self, id: OperandId) -> String {
        self.undefined = true;
        format!("u{}", id.index())
    }
}
