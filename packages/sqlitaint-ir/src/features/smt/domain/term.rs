//! Solver terms
//!
//! A small boolean/real term language shared by every backend. The smart
//! constructors fold ground sub-terms, so a term built only from literals is
//! always `Term::Bool` or `Term::Number`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Bool,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        match self {
            ArithOp::Add => Some(a + b),
            ArithOp::Sub => Some(a - b),
            ArithOp::Mul => Some(a * b),
            ArithOp::Div => (b != 0.0).then(|| a / b),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    /// Same relation with the operands swapped
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }

    pub fn holds(self, a: f64, b: f64) -> bool {
        match self {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "distinct",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Bool(bool),
    Number(f64),
    BoolVar(String),
    NumVar(String),
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Xor(Box<Term>, Box<Term>),
    Iff(Box<Term>, Box<Term>),
    Neg(Box<Term>),
    Arith(ArithOp, Box<Term>, Box<Term>),
    Compare(CompareOp, Box<Term>, Box<Term>),
}

impl Term {
    pub fn sort(&self) -> Sort {
        match self {
            Term::Number(_) | Term::NumVar(_) | Term::Neg(_) | Term::Arith(..) => Sort::Number,
            _ => Sort::Bool,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Term::Bool(_) | Term::Number(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Term::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Boolean view of any term; numbers are true when non-zero
    pub fn into_bool(self) -> Term {
        match self.sort() {
            Sort::Bool => self,
            Sort::Number => Term::compare(CompareOp::Ne, self, Term::Number(0.0)),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(term: Term) -> Term {
        match term {
            Term::Bool(b) => Term::Bool(!b),
            Term::Not(inner) => *inner,
            Term::Compare(op, a, b) => Term::Compare(op.negate(), a, b),
            Term::And(children) => Term::or(children.into_iter().map(Term::not).collect()),
            Term::Or(children) => Term::and(children.into_iter().map(Term::not).collect()),
            other => Term::Not(Box::new(other)),
        }
    }

    pub fn and(children: Vec<Term>) -> Term {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Term::Bool(true) => {}
                Term::Bool(false) => return Term::Bool(false),
                Term::And(nested) => flat.extend(nested),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Term::Bool(true),
            1 => flat.pop().unwrap_or(Term::Bool(true)),
            _ => Term::And(flat),
        }
    }

    pub fn or(children: Vec<Term>) -> Term {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Term::Bool(false) => {}
                Term::Bool(true) => return Term::Bool(true),
                Term::Or(nested) => flat.extend(nested),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Term::Bool(false),
            1 => flat.pop().unwrap_or(Term::Bool(false)),
            _ => Term::Or(flat),
        }
    }

    pub fn xor(a: Term, b: Term) -> Term {
        match (a, b) {
            (Term::Bool(x), Term::Bool(y)) => Term::Bool(x ^ y),
            (Term::Bool(false), t) | (t, Term::Bool(false)) => t,
            (Term::Bool(true), t) | (t, Term::Bool(true)) => Term::not(t),
            (a, b) => Term::Xor(Box::new(a), Box::new(b)),
        }
    }

    pub fn iff(a: Term, b: Term) -> Term {
        match (a, b) {
            (Term::Bool(x), Term::Bool(y)) => Term::Bool(x == y),
            (Term::Bool(true), t) | (t, Term::Bool(true)) => t,
            (Term::Bool(false), t) | (t, Term::Bool(false)) => Term::not(t),
            (a, b) => Term::Iff(Box::new(a), Box::new(b)),
        }
    }

    pub fn neg(term: Term) -> Term {
        match term {
            Term::Number(n) => Term::Number(-n),
            Term::Neg(inner) => *inner,
            other => Term::Neg(Box::new(other)),
        }
    }

    pub fn arith(op: ArithOp, a: Term, b: Term) -> Term {
        if let (Term::Number(x), Term::Number(y)) = (&a, &b) {
            if let Some(value) = op.apply(*x, *y) {
                return Term::Number(value);
            }
        }
        Term::Arith(op, Box::new(a), Box::new(b))
    }

    pub fn compare(op: CompareOp, a: Term, b: Term) -> Term {
        match (&a, &b) {
            (Term::Number(x), Term::Number(y)) => Term::Bool(op.holds(*x, *y)),
            _ => Term::Compare(op, Box::new(a), Box::new(b)),
        }
    }

    /// Conjuncts of a top-level `And`, or the term itself
    pub fn conjuncts(&self) -> Vec<&Term> {
        match self {
            Term::And(children) => children.iter().flat_map(|c| c.conjuncts()).collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, head: &str, items: &[Term]) -> fmt::Result {
            write!(f, "({}", head)?;
            for item in items {
                write!(f, " {}", item)?;
            }
            write!(f, ")")
        }

        match self {
            Term::Bool(b) => write!(f, "{}", b),
            Term::Number(n) => write!(f, "{}", n),
            Term::BoolVar(name) | Term::NumVar(name) => write!(f, "{}", name),
            Term::Not(t) => write!(f, "(not {})", t),
            Term::And(children) => list(f, "and", children),
            Term::Or(children) => list(f, "or", children),
            Term::Xor(a, b) => write!(f, "(xor {} {})", a, b),
            Term::Iff(a, b) => write!(f, "(= {} {})", a, b),
            Term::Neg(t) => write!(f, "(- {})", t),
            Term::Arith(op, a, b) => write!(f, "({} {} {})", op.symbol(), a, b),
            Term::Compare(op, a, b) => write!(f, "({} {} {})", op.symbol(), a, b),
        }
    }
}
