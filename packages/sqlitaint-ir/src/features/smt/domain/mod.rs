//! SMT domain: the term language

mod term;

pub use term::{ArithOp, CompareOp, Sort, Term};
