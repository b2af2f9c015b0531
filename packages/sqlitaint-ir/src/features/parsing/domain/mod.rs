//! Parsing domain models

pub mod ast;

pub use ast::{Expr, ExprKind, SourceFile, Stmt, StmtKind};
