//! Parsing Feature
//!
//! PHP source → AST.
//!
//! ## Structure
//! - `domain/` - AST model
//! - `ports/` - Parser trait
//! - `infrastructure/` - tree-sitter PHP parser

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::ast;
pub use infrastructure::{PhpParser, MAX_EXPR_DEPTH};
pub use ports::Parser;
