//! IR builder: AST → SSA IR

mod builder;
mod expr;
mod func_context;

pub use builder::{superglobal_tag, IrBuilder};
pub use func_context::FuncContext;
