//! Lowering Feature
//!
//! Parsed AST → per-file `Script` in the shared arena.
//!
//! ## Structure
//! - `passes/` - AST pre-passes (namespaces, loops, magic constants)
//! - `infrastructure/` - SSA builder
//! - `application/` - parse + pre-pass + lower use case

pub mod application;
pub mod infrastructure;
pub mod passes;

pub use application::{LowerFileUseCase, PreparedFile};
pub use infrastructure::IrBuilder;
pub use passes::run_prepasses;
