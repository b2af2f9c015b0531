//! IR Feature
//!
//! Arena-based SSA IR: operands, ops, blocks, functions and scripts.
//!
//! ## Structure
//! - `domain/` - IR model and the program-wide arena
//! - `infrastructure/` - printer and invariant verifier

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::{print_scripts, verify_arena, verify_program, IrPrinter};
