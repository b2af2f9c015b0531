//! IR printer and verifier

pub mod printer;
pub mod verifier;

pub use printer::{print_scripts, IrPrinter};
pub use verifier::{verify_arena, verify_def_use, verify_func, verify_program};
