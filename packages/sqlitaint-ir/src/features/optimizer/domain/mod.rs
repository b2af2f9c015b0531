//! Optimizer domain: PHP scalar semantics

mod scalar;

pub use scalar::{format_number, numeric_string, string_truthy, Scalar};
