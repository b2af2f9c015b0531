//! Common test utilities for sqlitaint-ir
//!
//! Shared PHP fixtures, scan builders and report assertions for the
//! integration tests.

#![allow(dead_code)]

mod assertions;
mod builders;
mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
