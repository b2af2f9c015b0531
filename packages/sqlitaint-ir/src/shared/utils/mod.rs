//! Shared utilities

pub mod encoding;
pub mod id_generator;
pub mod path;
pub mod scope_stack;
