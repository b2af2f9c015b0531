//! Feature modules
//!
//! Vertical slices in pipeline order. Each one follows the same layout
//! (`domain/`, `infrastructure/`, `application/`) where it has those parts.

pub mod ir;
pub mod lowering;
pub mod optimizer;
pub mod parsing;
pub mod path_enumeration;
pub mod report;
pub mod smt;
pub mod ssa;
pub mod taint_analysis;
