//! Taint Analysis Feature
//!
//! Consumes enumerated paths and reports source → sink flows.
//!
//! ## Structure
//! - `domain/` - op roles, findings
//! - `infrastructure/` - PHP SQLi taxonomy, per-path provenance graph
//! - `application/` - run over all paths, dedup

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{AnalyzeTaintUseCase, TaintOutcome, TaintStats};
pub use domain::{OpRole, SinkArgs, TaintFinding};
pub use infrastructure::{TaintPass, Taxonomy};
