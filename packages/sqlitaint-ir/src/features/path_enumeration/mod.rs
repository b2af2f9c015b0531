//! Path Enumeration Feature
//!
//! Whole-program DFS over the simplified IR. Each committed path is an
//! ordered event log the taint pass replays.
//!
//! ## Structure
//! - `domain/` - execution path, events, branch conditions, call frames
//! - `infrastructure/` - call resolution and the block walker
//! - `application/` - entry selection and budget across all scripts

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{EnumeratePathsUseCase, EnumerationOutcome};
pub use domain::{ExecPath, PathCondition, PathEvent};
pub use infrastructure::{CallResolver, EnumerationStats, PathEnumerator};
