//! Report Feature
//!
//! JSON report of all findings of a scan.
//!
//! ## Structure
//! - `domain/` - report schema (serde)
//! - `infrastructure/` - source snippets, JSON output
//! - `application/` - findings → sorted results

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::BuildReportUseCase;
pub use domain::{DataflowTrace, Loc, Location, Node, Report, ReportResult, SQLI_MESSAGE};
pub use infrastructure::{JsonReporter, SourceFiles};
