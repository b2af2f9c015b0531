//! SSA Feature
//!
//! Simplification run after lowering: trivial-φ elimination, then
//! empty-jump-block coalescing.
//!
//! ## Structure
//! - `infrastructure/` - φ optimizer and jump coalescer
//! - `application/` - per-function simplification

pub mod application;
pub mod infrastructure;

pub use application::{SimplifyStats, SimplifyUseCase};
pub use infrastructure::{JumpCoalescer, PhiOptimizer};
