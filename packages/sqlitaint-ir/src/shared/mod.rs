//! Shared module - Common types and utilities
//!
//! Types shared across all features. No tree-sitter dependency here.

pub mod models;
pub mod utils;

// Re-exports for convenience
pub use models::*;
pub use utils::encoding::decode_preserving_offsets;
pub use utils::id_generator::LabelGenerator;
pub use utils::path::normalize_path;
pub use utils::scope_stack::ScopeStack;
