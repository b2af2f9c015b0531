/*
 * sqlitaint - Whole-program SQL injection taint analysis for PHP
 *
 * Feature-First Architecture:
 * - shared/      : Common models (Position) and id generation
 * - features/    : Vertical slices (parsing → lowering → ir → ssa → optimizer
 *                  → path_enumeration/smt → taint_analysis → report)
 * - pipeline/    : Whole-program scanner
 * - config/      : Presets, validation, YAML
 *
 * Performance:
 * - Arena IR with u32 indices (no Rc cycles between ops and operands)
 * - Rayon parse/pre-pass per file
 */

#![allow(clippy::too_many_arguments)] // Builder helpers mirror op field lists
#![allow(clippy::type_complexity)] // Side tables keyed by (block, name)
#![allow(clippy::should_implement_trait)] // from_str naming intentional
#![allow(clippy::upper_case_acronyms)] // SSA, CFG naming
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::large_enum_variant)] // AST/IR variants are stored in arenas

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Feature modules (parsing → lowering → ir → ssa → paths → taint → report)
pub mod features;

/// Whole-program orchestration
pub mod pipeline;

/// Configuration system (presets, validation, YAML v1)
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{AnalysisConfig, Preset};
pub use errors::{AnalyzerError, Result};
pub use features::report::{Report, ReportResult};
pub use pipeline::{ScanOutcome, Scanner};
