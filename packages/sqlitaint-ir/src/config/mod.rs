//! Configuration System
//!
//! Two tiers:
//! - Preset: one-liner defaults (`AnalysisConfig::preset(Preset::Fast)`)
//! - YAML v1: preset plus field overrides (`AnalysisConfig::from_yaml(path)`)
//!
//! # Examples
//!
//! ```rust,ignore
//! use sqlitaint_ir::config::{AnalysisConfig, Preset, Validatable};
//!
//! let config = AnalysisConfig::preset(Preset::Thorough).max_paths(50_000);
//! config.validate()?;
//! ```
//!
//! `autoload` reads the project's `composer.json` PSR-4 map.

pub mod analysis_config;
pub mod autoload;
pub mod error;
pub mod io;
pub mod preset;
pub mod validation;

// Re-exports
pub use analysis_config::{AnalysisConfig, SolverKind};
pub use autoload::AutoloadConfig;
pub use error::{ConfigError, ConfigResult};
pub use io::{ConfigExportV1, ConfigOverrides};
pub use preset::Preset;
pub use validation::Validatable;
