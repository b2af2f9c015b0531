//! Configuration file schema (YAML v1)
//!
//! Loading lives in `analysis_config.rs`.

use serde::{Deserialize, Serialize};

use super::analysis_config::SolverKind;

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    pub version: u32,

    /// Base preset
    pub preset: String,

    /// Fine-grained overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigOverrides>,
}

/// Field overrides applied on top of the preset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_paths: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub laravel: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_ir: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}
