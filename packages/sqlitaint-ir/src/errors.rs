//! Error types for sqlitaint-ir
//!
//! Two tiers: per-file errors (`Parse`, `Lowering`, `Loop`) are collected by the
//! scanner and the file is skipped; `Invariant` is a corrupted IR and aborts
//! the analysis.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for analyzer operations
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source could not be parsed into the AST
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// AST could not be lowered into IR
    #[error("Lowering error in {path}: {message}")]
    Lowering { path: String, message: String },

    /// break/continue with an invalid level
    #[error("Loop resolution error: {0}")]
    Loop(String),

    /// Internal IR invariant violated
    #[error("IR invariant violated at op {op} (operand {operand}): {message}")]
    Invariant {
        op: String,
        operand: String,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (report / composer.json) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyzerError {
    /// Create a parse error for a file
    pub fn parse(path: impl Into<String>, msg: impl Into<String>) -> Self {
        AnalyzerError::Parse {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a lowering error for a file
    pub fn lowering(path: impl Into<String>, msg: impl Into<String>) -> Self {
        AnalyzerError::Lowering {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an invariant violation
    pub fn invariant(op: impl ToString, operand: impl ToString, msg: impl Into<String>) -> Self {
        AnalyzerError::Invariant {
            op: op.to_string(),
            operand: operand.to_string(),
            message: msg.into(),
        }
    }

    /// Fatal errors abort the whole run instead of skipping one file
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalyzerError::Invariant { .. })
    }
}

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;
