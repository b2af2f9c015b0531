//! Configuration validation

use super::error::ConfigResult;

/// Trait for validatable configuration objects
///
/// # Example
/// ```rust,ignore
/// use sqlitaint_ir::config::{AnalysisConfig, Validatable};
///
/// let config = AnalysisConfig::default().max_depth(0);
/// assert!(config.validate().is_err());
/// ```
pub trait Validatable {
    /// Validate the configuration
    ///
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Get the configuration name for error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

/// Check `value` against an inclusive range, producing a `ConfigError::Range`.
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T, hint: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString + Copy,
{
    if value < min || value > max {
        return Err(super::ConfigError::range_with_hint(field, value, min, max, hint));
    }
    Ok(())
}
