//! Analysis configuration
//!
//! One flat config for the whole scan. Presets seed the defaults, builder
//! setters adjust single fields, `from_yaml` loads the v1 file format.

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use super::io::{ConfigExportV1, ConfigOverrides};
use super::preset::Preset;
use super::validation::{check_range, Validatable};

/// Solver backend used to gate path forks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Built-in ground-term evaluator with contradiction detection
    Lightweight,
    /// Z3 (requires the `z3` cargo feature)
    Z3,
}

impl SolverKind {
    pub fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "lightweight" => Ok(Self::Lightweight),
            "z3" => Ok(Self::Z3),
            _ => Err(ConfigError::UnknownSolver(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lightweight => "lightweight",
            Self::Z3 => "z3",
        }
    }
}

impl Default for SolverKind {
    fn default() -> Self {
        Self::Lightweight
    }
}

/// Whole-scan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Maximum call depth followed by the path enumerator (1..=1000)
    pub max_depth: usize,

    /// Maximum committed paths per scan (1..=1_000_000)
    pub max_paths: usize,

    /// Per-check solver timeout in milliseconds (1..=600_000)
    pub solver_timeout_ms: u64,

    /// Solver backend
    pub solver: SolverKind,

    /// Treat Laravel request routes and query builder raw methods as taint endpoints
    pub laravel: bool,

    /// Run the IR verifier after simplification
    pub verify_ir: bool,

    /// Parse files on the rayon pool
    pub parallel: bool,
}

impl AnalysisConfig {
    /// Defaults for a preset
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                max_depth: 5,
                max_paths: 1_000,
                solver_timeout_ms: 200,
                solver: SolverKind::Lightweight,
                laravel: false,
                verify_ir: false,
                parallel: true,
            },
            Preset::Balanced | Preset::Custom => Self {
                max_depth: 20,
                max_paths: 10_000,
                solver_timeout_ms: 1_000,
                solver: SolverKind::Lightweight,
                laravel: false,
                verify_ir: cfg!(debug_assertions),
                parallel: true,
            },
            Preset::Thorough => Self {
                max_depth: 100,
                max_paths: 200_000,
                solver_timeout_ms: 10_000,
                solver: SolverKind::Lightweight,
                laravel: false,
                verify_ir: true,
                parallel: true,
            },
        }
    }

    /// Builder: Set max_depth
    pub fn max_depth(mut self, v: usize) -> Self {
        self.max_depth = v;
        self
    }

    /// Builder: Set max_paths
    pub fn max_paths(mut self, v: usize) -> Self {
        self.max_paths = v;
        self
    }

    /// Builder: Set solver_timeout_ms
    pub fn solver_timeout_ms(mut self, v: u64) -> Self {
        self.solver_timeout_ms = v;
        self
    }

    /// Builder: Set solver
    pub fn solver(mut self, v: SolverKind) -> Self {
        self.solver = v;
        self
    }

    /// Builder: Set laravel
    pub fn laravel(mut self, v: bool) -> Self {
        self.laravel = v;
        self
    }

    /// Builder: Set verify_ir
    pub fn verify_ir(mut self, v: bool) -> Self {
        self.verify_ir = v;
        self
    }

    /// Builder: Set parallel
    pub fn parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    /// Apply YAML overrides on top of this config
    pub fn apply_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(v) = overrides.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = overrides.max_paths {
            self.max_paths = v;
        }
        if let Some(v) = overrides.solver_timeout_ms {
            self.solver_timeout_ms = v;
        }
        if let Some(v) = overrides.solver {
            self.solver = v;
        }
        if let Some(v) = overrides.laravel {
            self.laravel = v;
        }
        if let Some(v) = overrides.verify_ir {
            self.verify_ir = v;
        }
        if let Some(v) = overrides.parallel {
            self.parallel = v;
        }
        self
    }

    /// Load a v1 YAML file and validate the result
    pub fn from_yaml(path: &str) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse v1 YAML text and validate the result
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        // Version is checked on the untyped document so a missing key gets its own error
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        let version = raw
            .get("version")
            .ok_or(ConfigError::MissingVersion)?
            .as_u64()
            .ok_or(ConfigError::MissingVersion)? as u32;
        if version != 1 {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: vec![1],
            });
        }

        let export: ConfigExportV1 = serde_yaml::from_value(raw)?;
        let preset = Preset::from_str(&export.preset)
            .map_err(|_| ConfigError::UnknownPreset(export.preset.clone()))?;

        let mut config = Self::preset(preset);
        if let Some(overrides) = &export.overrides {
            config = config.apply_overrides(overrides);
        }
        config.validate()?;
        Ok(config)
    }

    /// Export as v1 YAML (every field written as an override)
    pub fn to_yaml(&self, preset: Preset) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: 1,
            preset: preset.as_str().to_string(),
            overrides: Some(ConfigOverrides {
                max_depth: Some(self.max_depth),
                max_paths: Some(self.max_paths),
                solver_timeout_ms: Some(self.solver_timeout_ms),
                solver: Some(self.solver),
                laravel: Some(self.laravel),
                verify_ir: Some(self.verify_ir),
                parallel: Some(self.parallel),
            }),
        };
        Ok(serde_yaml::to_string(&export)?)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::preset(Preset::Balanced)
    }
}

impl Validatable for AnalysisConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_range(
            "max_depth",
            self.max_depth,
            1,
            1000,
            "Call depth must be at least 1",
        )?;
        check_range(
            "max_paths",
            self.max_paths,
            1,
            1_000_000,
            "Number of enumerated paths must be reasonable",
        )?;
        check_range(
            "solver_timeout_ms",
            self.solver_timeout_ms,
            1,
            600_000,
            "Solver timeout should be at most 10 minutes",
        )?;

        if self.solver == SolverKind::Z3 && !cfg!(feature = "z3") {
            return Err(ConfigError::Validation(
                "solver 'z3' requires building with the `z3` feature".to_string(),
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "AnalysisConfig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom] {
            assert!(
                AnalysisConfig::preset(preset).validate().is_ok(),
                "preset {} should validate",
                preset
            );
        }
    }

    #[test]
    fn test_preset_ordering() {
        let fast = AnalysisConfig::preset(Preset::Fast);
        let thorough = AnalysisConfig::preset(Preset::Thorough);
        assert!(fast.max_depth < thorough.max_depth);
        assert!(fast.max_paths < thorough.max_paths);
        assert!(thorough.verify_ir);
    }

    #[test]
    fn test_max_depth_zero_rejected() {
        let config = AnalysisConfig::default().max_depth(0);
        match config.validate() {
            Err(ConfigError::Range { field, .. }) => assert_eq!(field, "max_depth"),
            other => panic!("expected range error, got {:?}", other),
        }
    }

    #[test]
    fn test_max_paths_upper_bound() {
        assert!(AnalysisConfig::default().max_paths(1_000_000).validate().is_ok());
        assert!(AnalysisConfig::default().max_paths(1_000_001).validate().is_err());
    }

    #[test]
    fn test_solver_timeout_bounds() {
        assert!(AnalysisConfig::default().solver_timeout_ms(0).validate().is_err());
        assert!(AnalysisConfig::default().solver_timeout_ms(600_000).validate().is_ok());
    }

    #[test]
    fn test_solver_kind_parsing() {
        assert_eq!(SolverKind::from_str("Z3").unwrap(), SolverKind::Z3);
        assert_eq!(
            SolverKind::from_str("lightweight").unwrap(),
            SolverKind::Lightweight
        );
        assert!(matches!(
            SolverKind::from_str("cvc5"),
            Err(ConfigError::UnknownSolver(_))
        ));
    }

    #[test]
    fn test_apply_overrides_only_touches_set_fields() {
        let overrides = ConfigOverrides {
            max_depth: Some(7),
            laravel: Some(true),
            ..Default::default()
        };
        let base = AnalysisConfig::preset(Preset::Fast);
        let config = base.clone().apply_overrides(&overrides);
        assert_eq!(config.max_depth, 7);
        assert!(config.laravel);
        assert_eq!(config.max_paths, base.max_paths);
    }
}
