//! Enumerate paths use case
//!
//! Whole-program step: every `{main}` that can reach tainted data (in its
//! own script or one it includes) is walked with one shared solver and
//! one shared path budget. By default a function reads input when it
//! touches a superglobal; callers with a richer source model pass their own
//! predicate to `execute_with`.

use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::features::ir::domain::{FuncId, IrArena, OperandKind, Script};
use crate::features::path_enumeration::domain::ExecPath;
use crate::features::path_enumeration::infrastructure::{EnumerationStats, PathEnumerator};
use crate::features::smt::application::{FeasibilityChecker, FeasibilityStats};

#[derive(Debug, Default)]
pub struct EnumerationOutcome {
    pub paths: Vec<ExecPath>,
    /// Scripts whose `{main}` was walked
    pub entry_scripts: Vec<usize>,
    pub stats: EnumerationStats,
    pub feasibility: FeasibilityStats,
}

pub struct EnumeratePathsUseCase {
    config: AnalysisConfig,
}

impl EnumeratePathsUseCase {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, arena: &mut IrArena, scripts: &[Script]) -> EnumerationOutcome {
        self.execute_with(arena, scripts, |arena, func| arena.func(func).contains_tainted)
    }

    /// Like `execute`, with `reads_input` deciding which functions make their
    /// script an entry
    pub fn execute_with(
        &self,
        arena: &mut IrArena,
        scripts: &[Script],
        reads_input: impl Fn(&IrArena, FuncId) -> bool,
    ) -> EnumerationOutcome {
        let null = arena.new_operand(OperandKind::Null);
        let arena: &IrArena = arena;

        let checker = FeasibilityChecker::from_config(&self.config);
        let solver = checker.solver_name();
        let mut enumerator = PathEnumerator::new(arena, scripts, checker, null)
            .with_limits(self.config.max_depth, self.config.max_paths);

        let entry_scripts: Vec<usize> = (0..scripts.len())
            .filter(|idx| {
                enumerator.resolver().visible(*idx).iter().any(|visible| {
                    scripts[*visible]
                        .ordered_functions
                        .iter()
                        .any(|f| reads_input(arena, *f))
                })
            })
            .collect();

        let mut paths = Vec::new();
        for idx in &entry_scripts {
            let script = &scripts[*idx];
            let found = enumerator.enumerate(script.main);
            debug!(file = %script.file_path, paths = found.len(), "enumerated");
            paths.extend(found);
            if enumerator.remaining() == 0 {
                break;
            }
        }

        let stats = enumerator.stats();
        let feasibility = enumerator.checker().stats();
        info!(
            entries = entry_scripts.len(),
            paths = stats.paths,
            pruned = feasibility.pruned,
            unknown = feasibility.unknown,
            solver,
            truncated = stats.truncated,
            "path enumeration done"
        );

        EnumerationOutcome {
            paths,
            entry_scripts,
            stats,
            feasibility,
        }
    }
}
