//! Simplify use case

use tracing::debug;

use crate::features::ir::domain::{FuncId, IrArena};
use crate::features::ssa::infrastructure::{JumpCoalescer, PhiOptimizer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    pub phis_removed: usize,
    pub blocks_coalesced: usize,
    pub bailouts: usize,
}

impl std::ops::AddAssign for SimplifyStats {
    fn add_assign(&mut self, other: Self) {
        self.phis_removed += other.phis_removed;
        self.blocks_coalesced += other.blocks_coalesced;
        self.bailouts += other.bailouts;
    }
}

#[derive(Debug, Default)]
pub struct SimplifyUseCase {
    phis: PhiOptimizer,
    jumps: JumpCoalescer,
}

impl SimplifyUseCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, arena: &mut IrArena, func: FuncId) -> SimplifyStats {
        let phi_stats = self.phis.optimize(arena, func);
        let jump_stats = self.jumps.coalesce(arena, func);
        SimplifyStats {
            phis_removed: phi_stats.removed_phi_count,
            blocks_coalesced: jump_stats.coalesced,
            bailouts: jump_stats.bailouts,
        }
    }

    pub fn execute_all(
        &mut self,
        arena: &mut IrArena,
        funcs: impl IntoIterator<Item = FuncId>,
    ) -> SimplifyStats {
        let mut total = SimplifyStats::default();
        for func in funcs {
            total += self.execute(arena, func);
        }
        debug!(
            phis_removed = total.phis_removed,
            blocks_coalesced = total.blocks_coalesced,
            "simplified"
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::Script;
    use crate::features::ir::infrastructure::{verify_arena, IrPrinter};
    use crate::features::lowering::LowerFileUseCase;
    use crate::features::parsing::PhpParser;

    const SOURCE: &str = r#"<?php
$x = 'safe';
if ($c) {
    $x = $_GET['q'];
} elseif ($d) {
    $x = 'other';
}
while ($i < 10) {
    $i = $i + 1;
}
switch ($mode) {
    case 1:
        $y = 'a';
    case 2:
        $y = 'b';
        break;
    default:
        $y = $x;
}
mysql_query($x . $y);
"#;

    fn lowered() -> (IrArena, Script) {
        let mut arena = IrArena::new();
        let script = LowerFileUseCase::new(PhpParser::new())
            .execute(&mut arena, SOURCE, "/app/index.php")
            .expect("lowering should succeed");
        (arena, script)
    }

    #[test]
    fn test_simplified_ir_verifies() {
        let (mut arena, script) = lowered();
        let stats = SimplifyUseCase::new().execute_all(&mut arena, script.ordered_functions.clone());

        assert!(stats.phis_removed > 0, "straight-line reads leave trivial φs");
        verify_arena(&arena).expect("simplified IR keeps its invariants");
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let (mut arena, script) = lowered();
        let funcs = script.ordered_functions.clone();
        SimplifyUseCase::new().execute_all(&mut arena, funcs.clone());
        let once = IrPrinter::new(&arena).print_script(&script);

        let again = SimplifyUseCase::new().execute_all(&mut arena, funcs);
        let twice = IrPrinter::new(&arena).print_script(&script);

        assert_eq!(again, SimplifyStats::default());
        pretty_assertions::assert_eq!(once, twice);
    }
}
