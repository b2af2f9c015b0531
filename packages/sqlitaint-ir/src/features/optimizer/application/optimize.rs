//! Optimize use case
//!
//! Runs once per function after lowering: every placed op learns its file
//! and block, then constants are folded.

use tracing::debug;

use crate::features::ir::domain::{FuncId, IrArena};
use crate::features::optimizer::infrastructure::ConstantFolder;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub ops_installed: usize,
    pub ops_folded: usize,
}

#[derive(Debug, Default)]
pub struct OptimizeUseCase {
    folder: ConstantFolder,
}

impl OptimizeUseCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, arena: &mut IrArena, func: FuncId) -> OptimizeStats {
        let ops_installed = Self::install_back_pointers(arena, func);
        let folded = self.folder.fold(arena, func);
        OptimizeStats {
            ops_installed,
            ops_folded: folded.folded,
        }
    }

    pub fn execute_all(
        &mut self,
        arena: &mut IrArena,
        funcs: impl IntoIterator<Item = FuncId>,
    ) -> OptimizeStats {
        let mut total = OptimizeStats::default();
        for func in funcs {
            let stats = self.execute(arena, func);
            total.ops_installed += stats.ops_installed;
            total.ops_folded += stats.ops_folded;
        }
        debug!(
            ops_installed = total.ops_installed,
            ops_folded = total.ops_folded,
            "optimized"
        );
        total
    }

    fn install_back_pointers(arena: &mut IrArena, func: FuncId) -> usize {
        let file_path = arena.func(func).file_path.clone();
        let blocks = arena.func(func).blocks.clone();
        let mut installed = 0;
        for block in blocks {
            let b = arena.block(block);
            let ops: Vec<_> = b.phis.iter().chain(b.instructions.iter()).copied().collect();
            for op in ops {
                let record = arena.op_mut(op);
                record.block = Some(block);
                record.file_path = file_path.clone();
                installed += 1;
            }
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::{OpKind, OperandKind};
    use crate::features::lowering::LowerFileUseCase;
    use crate::features::parsing::PhpParser;

    #[test]
    fn test_ops_carry_file_after_optimizing() {
        let mut arena = IrArena::new();
        let script = LowerFileUseCase::new(PhpParser::new())
            .execute(&mut arena, "<?php\necho 'a' . 'b';\n", "/app/a.php")
            .expect("lowering should succeed");

        let stats = OptimizeUseCase::new().execute_all(&mut arena, script.ordered_functions.clone());
        assert!(stats.ops_installed > 0);

        let entry = arena.func(script.main).entry;
        for op in &arena.block(entry).instructions {
            assert_eq!(arena.op(*op).file_path.as_deref(), Some("/app/a.php"));
            assert_eq!(arena.op(*op).block, Some(entry));
        }
    }

    #[test]
    fn test_infeasible_condition_becomes_literal() {
        let mut arena = IrArena::new();
        let source = "<?php\nif (1 == 2) { $x = $_GET['q']; mysql_query($x); }\n";
        let script = LowerFileUseCase::new(PhpParser::new())
            .execute(&mut arena, source, "/app/b.php")
            .expect("lowering should succeed");

        OptimizeUseCase::new().execute_all(&mut arena, script.ordered_functions.clone());

        let entry = arena.func(script.main).entry;
        let terminator = arena.terminator(entry).expect("entry ends in a branch");
        let OpKind::JumpIf { cond, .. } = arena.op(terminator).kind else {
            panic!("expected a conditional jump");
        };
        assert_eq!(arena.operand(cond).kind, OperandKind::Bool(false));
    }
}
