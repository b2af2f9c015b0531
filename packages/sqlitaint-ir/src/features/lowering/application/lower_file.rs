//! Lower file use case
//!
//! Parsing and pre-passes touch only the file's own AST, so `prepare` can run
//! on any thread; `lower` needs the shared arena and runs sequentially.

use tracing::debug;

use crate::errors::Result;
use crate::features::ir::domain::{IrArena, Script};
use crate::features::lowering::infrastructure::IrBuilder;
use crate::features::lowering::passes::run_prepasses;
use crate::features::parsing::ast::SourceFile;
use crate::features::parsing::ports::Parser;
use crate::shared::LabelGenerator;

/// AST after pre-passes, plus the label numbering to continue from
#[derive(Debug)]
pub struct PreparedFile {
    pub file: SourceFile,
    pub labels: LabelGenerator,
}

pub struct LowerFileUseCase<P: Parser> {
    parser: P,
}

impl<P: Parser> LowerFileUseCase<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// Parse and run the pre-passes
    pub fn prepare(&self, source: &str, file_path: &str) -> Result<PreparedFile> {
        let mut file = self.parser.parse(source, file_path)?;
        let labels = run_prepasses(&mut file)?;
        debug!(file = file_path, stmts = file.stmts.len(), "prepared");
        Ok(PreparedFile { file, labels })
    }

    /// Lower a prepared file into the arena
    pub fn lower(&self, arena: &mut IrArena, prepared: PreparedFile) -> Result<Script> {
        let PreparedFile { file, labels } = prepared;
        IrBuilder::new(arena, &file.path, labels).build(&file.stmts)
    }

    pub fn execute(&self, arena: &mut IrArena, source: &str, file_path: &str) -> Result<Script> {
        let prepared = self.prepare(source, file_path)?;
        self.lower(arena, prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::{BlockId, OpKind, OperandKind};
    use crate::features::parsing::PhpParser;

    fn lower(source: &str) -> (IrArena, Script) {
        let mut arena = IrArena::new();
        let script = LowerFileUseCase::new(PhpParser::new())
            .execute(&mut arena, source, "/app/index.php")
            .expect("lowering should succeed");
        (arena, script)
    }

    fn main_ops(arena: &IrArena, script: &Script) -> Vec<OpKind> {
        arena
            .func(script.main)
            .blocks
            .iter()
            .flat_map(|b| arena.block(*b).instructions.clone())
            .map(|op| arena.op(op).kind.clone())
            .collect()
    }

    fn block_containing(
        arena: &IrArena,
        script: &Script,
        found: impl Fn(&OpKind) -> bool,
    ) -> BlockId {
        *arena
            .func(script.main)
            .blocks
            .iter()
            .find(|b| {
                arena
                    .block(**b)
                    .instructions
                    .iter()
                    .any(|op| found(&arena.op(*op).kind))
            })
            .expect("block with the op")
    }

    fn last_jump(arena: &IrArena, block: BlockId) -> Option<BlockId> {
        let last = *arena.block(block).instructions.last()?;
        match arena.op(last).kind {
            OpKind::Jump { target } => Some(target),
            _ => None,
        }
    }

    /// Blocks of the `$_GET` read and of the `mysql_query` call
    fn case_blocks(arena: &IrArena, script: &Script) -> (BlockId, BlockId) {
        let fetch = block_containing(arena, script, |k| matches!(k, OpKind::ArrayDimFetch { .. }));
        let query = block_containing(arena, script, |k| match k {
            OpKind::FunctionCall { name, .. } => arena.string_of(*name) == Some("mysql_query"),
            _ => false,
        });
        (fetch, query)
    }

    #[test]
    fn test_switch_case_without_break_falls_through() {
        let (arena, script) = lower(
            "<?php switch ($a) { case 1: $x = $_GET['a']; case 2: mysql_query($x); break; }",
        );
        let (first, second) = case_blocks(&arena, &script);

        assert_ne!(first, second);
        assert_eq!(last_jump(&arena, first), Some(second));
        assert!(arena.block(second).predecessors.contains(&first));
    }

    #[test]
    fn test_switch_case_with_break_does_not_fall_through() {
        let (arena, script) = lower(
            "<?php switch ($a) { case 1: $x = $_GET['a']; break; case 2: mysql_query($x); break; }",
        );
        let (first, second) = case_blocks(&arena, &script);

        assert_ne!(last_jump(&arena, first), Some(second));
        assert!(!arena.block(second).predecessors.contains(&first));
    }

    #[test]
    fn test_superglobal_read_is_tainted_source() {
        let (arena, script) = lower("<?php $x = $_GET['q']; mysql_query($x);");
        let main = arena.func(script.main);

        assert!(main.contains_tainted);
        assert_eq!(main.calls.len(), 1, "one call op: mysql_query");
        assert_eq!(main.sources.len(), 1, "the $_GET fetch reads input");

        let source = arena.op(main.sources[0]);
        match &source.kind {
            OpKind::ArrayDimFetch { var, .. } => {
                assert!(matches!(
                    &arena.operand(*var).kind,
                    OperandKind::Symbolic { tag } if tag == "getsymbolic"
                ));
                assert!(arena.operand(*var).tainted);
            }
            other => panic!("expected ArrayDimFetch source, got {:?}", other),
        }
    }

    #[test]
    fn test_if_join_creates_phi() {
        let (arena, script) =
            lower("<?php $x = 'a'; if ($c) { $x = $_GET['q']; } echo $x;");
        let main = arena.func(script.main);

        let phis: Vec<_> = main
            .blocks
            .iter()
            .flat_map(|b| arena.block(*b).phis.clone())
            .filter(|phi| {
                arena
                    .op(*phi)
                    .kind
                    .result()
                    .and_then(|r| arena.name_of(r))
                    == Some("x")
            })
            .collect();
        let merged = phis.iter().any(|phi| match &arena.op(*phi).kind {
            OpKind::Phi { vars, .. } => vars.len() == 2,
            _ => false,
        });
        assert!(merged, "join block should merge both definitions of $x");
    }

    #[test]
    fn test_functions_registered_by_scoped_name() {
        let (arena, script) = lower(
            "<?php function f($a) { return $a; } class Repo { public function find($id) {} } $g = function () {};",
        );

        let f = script.function("f").expect("f registered");
        assert_eq!(arena.func(f).params.len(), 1);
        let find = script.function("Repo::find").expect("method registered");
        assert_eq!(arena.func(find).class.as_deref(), Some("Repo"));
        assert!(script.function("{anonymous}#1").is_some());
        assert_eq!(script.ordered_functions[0], script.main);
    }

    #[test]
    fn test_literal_include_recorded() {
        let (_, script) = lower("<?php require 'lib/db.php'; include $dynamic;");
        assert_eq!(script.included_files, vec!["/app/lib/db.php".to_string()]);
    }

    #[test]
    fn test_return_makes_rest_dead() {
        let (arena, script) = lower("<?php return; echo 'unreachable';");
        let main = arena.func(script.main);
        let echo_block = main
            .blocks
            .iter()
            .find(|b| {
                arena
                    .block(**b)
                    .instructions
                    .iter()
                    .any(|op| matches!(arena.op(*op).kind, OpKind::Echo { .. }))
            })
            .expect("echo lowered");
        assert!(arena.block(*echo_block).dead);
        assert!(main_ops(&arena, &script)
            .iter()
            .any(|k| matches!(k, OpKind::Return { .. })));
    }
}
