//! IR invariant checks
//!
//! Violations are internal bugs, reported as `AnalyzerError::Invariant` with
//! the offending op and operand.

use rustc_hash::FxHashSet;

use crate::errors::{AnalyzerError, Result};
use crate::features::ir::domain::{
    FuncId, IrArena, OpId, OpKind, OperandId, OperandKind, Script,
};

/// Check def/use consistency of every op placed in a block
pub fn verify_def_use(arena: &IrArena) -> Result<()> {
    for (index, op) in arena.ops.iter().enumerate() {
        let op_id = OpId::new(index);
        if op.block.is_none() {
            continue;
        }
        let mut err = None;
        op.kind.for_each_operand(|slot, operand| {
            if err.is_some() {
                return;
            }
            let o = arena.operand(operand);
            if op.kind.is_write_slot(slot) {
                if !o.defs.contains(&op_id) {
                    err = Some(AnalyzerError::invariant(
                        op_id,
                        operand,
                        format!("written at `{}` but not in defs", slot.name),
                    ));
                }
            } else if !o.usages.contains(&op_id) {
                err = Some(AnalyzerError::invariant(
                    op_id,
                    operand,
                    format!("read at `{}` but not in usages", slot.name),
                ));
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
    }

    // Reverse direction: every recorded def/use must be an actual field
    for (index, operand) in arena.operands.iter().enumerate() {
        let id = OperandId::new(index);
        for op in operand.usages.iter().chain(operand.defs.iter()) {
            let referenced = arena
                .op(*op)
                .kind
                .operands()
                .iter()
                .any(|(_, o)| *o == id);
            if !referenced {
                return Err(AnalyzerError::invariant(
                    op,
                    id,
                    "operand lists op that does not reference it",
                ));
            }
        }
        if operand.kind.is_temporary() && operand.defs.len() > 1 {
            return Err(AnalyzerError::invariant(
                operand.defs[1],
                id,
                format!("temporary has {} defining ops", operand.defs.len()),
            ));
        }
    }
    Ok(())
}

/// Check block-level invariants of one function
pub fn verify_func(arena: &IrArena, func_id: FuncId) -> Result<()> {
    let func = arena.func(func_id);
    let blocks: FxHashSet<_> = func.blocks.iter().copied().collect();

    for block_id in &func.blocks {
        let block = arena.block(*block_id);

        // Terminators only in last position
        for (i, op) in block.instructions.iter().enumerate() {
            let is_last = i + 1 == block.instructions.len();
            if arena.op(*op).kind.is_terminator() && !is_last {
                return Err(AnalyzerError::invariant(
                    op,
                    "-",
                    format!("terminator in the middle of {}", block_id),
                ));
            }
        }

        // Dead blocks have no live predecessor targeting them
        if block.dead {
            for pred in &block.predecessors {
                if !blocks.contains(pred) || arena.block(*pred).dead {
                    continue;
                }
                if arena.successors(*pred).contains(block_id) {
                    let op = arena.terminator(*pred).map(|o| o.to_string());
                    return Err(AnalyzerError::invariant(
                        op.unwrap_or_else(|| "-".to_string()),
                        block_id,
                        format!("dead block is targeted by live {}", pred),
                    ));
                }
            }
            continue;
        }

        // Phi arity equals live predecessor count
        let live_preds = block
            .predecessors
            .iter()
            .filter(|p| !arena.block(**p).dead)
            .count();
        for phi in &block.phis {
            if let OpKind::Phi { vars, result } = &arena.op(*phi).kind {
                if vars.len() != live_preds {
                    return Err(AnalyzerError::invariant(
                        phi,
                        result,
                        format!(
                            "phi has {} operands but {} has {} live predecessors",
                            vars.len(),
                            block_id,
                            live_preds
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Run every check over every function
pub fn verify_arena(arena: &IrArena) -> Result<()> {
    verify_def_use(arena)?;
    verify_symbolic_taint(arena)?;
    for index in 0..arena.funcs.len() {
        verify_func(arena, FuncId::new(index))?;
    }
    Ok(())
}

/// Like `verify_arena`, but block checks only cover functions the scripts own
pub fn verify_program(arena: &IrArena, scripts: &[Script]) -> Result<()> {
    verify_def_use(arena)?;
    verify_symbolic_taint(arena)?;
    for script in scripts {
        for func in &script.ordered_functions {
            verify_func(arena, *func)?;
        }
    }
    Ok(())
}

/// Symbolic operands must carry the taint bit
pub fn verify_symbolic_taint(arena: &IrArena) -> Result<()> {
    for (index, operand) in arena.operands.iter().enumerate() {
        if matches!(operand.kind, OperandKind::Symbolic { .. }) && !operand.tainted {
            return Err(AnalyzerError::invariant(
                "-",
                OperandId::new(index),
                "symbolic operand without taint bit",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Position;

    #[test]
    fn test_consistent_arena_passes() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let entry = arena.func(main).entry;
        let a = arena.new_string("a");
        let echo = arena.add_op(OpKind::Echo { expr: a }, Position::zero(), None);
        arena.append(entry, echo);
        let ret = arena.add_op(OpKind::Return { expr: None }, Position::zero(), None);
        arena.append(entry, ret);

        assert!(verify_arena(&arena).is_ok());
    }

    #[test]
    fn test_missing_usage_is_reported() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let entry = arena.func(main).entry;
        let a = arena.new_string("a");
        let echo = arena.add_op(OpKind::Echo { expr: a }, Position::zero(), None);
        arena.append(entry, echo);
        arena.operand_mut(a).remove_usage(echo);

        let err = verify_def_use(&arena).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("op0"), "{}", err);
    }

    #[test]
    fn test_terminator_in_middle_is_reported() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let entry = arena.func(main).entry;
        let ret = arena.add_op(OpKind::Return { expr: None }, Position::zero(), None);
        arena.append(entry, ret);
        let a = arena.new_string("a");
        let echo = arena.add_op(OpKind::Echo { expr: a }, Position::zero(), None);
        arena.append(entry, echo);

        assert!(verify_func(&arena, main).is_err());
    }

    #[test]
    fn test_phi_arity_mismatch_is_reported() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let entry = arena.func(main).entry;
        let join = arena.new_block(Some(main));
        let jump = arena.add_op(OpKind::Jump { target: join }, Position::zero(), None);
        arena.append(entry, jump);
        arena.link(entry, join);

        let x = arena.new_temporary(None);
        let y = arena.new_temporary(None);
        let result = arena.new_temporary(None);
        let phi = arena.add_op(
            OpKind::Phi {
                vars: vec![x, y],
                result,
            },
            Position::zero(),
            None,
        );
        arena.op_mut(phi).block = Some(join);
        arena.block_mut(join).add_phi(phi);

        let err = verify_func(&arena, main).unwrap_err();
        assert!(err.to_string().contains("live predecessors"), "{}", err);
    }
}
