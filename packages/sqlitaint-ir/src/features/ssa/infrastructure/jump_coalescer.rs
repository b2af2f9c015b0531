//! Empty-jump-block coalescing
//!
//! A block whose only instruction is `Jump T` is bypassed: its predecessor's
//! terminator targets `T` directly and the block becomes dead. The
//! predecessor takes the bypassed block's slot in `T`'s predecessor list, so
//! φ operands in `T` stay aligned with their incoming edges.

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::features::ir::domain::{BlockId, FuncId, IrArena, OpKind};

#[derive(Debug, Default)]
pub struct JumpCoalescer {
    coalesced: usize,
    bailouts: FxHashSet<BlockId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalesceStats {
    pub coalesced: usize,
    pub bailouts: usize,
}

impl JumpCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coalesce(&mut self, arena: &mut IrArena, func: FuncId) -> CoalesceStats {
        self.coalesced = 0;
        self.bailouts.clear();
        let entry = arena.func(func).entry;

        loop {
            let mut changed = false;
            let blocks = arena.func(func).blocks.clone();
            for block in blocks {
                if block == entry {
                    continue;
                }
                if self.try_bypass(arena, block) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        CoalesceStats {
            coalesced: self.coalesced,
            bailouts: self.bailouts.len(),
        }
    }

    fn try_bypass(&mut self, arena: &mut IrArena, block: BlockId) -> bool {
        let Some(target) = Self::jump_only_target(arena, block) else {
            return false;
        };
        if target == block {
            if self.bailouts.insert(block) {
                warn!(block = %block, "self-looping jump block kept");
            }
            return false;
        }

        let live_preds: Vec<BlockId> = arena
            .block(block)
            .predecessors
            .iter()
            .copied()
            .filter(|p| !arena.block(*p).dead)
            .collect();
        let [pred] = live_preds[..] else {
            return false;
        };
        if pred == block || arena.block(target).predecessors.contains(&pred) {
            // the edge pred → target would feed two φ slots
            return false;
        }
        let Some(terminator) = arena.terminator(pred) else {
            return false;
        };
        if !arena.op(terminator).kind.successors().contains(&block) {
            return false;
        }

        arena.op_mut(terminator).kind.for_each_sub_block_mut(|_, b| {
            if *b == block {
                *b = target;
            }
        });
        for p in arena.block_mut(target).predecessors.iter_mut() {
            if *p == block {
                *p = pred;
            }
        }

        if let Some(jump) = arena.block(block).last() {
            arena.remove_op(jump);
        }
        let bypassed = arena.block_mut(block);
        bypassed.dead = true;
        bypassed.predecessors.retain(|p| *p != pred);
        self.coalesced += 1;
        true
    }

    /// Target of a live, φ-free block holding a single unconditional jump
    fn jump_only_target(arena: &IrArena, block: BlockId) -> Option<BlockId> {
        let b = arena.block(block);
        if b.dead || !b.phis.is_empty() || b.instructions.len() != 1 {
            return None;
        }
        match arena.op(b.instructions[0]).kind {
            OpKind::Jump { target } => Some(target),
            _ => None,
        }
    }
}
