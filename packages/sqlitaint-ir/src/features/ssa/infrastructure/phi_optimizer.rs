/*
 * Trivial Phi Elimination
 *
 * A φ is trivial when it merges at most one distinct value besides itself:
 * ```
 * x_2 = φ(x_1, x_1, x_2)   → replace x_2 with x_1
 * x_3 = φ()                → remove; x_3 stays as an undefined value
 * ```
 * Replacing a result can make φs that used it trivial in turn, so users are
 * re-queued until the worklist drains.
 */

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::features::ir::domain::{FuncId, IrArena, OpId, OpKind, OperandId};

/// Removes trivial φs of one function
#[derive(Debug, Default)]
pub struct PhiOptimizer {
    removed_phi_count: usize,
}

impl PhiOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimize(&mut self, arena: &mut IrArena, func: FuncId) -> PhiOptimizerStats {
        self.removed_phi_count = 0;

        let mut worklist: VecDeque<OpId> = arena
            .func(func)
            .blocks
            .iter()
            .flat_map(|b| arena.block(*b).phis.iter().copied())
            .collect();
        let original_phi_count = worklist.len();
        let mut queued: FxHashSet<OpId> = worklist.iter().copied().collect();

        while let Some(phi) = worklist.pop_front() {
            queued.remove(&phi);
            if arena.op(phi).block.is_none() {
                continue;
            }
            let Some((replacement, result)) = Self::trivial_replacement(arena, phi) else {
                continue;
            };

            // φ users may collapse once this result is replaced
            let users: Vec<OpId> = arena
                .operand(result)
                .usages
                .iter()
                .copied()
                .filter(|u| *u != phi && matches!(arena.op(*u).kind, OpKind::Phi { .. }))
                .collect();

            arena.remove_op(phi);
            self.removed_phi_count += 1;
            if let Some(replacement) = replacement {
                arena.replace_all_uses(result, replacement);
            }

            for user in users {
                if arena.op(user).block.is_some() && queued.insert(user) {
                    worklist.push_back(user);
                }
            }
        }

        PhiOptimizerStats {
            original_phi_count,
            removed_phi_count: self.removed_phi_count,
        }
    }

    /// `Some((replacement, result))` when the φ is trivial; the replacement is
    /// `None` for a φ without incoming values
    fn trivial_replacement(
        arena: &IrArena,
        phi: OpId,
    ) -> Option<(Option<OperandId>, OperandId)> {
        let OpKind::Phi { vars, result } = &arena.op(phi).kind else {
            return None;
        };
        let mut distinct: Option<OperandId> = None;
        for var in vars {
            if *var == *result || Some(*var) == distinct {
                continue;
            }
            if distinct.is_some() {
                return None;
            }
            distinct = Some(*var);
        }
        Some((distinct, *result))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOptimizerStats {
    pub original_phi_count: usize,
    pub removed_phi_count: usize,
}

impl PhiOptimizerStats {
    /// Share of φs removed
    pub fn reduction_ratio(&self) -> f64 {
        if self.original_phi_count == 0 {
            return 0.0;
        }
        self.removed_phi_count as f64 / self.original_phi_count as f64
    }
}
