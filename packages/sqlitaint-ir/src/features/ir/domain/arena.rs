//! Program-wide IR arena
//!
//! Owns every operand, op, block and function of a scan. Def/use sets are
//! maintained here so that they stay consistent with op fields.

use std::sync::Arc;

use super::assertion::Assertion;
use super::block::Block;
use super::func::Func;
use super::ids::{BlockId, FuncId, OpId, OperandId};
use super::op::{Op, OpKind};
use super::operand::{Operand, OperandKind};
use crate::shared::models::Position;

/// Upper bound on value/original chains followed by `value_of`
const MAX_VALUE_CHAIN: usize = 64;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrArena {
    pub operands: Vec<Operand>,
    pub ops: Vec<Op>,
    pub blocks: Vec<Block>,
    pub funcs: Vec<Func>,
}

impl IrArena {
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════════

    pub fn new_operand(&mut self, kind: OperandKind) -> OperandId {
        let id = OperandId::new(self.operands.len());
        self.operands.push(Operand::new(kind));
        id
    }

    pub fn new_string(&mut self, value: impl Into<String>) -> OperandId {
        self.new_operand(OperandKind::String(value.into()))
    }

    pub fn new_temporary(&mut self, original: Option<OperandId>) -> OperandId {
        self.new_operand(OperandKind::Temporary { original })
    }

    /// Fresh block; registered with `func` when given
    pub fn new_block(&mut self, func: Option<FuncId>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Block::new(id, func));
        if let Some(f) = func {
            self.funcs[f.index()].blocks.push(id);
        }
        id
    }

    /// Fresh function with its own entry block
    pub fn new_func(&mut self, name: impl Into<String>) -> FuncId {
        let func_id = FuncId::new(self.funcs.len());
        let entry = BlockId::new(self.blocks.len());
        self.blocks.push(Block::new(entry, Some(func_id)));
        self.funcs.push(Func::new(name, entry));
        func_id
    }

    /// Register an op and its def/use edges; the op is not placed in a block
    pub fn add_op(
        &mut self,
        kind: OpKind,
        position: Position,
        file_path: Option<Arc<str>>,
    ) -> OpId {
        let id = OpId::new(self.ops.len());
        kind.for_each_operand(|slot, operand| {
            let target = &mut self.operands[operand.index()];
            if kind.is_write_slot(slot) {
                target.add_def(id);
            } else {
                target.add_usage(id);
            }
        });
        self.ops.push(Op {
            kind,
            position,
            file_path,
            block: None,
        });
        id
    }

    /// Append an op to the end of a block
    pub fn append(&mut self, block: BlockId, op: OpId) {
        self.blocks[block.index()].instructions.push(op);
        self.ops[op.index()].block = Some(block);
    }

    /// Place a φ in a block's φ set
    pub fn attach_phi(&mut self, block: BlockId, phi: OpId) {
        self.blocks[block.index()].add_phi(phi);
        self.ops[phi.index()].block = Some(block);
    }

    /// Append an incoming value to a φ
    pub fn add_phi_operand(&mut self, phi: OpId, operand: OperandId) {
        if let OpKind::Phi { vars, .. } = &mut self.ops[phi.index()].kind {
            vars.push(operand);
            self.operands[operand.index()].add_usage(phi);
        }
    }

    /// Record `cond` as a path condition of `block`
    pub fn add_block_condition(&mut self, block: BlockId, cond: OperandId) {
        self.blocks[block.index()].add_condition(cond);
        self.operands[cond.index()].add_cond_usage(block);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Access
    // ═══════════════════════════════════════════════════════════════════════

    pub fn operand(&self, id: OperandId) -> &Operand {
        &self.operands[id.index()]
    }

    pub fn operand_mut(&mut self, id: OperandId) -> &mut Operand {
        &mut self.operands[id.index()]
    }

    pub fn op(&self, id: OpId) -> &Op {
        &self.ops[id.index()]
    }

    pub fn op_mut(&mut self, id: OpId) -> &mut Op {
        &mut self.ops[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.funcs[id.index()]
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operand queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Variable name behind an operand (through temporaries)
    pub fn name_of(&self, id: OperandId) -> Option<&str> {
        let mut current = id;
        for _ in 0..MAX_VALUE_CHAIN {
            match &self.operand(current).kind {
                OperandKind::Variable { name, .. } | OperandKind::BoundVariable { name, .. } => {
                    return self.string_of(*name);
                }
                OperandKind::Temporary {
                    original: Some(original),
                } => current = *original,
                _ => return None,
            }
        }
        None
    }

    /// String literal payload of the operand itself
    pub fn string_of(&self, id: OperandId) -> Option<&str> {
        match &self.operand(id).kind {
            OperandKind::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Follow `Temporary.original` and `Variable.value` until a value that has
    /// no further link
    pub fn value_of(&self, id: OperandId) -> OperandId {
        let mut current = id;
        for _ in 0..MAX_VALUE_CHAIN {
            let next = match &self.operand(current).kind {
                OperandKind::Temporary { original } => *original,
                OperandKind::Variable { value, .. } | OperandKind::BoundVariable { value, .. } => {
                    *value
                }
                _ => None,
            };
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        current
    }

    /// Scalar value an operand is known to hold
    pub fn literal_of(&self, id: OperandId) -> Option<&OperandKind> {
        let kind = &self.operand(self.value_of(id)).kind;
        kind.is_scalar().then_some(kind)
    }

    pub fn is_symbolic(&self, id: OperandId) -> bool {
        matches!(
            self.operand(self.value_of(id)).kind,
            OperandKind::Symbolic { .. }
        )
    }

    /// Bind a constant value to a variable operand (through its temporary)
    pub fn set_value(&mut self, var: OperandId, value: OperandId) {
        let target = match self.operand(var).kind {
            OperandKind::Temporary {
                original: Some(original),
            } => original,
            _ => var,
        };
        match &mut self.operand_mut(target).kind {
            OperandKind::Variable { value: slot, .. }
            | OperandKind::BoundVariable { value: slot, .. } => *slot = Some(value),
            _ => {}
        }
    }

    pub fn add_assertion(&mut self, target: OperandId, var: OperandId, assertion: Assertion) {
        self.operand_mut(target).add_assertion(var, assertion);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rewriting
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace `from` with `to` in one op, keeping def/use sets in sync
    pub fn replace_operand_in_op(&mut self, op: OpId, from: OperandId, to: OperandId) {
        if from == to {
            return;
        }
        let mut kind = std::mem::replace(&mut self.ops[op.index()].kind, OpKind::Jump {
            target: BlockId(0),
        });
        let mut wrote = false;
        let mut read = false;
        kind.for_each_operand_mut(|_, id| {
            if *id == from {
                *id = to;
            }
        });
        kind.for_each_operand(|slot, id| {
            if id == to {
                if kind.is_write_slot(slot) {
                    wrote = true;
                } else {
                    read = true;
                }
            }
        });
        self.ops[op.index()].kind = kind;

        let old = &mut self.operands[from.index()];
        old.remove_usage(op);
        old.remove_def(op);
        let new = &mut self.operands[to.index()];
        if wrote {
            new.add_def(op);
        }
        if read {
            new.add_usage(op);
        }
    }

    /// Replace every read of `from` with `to`, including block conditions
    pub fn replace_all_uses(&mut self, from: OperandId, to: OperandId) {
        if from == to {
            return;
        }
        let usages = self.operand(from).usages.clone();
        for op in usages {
            self.replace_operand_in_op(op, from, to);
        }
        let cond_usages = std::mem::take(&mut self.operand_mut(from).cond_usages);
        for block in cond_usages {
            for cond in self.blocks[block.index()].conditions.iter_mut() {
                if *cond == from {
                    *cond = to;
                }
            }
            self.operand_mut(to).add_cond_usage(block);
        }
    }

    /// Detach an op from its block and drop its def/use edges
    pub fn remove_op(&mut self, op: OpId) {
        if let Some(block) = self.ops[op.index()].block.take() {
            let b = &mut self.blocks[block.index()];
            b.instructions.retain(|i| *i != op);
            b.phis.retain(|i| *i != op);
        }
        let operands = self.ops[op.index()].kind.operands();
        for (_, id) in operands {
            let o = &mut self.operands[id.index()];
            o.remove_usage(op);
            o.remove_def(op);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Control flow
    // ═══════════════════════════════════════════════════════════════════════

    /// Last op of a block when it is a terminator
    pub fn terminator(&self, block: BlockId) -> Option<OpId> {
        self.block(block)
            .last()
            .filter(|op| self.op(*op).kind.is_terminator())
    }

    /// Control successors of a block (targets of its terminator)
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block)
            .map(|op| self.op(op).kind.successors())
            .unwrap_or_default()
    }

    /// Link `from → to` in the predecessor lists
    pub fn link(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(to).add_predecessor(from);
    }
}
