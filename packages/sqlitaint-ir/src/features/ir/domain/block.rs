//! Basic blocks

use super::ids::{BlockId, FuncId, OpId, OperandId};

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    /// Ops in execution order; a live block ends with a terminator
    pub instructions: Vec<OpId>,
    pub predecessors: Vec<BlockId>,
    /// Phi ops, kept separate from `instructions` (insertion ordered, unique)
    pub phis: Vec<OpId>,
    /// Unreachable (follows return/throw/exit)
    pub dead: bool,
    /// Entry of a branch arm; `conditions` holds the guards
    pub conditional: bool,
    pub conditions: Vec<OperandId>,
    /// A superglobal is read here
    pub contains_tainted: bool,
    pub func: Option<FuncId>,
}

impl Block {
    pub fn new(id: BlockId, func: Option<FuncId>) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            predecessors: Vec::new(),
            phis: Vec::new(),
            dead: false,
            conditional: false,
            conditions: Vec::new(),
            contains_tainted: false,
            func,
        }
    }

    pub fn add_predecessor(&mut self, block: BlockId) {
        if !self.predecessors.contains(&block) {
            self.predecessors.push(block);
        }
    }

    pub fn add_phi(&mut self, phi: OpId) {
        if !self.phis.contains(&phi) {
            self.phis.push(phi);
        }
    }

    pub fn add_condition(&mut self, cond: OperandId) {
        self.conditional = true;
        if !self.conditions.contains(&cond) {
            self.conditions.push(cond);
        }
    }

    pub fn last(&self) -> Option<OpId> {
        self.instructions.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predecessors_and_phis_are_unique() {
        let mut block = Block::new(BlockId(1), None);
        block.add_predecessor(BlockId(0));
        block.add_predecessor(BlockId(0));
        block.add_phi(OpId(4));
        block.add_phi(OpId(4));
        block.add_phi(OpId(2));
        assert_eq!(block.predecessors, vec![BlockId(0)]);
        assert_eq!(block.phis, vec![OpId(4), OpId(2)]);
    }

    #[test]
    fn test_condition_marks_conditional() {
        let mut block = Block::new(BlockId(0), None);
        assert!(!block.conditional);
        block.add_condition(OperandId(3));
        assert!(block.conditional);
        assert_eq!(block.conditions, vec![OperandId(3)]);
    }
}
