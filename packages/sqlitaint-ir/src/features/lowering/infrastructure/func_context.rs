//! Per-function lowering state
//!
//! Holds what the builder needs while one function body is being lowered:
//! the SSA scope of every block, φs created before the CFG was complete,
//! goto labels and the stack of active branch conditions.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};

use crate::features::ir::domain::{BlockId, OpId, OperandId};

#[derive(Debug, Default)]
pub struct FuncContext {
    /// Set once every block of the function exists
    pub complete: bool,
    labels: HashMap<String, BlockId>,
    scope: HashMap<BlockId, HashMap<String, OperandId>>,
    /// Insertion-ordered so φ resolution is deterministic
    incomplete_phis: Vec<(BlockId, String, OpId)>,
    unresolved_gotos: Vec<(String, BlockId)>,
    conditions: Vec<OperandId>,
    written_names: HashSet<String>,
}

impl FuncContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────────────────────────────────────────────────────────
    // SSA scope
    // ───────────────────────────────────────────────────────────────────────

    pub fn lookup(&self, block: BlockId, name: &str) -> Option<OperandId> {
        self.scope.get(&block).and_then(|vars| vars.get(name)).copied()
    }

    pub fn bind(&mut self, block: BlockId, name: &str, value: OperandId) {
        self.written_names.insert(name.to_string());
        self.scope
            .entry(block)
            .or_default()
            .insert(name.to_string(), value);
    }

    /// True once `name` has been bound anywhere in this function
    pub fn was_written(&self, name: &str) -> bool {
        self.written_names.contains(name)
    }

    pub fn add_incomplete_phi(&mut self, block: BlockId, name: &str, phi: OpId) {
        self.incomplete_phis.push((block, name.to_string(), phi));
    }

    pub fn take_incomplete_phis(&mut self) -> Vec<(BlockId, String, OpId)> {
        std::mem::take(&mut self.incomplete_phis)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Labels
    // ───────────────────────────────────────────────────────────────────────

    pub fn label(&self, name: &str) -> Option<BlockId> {
        self.labels.get(name).copied()
    }

    pub fn define_label(&mut self, name: &str, block: BlockId) {
        self.labels.insert(name.to_string(), block);
    }

    pub fn add_unresolved_goto(&mut self, label: &str, from: BlockId) {
        self.unresolved_gotos.push((label.to_string(), from));
    }

    /// Remove and return the blocks waiting on `label`
    pub fn resolve_gotos(&mut self, label: &str) -> Vec<BlockId> {
        let mut resolved = Vec::new();
        self.unresolved_gotos.retain(|(name, block)| {
            if name == label {
                resolved.push(*block);
                false
            } else {
                true
            }
        });
        resolved
    }

    pub fn unresolved_labels(&self) -> Vec<&str> {
        self.unresolved_gotos
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Branch conditions
    // ───────────────────────────────────────────────────────────────────────

    pub fn push_condition(&mut self, cond: OperandId) {
        self.conditions.push(cond);
    }

    pub fn pop_condition(&mut self) -> Option<OperandId> {
        self.conditions.pop()
    }

    pub fn conditions(&self) -> &[OperandId] {
        &self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_is_per_block() {
        let mut ctx = FuncContext::new();
        ctx.bind(BlockId(0), "x", OperandId(1));
        ctx.bind(BlockId(1), "x", OperandId(2));

        assert_eq!(ctx.lookup(BlockId(0), "x"), Some(OperandId(1)));
        assert_eq!(ctx.lookup(BlockId(1), "x"), Some(OperandId(2)));
        assert_eq!(ctx.lookup(BlockId(2), "x"), None);
        assert!(ctx.was_written("x"));
        assert!(!ctx.was_written("y"));
    }

    #[test]
    fn test_gotos_resolve_by_label() {
        let mut ctx = FuncContext::new();
        ctx.add_unresolved_goto("end", BlockId(1));
        ctx.add_unresolved_goto("retry", BlockId(2));
        ctx.add_unresolved_goto("end", BlockId(3));

        assert_eq!(ctx.resolve_gotos("end"), vec![BlockId(1), BlockId(3)]);
        assert_eq!(ctx.unresolved_labels(), vec!["retry"]);
    }

    #[test]
    fn test_condition_stack() {
        let mut ctx = FuncContext::new();
        ctx.push_condition(OperandId(4));
        ctx.push_condition(OperandId(5));
        assert_eq!(ctx.conditions(), &[OperandId(4), OperandId(5)]);
        assert_eq!(ctx.pop_condition(), Some(OperandId(5)));
        assert_eq!(ctx.conditions(), &[OperandId(4)]);
    }
}
