//! Operand model
//!
//! Values flowing between ops. Def/use edges are stored on the operand as
//! op indices so rewriting never chases pointers.

use super::assertion::{Assertion, AssertionMode, VarAssertion};
use super::ids::{BlockId, OpId, OperandId};

/// Storage class of a bound variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Global,
    Local,
    Object,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandKind {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object {
        class_name: String,
    },
    /// External input (superglobal read); `Operand::tainted` is set
    Symbolic {
        tag: String,
    },
    /// Named variable; `name` is a String operand or, for `$$x`, any operand
    Variable {
        name: OperandId,
        value: Option<OperandId>,
    },
    BoundVariable {
        name: OperandId,
        value: Option<OperandId>,
        by_ref: bool,
        scope: VarScope,
    },
    /// SSA value; `original` points back to the source variable
    Temporary {
        original: Option<OperandId>,
    },
}

impl OperandKind {
    /// Null, bool, number or string
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            OperandKind::Null
                | OperandKind::Bool(_)
                | OperandKind::Number(_)
                | OperandKind::String(_)
        )
    }

    /// Scalars plus objects and symbolic inputs: values that need no def
    pub fn is_constant_like(&self) -> bool {
        self.is_scalar()
            || matches!(
                self,
                OperandKind::Object { .. } | OperandKind::Symbolic { .. }
            )
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, OperandKind::Temporary { .. })
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            OperandKind::Null => "null",
            OperandKind::Bool(_) => "bool",
            OperandKind::Number(_) => "number",
            OperandKind::String(_) => "string",
            OperandKind::Object { .. } => "object",
            OperandKind::Symbolic { .. } => "symbolic",
            OperandKind::Variable { .. } => "variable",
            OperandKind::BoundVariable { .. } => "bound",
            OperandKind::Temporary { .. } => "temporary",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    /// Ops writing this operand (one after SSA completion)
    pub defs: Vec<OpId>,
    /// Ops reading this operand (deduplicated)
    pub usages: Vec<OpId>,
    pub assertions: Vec<VarAssertion>,
    /// Blocks whose path condition mentions this operand
    pub cond_usages: Vec<BlockId>,
    pub tainted: bool,
}

impl Operand {
    pub fn new(kind: OperandKind) -> Self {
        Self {
            kind,
            defs: Vec::new(),
            usages: Vec::new(),
            assertions: Vec::new(),
            cond_usages: Vec::new(),
            tainted: false,
        }
    }

    pub fn add_usage(&mut self, op: OpId) {
        if !self.usages.contains(&op) {
            self.usages.push(op);
        }
    }

    pub fn remove_usage(&mut self, op: OpId) {
        self.usages.retain(|u| *u != op);
    }

    pub fn add_def(&mut self, op: OpId) {
        if !self.defs.contains(&op) {
            self.defs.push(op);
        }
    }

    pub fn remove_def(&mut self, op: OpId) {
        self.defs.retain(|d| *d != op);
    }

    pub fn add_cond_usage(&mut self, block: BlockId) {
        if !self.cond_usages.contains(&block) {
            self.cond_usages.push(block);
        }
    }

    /// Attach an assertion about `var`; a second assertion on the same var is
    /// merged into an intersection
    pub fn add_assertion(&mut self, var: OperandId, assertion: Assertion) {
        if let Some(existing) = self.assertions.iter_mut().find(|a| a.var == var) {
            if existing.assertion == assertion {
                return;
            }
            let merged = match std::mem::replace(
                &mut existing.assertion,
                Assertion::Composite {
                    children: Vec::new(),
                    mode: AssertionMode::Intersect,
                    negated: false,
                },
            ) {
                Assertion::Composite {
                    mut children,
                    mode: AssertionMode::Intersect,
                    negated: false,
                } => {
                    children.push(assertion);
                    children
                }
                previous => vec![previous, assertion],
            };
            existing.assertion = Assertion::Composite {
                children: merged,
                mode: AssertionMode::Intersect,
                negated: false,
            };
            return;
        }
        self.assertions.push(VarAssertion { var, assertion });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_dedup() {
        let mut op = Operand::new(OperandKind::Null);
        op.add_usage(OpId(1));
        op.add_usage(OpId(1));
        op.add_usage(OpId(2));
        assert_eq!(op.usages, vec![OpId(1), OpId(2)]);
        op.remove_usage(OpId(1));
        assert_eq!(op.usages, vec![OpId(2)]);
    }

    #[test]
    fn test_assertions_merge_into_intersection() {
        let mut op = Operand::new(OperandKind::Temporary { original: None });
        let var = OperandId(0);
        op.add_assertion(var, Assertion::type_of(OperandId(5)));
        op.add_assertion(var, Assertion::type_of(OperandId(6)));
        op.add_assertion(var, Assertion::type_of(OperandId(7)));

        assert_eq!(op.assertions.len(), 1);
        match &op.assertions[0].assertion {
            Assertion::Composite { children, mode, .. } => {
                assert_eq!(*mode, AssertionMode::Intersect);
                assert_eq!(children.len(), 3);
            }
            other => panic!("expected composite, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_like() {
        assert!(OperandKind::Number(1.0).is_scalar());
        assert!(OperandKind::Symbolic { tag: "getsymbolic".into() }.is_constant_like());
        assert!(!OperandKind::Temporary { original: None }.is_constant_like());
    }
}
