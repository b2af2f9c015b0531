//! Execution path model
//!
//! A path is the ordered event log one walk through the program produced:
//! executed ops plus the value bindings the walk made on the way (arguments
//! flowing into parameters, return values flowing back, φs committed to the
//! edge that was taken).

use ahash::{AHashMap, AHashSet};

use crate::features::ir::domain::{BlockId, FuncId, OpId, OperandId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEvent {
    /// An op ran
    Op(OpId),

    /// `target` now holds whatever `source` holds (`None` clears it).
    ///
    /// `via` is the op the value flowed through: the callee's `Param` for
    /// argument binding, the callee's `Return` for result binding. A bind
    /// without `via` is a plain alias (committed φ, captured closure var).
    Bind {
        via: Option<OpId>,
        target: OperandId,
        source: Option<OperandId>,
    },
}

/// One branch decision recorded on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCondition {
    /// `cond` evaluated to `taken`
    Branch { cond: OperandId, taken: bool },
    /// Switch subject matched `value`
    Case { subject: OperandId, value: OperandId },
    /// Switch subject matched none of the cases
    Default { subject: OperandId },
}

/// Active call on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub func: FuncId,
    pub invocation: u32,
    /// Call op in the caller
    pub call: OpId,
    /// Where the caller resumes: block and instruction index after the call
    pub resume_block: BlockId,
    pub resume_index: usize,
    pub caller_invocation: u32,
    pub caller_func: FuncId,
}

#[derive(Debug, Clone)]
pub struct ExecPath {
    /// Function currently executing and its invocation id
    pub func: FuncId,
    pub invocation: u32,
    pub events: Vec<PathEvent>,
    pub conditions: Vec<PathCondition>,
    /// Operand overrides in force (param → argument, φ → incoming value)
    pub substitutions: AHashMap<OperandId, OperandId>,
    /// Operands whose defining op ran on this path
    pub known_vars: AHashSet<OperandId>,
    /// Value of the last `return` that unwound a frame
    pub return_value: Option<OperandId>,
    pub frames: Vec<Frame>,
}

impl ExecPath {
    pub fn new(func: FuncId, invocation: u32) -> Self {
        Self {
            func,
            invocation,
            events: Vec::new(),
            conditions: Vec::new(),
            substitutions: AHashMap::new(),
            known_vars: AHashSet::new(),
            return_value: None,
            frames: Vec::new(),
        }
    }

    pub fn push_op(&mut self, op: OpId, result: Option<OperandId>) {
        self.events.push(PathEvent::Op(op));
        if let Some(result) = result {
            self.known_vars.insert(result);
        }
    }

    /// Record a binding; the override stored is `source` as currently
    /// substituted, so overrides never chain back into themselves
    pub fn bind(&mut self, via: Option<OpId>, target: OperandId, source: Option<OperandId>) {
        self.events.push(PathEvent::Bind {
            via,
            target,
            source,
        });
        match source.map(|s| self.resolve(s)) {
            Some(resolved) if resolved != target => {
                self.substitutions.insert(target, resolved);
            }
            _ => {
                self.substitutions.remove(&target);
            }
        }
        self.known_vars.insert(target);
    }

    /// Current override of `id`, or `id` itself
    pub fn resolve(&self, id: OperandId) -> OperandId {
        self.substitutions.get(&id).copied().unwrap_or(id)
    }

    /// Executed ops in order
    pub fn ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.events.iter().filter_map(|e| match e {
            PathEvent::Op(op) => Some(*op),
            PathEvent::Bind { .. } => None,
        })
    }

    pub fn contains_op(&self, op: OpId) -> bool {
        self.ops().any(|o| o == op)
    }

    /// Innermost active call
    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn in_call(&self, func: FuncId) -> bool {
        self.frames.iter().any(|f| f.func == func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_tracks_substitution() {
        let mut path = ExecPath::new(FuncId(0), 0);
        path.bind(None, OperandId(4), Some(OperandId(1)));
        assert_eq!(path.substitutions.get(&OperandId(4)), Some(&OperandId(1)));
        assert!(path.known_vars.contains(&OperandId(4)));

        path.bind(Some(OpId(9)), OperandId(4), None);
        assert!(
            !path.substitutions.contains_key(&OperandId(4)),
            "clearing bind drops the override"
        );
        assert_eq!(path.events.len(), 2);
    }

    #[test]
    fn test_bind_snapshots_source() {
        let mut path = ExecPath::new(FuncId(0), 0);
        path.bind(None, OperandId(2), Some(OperandId(1)));
        path.bind(None, OperandId(3), Some(OperandId(2)));
        assert_eq!(path.resolve(OperandId(3)), OperandId(1));

        // a later rebinding of the middle link leaves earlier overrides alone
        path.bind(None, OperandId(2), Some(OperandId(7)));
        assert_eq!(path.resolve(OperandId(3)), OperandId(1));

        path.bind(None, OperandId(1), Some(OperandId(3)));
        assert_eq!(
            path.resolve(OperandId(1)),
            OperandId(1),
            "self-referential bind is dropped"
        );
    }

    #[test]
    fn test_ops_skip_binds() {
        let mut path = ExecPath::new(FuncId(0), 0);
        path.push_op(OpId(1), Some(OperandId(10)));
        path.bind(None, OperandId(11), Some(OperandId(10)));
        path.push_op(OpId(2), None);
        assert_eq!(path.ops().collect::<Vec<_>>(), vec![OpId(1), OpId(2)]);
        assert!(path.contains_op(OpId(2)));
        assert!(!path.contains_op(OpId(3)));
    }
}
