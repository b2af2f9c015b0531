//! Path Enumerator
//!
//! Depth-first walk over blocks from a `{main}`, crossing resolved call
//! edges. Work is kept on an explicit task stack:
//!
//! ```text
//! Enter(path, block)      run the block, push successor tasks
//! Branch(path, term, ..)  assume term; on success push Retract + Enter
//! Leave(key)              block is off the DFS stack again
//! Retract                 pop the branch assumption
//! ```
//!
//! Sibling branches are pushed together, so each one is assumed, explored
//! and retracted before the next is tried: both see the same assumption
//! prefix.
//!
//! A block reached again while still on the DFS stack (a loop back edge)
//! is not re-run. Its φs are committed to the back-edge value and the walk
//! leaves through the successors that are not on the stack, which gives
//! every loop a single unrolling.
//!
//! Calls resume in the caller where they left off: a frame remembers the
//! block and instruction index after the call op.

use ahash::AHashSet;
use tracing::{debug, trace, warn};

use super::call_resolver::CallResolver;
use crate::features::ir::domain::{
    BlockId, FuncId, IrArena, OpId, OpKind, OperandId, OperandKind, Script,
};
use crate::features::path_enumeration::domain::{ExecPath, Frame, PathCondition};
use crate::features::smt::application::FeasibilityChecker;
use crate::features::smt::domain::Term;
use crate::features::smt::infrastructure::ConstraintExtractor;

type BlockKey = (u32, BlockId);

enum Task {
    Enter {
        path: ExecPath,
        block: BlockId,
        from: Option<BlockId>,
    },
    Branch {
        path: ExecPath,
        assumption: Term,
        condition: PathCondition,
        target: BlockId,
        from: BlockId,
    },
    Leave(BlockKey),
    Retract,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumerationStats {
    pub paths: usize,
    /// Calls explored into a callee
    pub calls_followed: usize,
    /// Calls left opaque: unresolved, recursive, or past the depth cap
    pub calls_opaque: usize,
    pub loops_cut: usize,
    pub truncated: bool,
}

pub struct PathEnumerator<'a> {
    arena: &'a IrArena,
    resolver: CallResolver<'a>,
    checker: FeasibilityChecker,
    /// Null literal bound to parameters without argument or default
    null: OperandId,
    max_depth: usize,
    max_paths: usize,
    on_stack: AHashSet<BlockKey>,
    next_invocation: u32,
    paths: Vec<ExecPath>,
    stats: EnumerationStats,
    warned: AHashSet<String>,
}

impl<'a> PathEnumerator<'a> {
    pub fn new(
        arena: &'a IrArena,
        scripts: &'a [Script],
        checker: FeasibilityChecker,
        null: OperandId,
    ) -> Self {
        Self {
            arena,
            resolver: CallResolver::new(arena, scripts),
            checker,
            null,
            max_depth: usize::MAX,
            max_paths: usize::MAX,
            on_stack: AHashSet::new(),
            next_invocation: 0,
            paths: Vec::new(),
            stats: EnumerationStats::default(),
            warned: AHashSet::new(),
        }
    }

    pub fn with_limits(mut self, max_depth: usize, max_paths: usize) -> Self {
        self.max_depth = max_depth;
        self.max_paths = max_paths;
        self
    }

    pub fn resolver(&self) -> &CallResolver<'a> {
        &self.resolver
    }

    pub fn checker(&self) -> &FeasibilityChecker {
        &self.checker
    }

    pub fn stats(&self) -> EnumerationStats {
        self.stats
    }

    /// Remaining path budget
    pub fn remaining(&self) -> usize {
        self.max_paths.saturating_sub(self.stats.paths)
    }

    /// Every feasible path from `main`'s entry
    pub fn enumerate(&mut self, main: FuncId) -> Vec<ExecPath> {
        let invocation = self.fresh_invocation();
        let entry = self.arena.func(main).entry;
        let mut tasks = vec![Task::Enter {
            path: ExecPath::new(main, invocation),
            block: entry,
            from: None,
        }];

        while let Some(task) = tasks.pop() {
            if self.remaining() == 0 {
                self.stats.truncated = true;
                debug!(max_paths = self.max_paths, "path budget exhausted");
                break;
            }
            match task {
                Task::Leave(key) => {
                    self.on_stack.remove(&key);
                }
                Task::Retract => self.checker.retract(),
                Task::Branch {
                    mut path,
                    assumption,
                    condition,
                    target,
                    from,
                } => {
                    if self.checker.assume(assumption) {
                        path.conditions.push(condition);
                        tasks.push(Task::Retract);
                        tasks.push(Task::Enter {
                            path,
                            block: target,
                            from: Some(from),
                        });
                    } else {
                        trace!(block = %target, "infeasible branch pruned");
                        self.checker.retract();
                    }
                }
                Task::Enter { path, block, from } => self.enter(path, block, from, &mut tasks),
            }
        }

        while self.checker.depth() > 0 {
            self.checker.retract();
        }
        self.on_stack.clear();
        std::mem::take(&mut self.paths)
    }

    fn fresh_invocation(&mut self) -> u32 {
        let id = self.next_invocation;
        self.next_invocation += 1;
        id
    }

    fn enter(&mut self, mut path: ExecPath, block: BlockId, from: Option<BlockId>, tasks: &mut Vec<Task>) {
        if self.arena.block(block).dead {
            return;
        }
        self.commit_phis(&mut path, block, from);

        let key = (path.invocation, block);
        if self.on_stack.contains(&key) {
            self.reenter(path, block, tasks);
            return;
        }
        self.on_stack.insert(key);
        tasks.push(Task::Leave(key));
        self.run(path, block, 0, tasks);
    }

    /// Execute `block` from instruction `start` up to its terminator
    fn run(&mut self, mut path: ExecPath, mut block: BlockId, mut index: usize, tasks: &mut Vec<Task>) {
        let arena = self.arena;
        loop {
            let Some(&op) = arena.block(block).instructions.get(index) else {
                // fell off a block without terminator
                self.unwind(path, None, None, tasks);
                return;
            };
            let kind = &arena.op(op).kind;
            if kind.is_terminator() {
                self.terminate(path, block, op, tasks);
                return;
            }
            match kind {
                OpKind::Param { .. } => {}
                OpKind::FunctionCall { .. }
                | OpKind::MethodCall { .. }
                | OpKind::StaticCall { .. }
                | OpKind::New { .. } => {
                    path.push_op(op, kind.result());
                    if let Some(callee) = self.callee(&path, op) {
                        let entry = self.call(&mut path, op, callee, block, index + 1);
                        let key = (path.invocation, entry);
                        self.on_stack.insert(key);
                        tasks.push(Task::Leave(key));
                        block = entry;
                        index = 0;
                        continue;
                    }
                }
                _ => path.push_op(op, kind.result()),
            }
            index += 1;
        }
    }

    fn terminate(&mut self, path: ExecPath, block: BlockId, op: OpId, tasks: &mut Vec<Task>) {
        let arena = self.arena;
        match &arena.op(op).kind {
            OpKind::Jump { target } => tasks.push(Task::Enter {
                path,
                block: *target,
                from: Some(block),
            }),
            OpKind::JumpIf {
                cond,
                if_target,
                else_target,
            } => self.fork_if(
                path,
                block,
                *cond,
                &[(*else_target, false), (*if_target, true)],
                tasks,
            ),
            OpKind::Switch {
                cond,
                cases,
                targets,
                default_target,
            } => {
                let arms: Vec<Option<usize>> = (0..targets.len())
                    .map(Some)
                    .chain(std::iter::once(None))
                    .collect();
                self.fork_switch(path, block, *cond, cases, targets, *default_target, &arms, tasks);
            }
            OpKind::Return { expr } => self.unwind(path, Some(op), *expr, tasks),
            _ => self.commit(path),
        }
    }

    /// Push one branch task per `(target, taken)` arm; the last arm is explored first
    fn fork_if(
        &self,
        path: ExecPath,
        block: BlockId,
        cond: OperandId,
        arms: &[(BlockId, bool)],
        tasks: &mut Vec<Task>,
    ) {
        let term = ConstraintExtractor::new(self.arena, &path.substitutions).condition(cond);
        for (target, taken) in arms {
            let assumption = if *taken {
                term.clone()
            } else {
                Term::not(term.clone())
            };
            tasks.push(Task::Branch {
                path: path.clone(),
                assumption,
                condition: PathCondition::Branch {
                    cond,
                    taken: *taken,
                },
                target: *target,
                from: block,
            });
        }
    }

    /// `arms` selects case indices (`None` is the default arm)
    fn fork_switch(
        &self,
        path: ExecPath,
        block: BlockId,
        subject: OperandId,
        cases: &[OperandId],
        targets: &[BlockId],
        default_target: BlockId,
        arms: &[Option<usize>],
        tasks: &mut Vec<Task>,
    ) {
        let mut extractor = ConstraintExtractor::new(self.arena, &path.substitutions);
        let equalities: Vec<Term> = cases
            .iter()
            .map(|case| extractor.case_equality(subject, *case))
            .collect();

        // default first so the cases are explored in source order
        for arm in arms.iter().rev() {
            let (assumption, condition, target) = match arm {
                Some(i) => match (equalities.get(*i), cases.get(*i), targets.get(*i)) {
                    (Some(eq), Some(case), Some(target)) => (
                        eq.clone(),
                        PathCondition::Case {
                            subject,
                            value: *case,
                        },
                        *target,
                    ),
                    _ => continue,
                },
                None => (
                    Term::and(equalities.iter().cloned().map(Term::not).collect()),
                    PathCondition::Default { subject },
                    default_target,
                ),
            };
            tasks.push(Task::Branch {
                path: path.clone(),
                assumption,
                condition,
                target,
                from: block,
            });
        }
    }

    /// Loop back edge: leave through successors not on the stack. The exit
    /// test is a later evaluation of the loop condition, so it is recorded
    /// but not assumed.
    fn reenter(&mut self, path: ExecPath, block: BlockId, tasks: &mut Vec<Task>) {
        self.stats.loops_cut += 1;
        let arena = self.arena;
        let Some(term) = arena.terminator(block) else {
            return;
        };
        let exits = |target: BlockId| {
            !self.on_stack.contains(&(path.invocation, target)) && !arena.block(target).dead
        };

        let leaving: Vec<(BlockId, Option<PathCondition>)> = match &arena.op(term).kind {
            OpKind::Jump { target } => vec![(*target, None)],
            OpKind::JumpIf {
                cond,
                if_target,
                else_target,
            } => vec![
                (
                    *else_target,
                    Some(PathCondition::Branch {
                        cond: *cond,
                        taken: false,
                    }),
                ),
                (
                    *if_target,
                    Some(PathCondition::Branch {
                        cond: *cond,
                        taken: true,
                    }),
                ),
            ],
            OpKind::Switch {
                cond,
                cases,
                targets,
                default_target,
            } => std::iter::once((*default_target, Some(PathCondition::Default { subject: *cond })))
                .chain(cases.iter().zip(targets).rev().map(|(case, target)| {
                    (
                        *target,
                        Some(PathCondition::Case {
                            subject: *cond,
                            value: *case,
                        }),
                    )
                }))
                .collect(),
            _ => Vec::new(),
        };
        let leaving: Vec<_> = leaving.into_iter().filter(|(t, _)| exits(*t)).collect();
        if leaving.is_empty() {
            trace!(block = %block, "loop without exit dropped");
            return;
        }

        for (target, condition) in leaving {
            let mut exit_path = path.clone();
            exit_path.conditions.extend(condition);
            tasks.push(Task::Enter {
                path: exit_path,
                block: target,
                from: Some(block),
            });
        }
    }

    /// Bind each φ of `block` to the value flowing in over `from`
    fn commit_phis(&self, path: &mut ExecPath, block: BlockId, from: Option<BlockId>) {
        let record = self.arena.block(block);
        if record.phis.is_empty() {
            return;
        }
        let slot = from.and_then(|from| {
            record
                .predecessors
                .iter()
                .filter(|p| !self.arena.block(**p).dead)
                .position(|p| *p == from)
        });
        for phi in &record.phis {
            let OpKind::Phi { vars, result } = &self.arena.op(*phi).kind else {
                continue;
            };
            let incoming = slot
                .and_then(|i| vars.get(i).copied())
                .or_else(|| vars.iter().find(|v| path.known_vars.contains(*v)).copied())
                .or_else(|| vars.first().copied());
            if let Some(value) = incoming {
                path.bind(None, *result, Some(value));
            }
        }
    }

    fn callee(&mut self, path: &ExecPath, call: OpId) -> Option<FuncId> {
        let script = self.resolver.script_of(path.func)?;
        let Some(callee) = self
            .resolver
            .resolve(script, path.func, call, &path.substitutions)
        else {
            self.stats.calls_opaque += 1;
            self.report_unresolved(call);
            return None;
        };
        if path.func == callee || path.in_call(callee) || path.depth() >= self.max_depth {
            self.stats.calls_opaque += 1;
            trace!(callee = %self.arena.func(callee).scoped_name(), "call left opaque");
            return None;
        }
        Some(callee)
    }

    fn report_unresolved(&mut self, call: OpId) {
        let arena = self.arena;
        let kind = &arena.op(call).kind;
        let name = kind
            .operand("name")
            .and_then(|n| arena.string_of(n))
            .unwrap_or("<dynamic>");
        match kind {
            // builtins land here; only user-level method dispatch is worth a warning
            OpKind::MethodCall { .. } | OpKind::StaticCall { .. } => {
                if self.warned.insert(name.to_ascii_lowercase()) {
                    warn!(method = name, "unresolved method call treated as opaque");
                }
            }
            _ => trace!(callee = name, "unresolved call treated as opaque"),
        }
    }

    /// Bind arguments to `callee`'s parameters and push its frame; returns the entry block
    fn call(
        &mut self,
        path: &mut ExecPath,
        call: OpId,
        callee: FuncId,
        resume_block: BlockId,
        resume_index: usize,
    ) -> BlockId {
        self.stats.calls_followed += 1;
        let invocation = self.fresh_invocation();
        let arena = self.arena;
        let args = arena.op(call).kind.operand_list("args");
        let func = arena.func(callee);

        for (i, param) in func.params.iter().enumerate() {
            if let OpKind::Param {
                result,
                default_var,
                ..
            } = &arena.op(*param).kind
            {
                let source = args
                    .get(i)
                    .copied()
                    .or(*default_var)
                    .unwrap_or(self.null);
                path.bind(Some(*param), *result, Some(source));
            }
        }

        if let Some(callable) = func.callable_op {
            if let OpKind::Closure { use_vars, .. } = &arena.op(callable).kind {
                for bound in use_vars {
                    if let OperandKind::BoundVariable {
                        value: Some(value), ..
                    } = &arena.operand(*bound).kind
                    {
                        path.bind(None, *bound, Some(*value));
                    }
                }
            }
        }

        path.frames.push(Frame {
            func: callee,
            invocation,
            call,
            resume_block,
            resume_index,
            caller_invocation: path.invocation,
            caller_func: path.func,
        });
        path.func = callee;
        path.invocation = invocation;
        func.entry
    }

    /// Return from the current frame, or commit when nothing is left to return to
    fn unwind(&mut self, mut path: ExecPath, op: Option<OpId>, value: Option<OperandId>, tasks: &mut Vec<Task>) {
        let Some(frame) = path.frames.pop() else {
            self.commit(path);
            return;
        };
        path.return_value = value;
        let arena = self.arena;
        let call_kind = &arena.op(frame.call).kind;
        if !matches!(call_kind, OpKind::New { .. }) {
            if let Some(result) = call_kind.result() {
                path.bind(op, result, value);
            }
        }
        path.func = frame.caller_func;
        path.invocation = frame.caller_invocation;
        self.run(path, frame.resume_block, frame.resume_index, tasks);
    }

    fn commit(&mut self, path: ExecPath) {
        if self.remaining() == 0 {
            self.stats.truncated = true;
            return;
        }
        trace!(events = path.events.len(), conditions = path.conditions.len(), "path committed");
        self.stats.paths += 1;
        self.paths.push(path);
    }
}
