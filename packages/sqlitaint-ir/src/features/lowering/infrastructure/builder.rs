/*
 * IR Builder - AST → CFG of SSA ops
 *
 * Variable renaming follows Braun et al. (2013):
 * ```
 * read_variable(name, block):
 *     if name bound in block:        return binding
 *     if function incomplete:        incomplete φ, resolved at the end
 *     if one live predecessor:       read_variable(name, pred)
 *     otherwise:                     φ over every live predecessor
 * ```
 * Every φ created while the function body is still being lowered is
 * incomplete; all of them are resolved in one pass once the body is done
 * and the predecessor lists are final. Trivial φs are left for the
 * simplifier.
 *
 * Superglobal request arrays are never bound: each read yields a fresh
 * tainted Symbolic operand.
 */

use std::sync::Arc;

use ahash::AHashMap as HashMap;
use tracing::{debug, warn};

use super::func_context::FuncContext;
use crate::errors::{AnalyzerError, Result};
use crate::features::ir::domain::op::{BinaryOp, UnaryOp};
use crate::features::ir::domain::{
    func_flags, Assertion, BlockId, FuncId, IrArena, OpId, OpKind, OpType, OperandId,
    OperandKind, Script, VarScope, MAIN_FUNC_NAME,
};
use crate::features::parsing::ast::{
    Case, Catch, ClassDecl, ConstDecl, ElseIf, Expr, ExprKind, FunctionDecl, Literal, MethodDecl,
    Modifiers, Param, PropertyList, StaticVar, Stmt, StmtKind, TypeHint,
};
use crate::shared::models::Position;
use crate::shared::LabelGenerator;

/// Request arrays read as symbolic input, with their tags
const SUPERGLOBALS: &[(&str, &str)] = &[
    ("_GET", "getsymbolic"),
    ("_POST", "postsymbolic"),
    ("_REQUEST", "requestsymbolic"),
    ("_FILES", "filessymbolic"),
    ("_COOKIE", "cookiesymbolic"),
    ("_SERVER", "serverssymbolic"),
    ("_SERVERS", "serverssymbolic"),
];

/// Type names that are never class references
const BUILTIN_TYPES: &[&str] = &[
    "self", "parent", "static", "int", "integer", "long", "float", "double", "real", "array",
    "object", "bool", "boolean", "null", "void", "false", "true", "string", "mixed", "resource",
    "callable", "iterable", "never",
];

pub fn superglobal_tag(name: &str) -> Option<&'static str> {
    SUPERGLOBALS
        .iter()
        .find(|(global, _)| *global == name)
        .map(|(_, tag)| *tag)
}

/// Lowers one file into the shared arena
pub struct IrBuilder<'a> {
    pub(super) arena: &'a mut IrArena,
    pub(super) script: Script,
    pub(super) file_path: Arc<str>,
    pub(super) labels: LabelGenerator,
    pub(super) ctx: FuncContext,
    pub(super) func: FuncId,
    pub(super) block: BlockId,
    /// Fully qualified name of the class being lowered
    pub(super) class: Option<String>,
    /// Constants defined at file level, by name
    pub(super) consts: HashMap<String, OperandId>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(arena: &'a mut IrArena, file_path: &str, labels: LabelGenerator) -> Self {
        let file_path: Arc<str> = Arc::from(file_path);
        let main = arena.new_func(MAIN_FUNC_NAME);
        arena.func_mut(main).file_path = Some(file_path.clone());
        let entry = arena.func(main).entry;
        Self {
            arena,
            script: Script::new(file_path.clone(), main),
            file_path,
            labels,
            ctx: FuncContext::new(),
            func: main,
            block: entry,
            class: None,
            consts: HashMap::new(),
        }
    }

    /// Lower the file's top-level statements into `{main}`
    pub fn build(mut self, stmts: &[Stmt]) -> Result<Script> {
        let main = self.script.main;
        self.lower_func(main, &[], &[], stmts)?;
        debug!(
            file = %self.file_path,
            functions = self.script.ordered_functions.len(),
            "lowered file"
        );
        Ok(self.script)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Emission helpers
    // ═══════════════════════════════════════════════════════════════════════

    pub(super) fn new_block(&mut self) -> BlockId {
        self.arena.new_block(Some(self.func))
    }

    pub(super) fn new_dead_block(&mut self) -> BlockId {
        let block = self.new_block();
        self.arena.block_mut(block).dead = true;
        block
    }

    /// Register an op without placing it in a block
    pub(super) fn detached(&mut self, kind: OpKind, position: Position) -> OpId {
        self.arena.add_op(kind, position, None)
    }

    /// Append an op to the current block
    pub(super) fn emit(&mut self, kind: OpKind, position: Position) -> OpId {
        let op = self.arena.add_op(kind, position, None);
        self.arena.append(self.block, op);
        let reads_input = self
            .arena
            .op(op)
            .kind
            .read_operands()
            .into_iter()
            .any(|o| self.arena.operand(o).tainted);
        if reads_input {
            let func = self.func;
            self.arena.func_mut(func).sources.push(op);
        }
        op
    }

    /// Append an op whose result is a fresh temporary; returns the result
    pub(super) fn emit_value(
        &mut self,
        position: Position,
        make: impl FnOnce(OperandId) -> OpKind,
    ) -> OperandId {
        let result = self.arena.new_temporary(None);
        self.emit(make(result), position);
        result
    }

    /// Jump from the current block to `target`
    pub(super) fn jump(&mut self, target: BlockId, position: Position) {
        self.emit(OpKind::Jump { target }, position);
        self.arena.link(self.block, target);
    }

    /// Conditional jump from the current block
    pub(super) fn jump_if(
        &mut self,
        cond: OperandId,
        if_target: BlockId,
        else_target: BlockId,
        position: Position,
    ) {
        self.emit(
            OpKind::JumpIf {
                cond,
                if_target,
                else_target,
            },
            position,
        );
        let current = self.block;
        self.arena.block_mut(current).conditional = true;
        self.arena.link(current, if_target);
        self.arena.link(current, else_target);
    }

    /// Copy the active condition stack onto `block`
    pub(super) fn set_conditions(&mut self, block: BlockId) {
        let conds = self.ctx.conditions().to_vec();
        for cond in conds {
            self.arena.add_block_condition(block, cond);
        }
    }

    /// `!cond` as a detached op, used only as a path condition
    pub(super) fn negate(&mut self, cond: OperandId) -> OperandId {
        let result = self.arena.new_temporary(None);
        self.detached(
            OpKind::Unary {
                op: UnaryOp::BooleanNot,
                expr: cond,
                result,
            },
            Position::zero(),
        );
        result
    }

    pub(super) fn is_dead(&self, block: BlockId) -> bool {
        self.arena.block(block).dead
    }

    pub(super) fn lowering_error(&self, message: impl Into<String>) -> AnalyzerError {
        AnalyzerError::lowering(self.file_path.to_string(), message)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SSA renaming
    // ═══════════════════════════════════════════════════════════════════════

    /// Current SSA value of a variable operand; other operands are returned as is
    pub(super) fn read_variable(&mut self, operand: OperandId) -> OperandId {
        match self.arena.operand(operand).kind.clone() {
            OperandKind::Variable { name, .. } => match self.arena.string_of(name) {
                Some(var_name) => {
                    let var_name = var_name.to_string();
                    self.read_variable_name(&var_name, self.block)
                }
                None => {
                    // $$name: register the read of the inner name only
                    self.read_variable(name);
                    operand
                }
            },
            OperandKind::Temporary {
                original: Some(original),
            } => {
                // A field never assigned in this function is the fetch itself
                if let Some(name) = self.arena.name_of(original) {
                    if is_field_key(name) && !self.ctx.was_written(name) {
                        return operand;
                    }
                }
                self.read_variable(original)
            }
            _ => operand,
        }
    }

    /// New SSA definition for a variable operand
    pub(super) fn write_variable(&mut self, operand: OperandId) -> OperandId {
        let mut var = operand;
        let mut through_temporary = false;
        while let OperandKind::Temporary {
            original: Some(original),
        } = self.arena.operand(var).kind
        {
            var = original;
            through_temporary = true;
        }

        let name = match self.arena.operand(var).kind {
            OperandKind::Variable { name, .. } => name,
            _ => return var,
        };
        let var_name = match self.arena.string_of(name) {
            Some(s) => s.to_string(),
            None => {
                self.read_variable(name);
                return var;
            }
        };
        // Values are pinned on the Variable, so a rewrite of an old
        // definition gets its own occurrence
        if through_temporary {
            var = self
                .arena
                .new_operand(OperandKind::Variable { name, value: None });
        }
        let temp = self.arena.new_temporary(Some(var));
        self.ctx.bind(self.block, &var_name, temp);
        temp
    }

    pub(super) fn read_variable_name(&mut self, name: &str, block: BlockId) -> OperandId {
        if let Some(value) = self.ctx.lookup(block, name) {
            return value;
        }
        if let Some(tag) = superglobal_tag(name) {
            let func = self.func;
            self.arena.func_mut(func).contains_tainted = true;
            self.arena.block_mut(block).contains_tainted = true;
            let symbolic = self.arena.new_operand(OperandKind::Symbolic {
                tag: tag.to_string(),
            });
            self.arena.operand_mut(symbolic).tainted = true;
            return symbolic;
        }
        self.read_variable_recursive(name, block)
    }

    fn read_variable_recursive(&mut self, name: &str, block: BlockId) -> OperandId {
        if !self.ctx.complete {
            let (value, phi) = self.new_phi(name);
            self.ctx.add_incomplete_phi(block, name, phi);
            self.ctx.bind(block, name, value);
            return value;
        }

        let preds = self.arena.block(block).predecessors.clone();
        if preds.len() == 1 && !self.is_dead(preds[0]) {
            let value = self.read_variable_name(name, preds[0]);
            self.ctx.bind(block, name, value);
            return value;
        }

        // Bind before visiting predecessors to break cycles
        let (value, phi) = self.new_phi(name);
        self.arena.attach_phi(block, phi);
        self.ctx.bind(block, name, value);
        for pred in preds {
            if !self.is_dead(pred) {
                let incoming = self.read_variable_name(name, pred);
                self.arena.add_phi_operand(phi, incoming);
            }
        }
        value
    }

    /// Operandless φ defining a fresh temporary for `name`
    fn new_phi(&mut self, name: &str) -> (OperandId, OpId) {
        let name_operand = self.arena.new_string(name);
        let var = self.arena.new_operand(OperandKind::Variable {
            name: name_operand,
            value: None,
        });
        let result = self.arena.new_temporary(Some(var));
        let phi = self.detached(
            OpKind::Phi {
                vars: Vec::new(),
                result,
            },
            Position::zero(),
        );
        (result, phi)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════════════════

    /// Lower a function body; `captured` names are bound in the entry block
    pub(super) fn lower_func(
        &mut self,
        func: FuncId,
        params: &[Param],
        captured: &[(String, OperandId)],
        body: &[Stmt],
    ) -> Result<()> {
        let prev_func = std::mem::replace(&mut self.func, func);
        let prev_ctx = std::mem::take(&mut self.ctx);
        let prev_block = self.block;

        let entry = self.arena.func(func).entry;
        self.block = entry;

        for (name, value) in captured {
            self.ctx.bind(entry, name, *value);
        }
        for param in params {
            self.lower_param(func, entry, param)?;
        }

        self.lower_stmts(body)?;

        let end = self.block;
        if !self.is_dead(end) {
            self.emit(OpKind::Return { expr: None }, Position::zero());
        }

        for label in self.ctx.unresolved_labels() {
            warn!(
                file = %self.file_path,
                function = %self.arena.func(func).name,
                label,
                "goto to undefined label"
            );
        }

        self.ctx.complete = true;
        for (block, name, phi) in self.ctx.take_incomplete_phis() {
            let preds = self.arena.block(block).predecessors.clone();
            for pred in preds {
                if !self.is_dead(pred) {
                    let incoming = self.read_variable_name(&name, pred);
                    self.arena.add_phi_operand(phi, incoming);
                }
            }
            self.arena.attach_phi(block, phi);
        }

        self.func = prev_func;
        self.ctx = prev_ctx;
        self.block = prev_block;
        Ok(())
    }

    fn lower_param(&mut self, func: FuncId, entry: BlockId, param: &Param) -> Result<()> {
        let (default_var, default_block) = match &param.default {
            Some(default) => {
                let saved = self.block;
                let block = self.new_block();
                self.block = block;
                let value = self.lower_expr(default)?;
                self.block = saved;
                (Some(value), Some(block))
            }
            None => (None, None),
        };

        let name = self.arena.new_string(param.name.as_str());
        let var = self
            .arena
            .new_operand(OperandKind::Variable { name, value: None });
        let result = self.arena.new_temporary(Some(var));
        let op = self.detached(
            OpKind::Param {
                name,
                default_var,
                default_block,
                by_ref: param.by_ref,
                variadic: param.variadic,
                declared_type: lower_type(param.type_hint.as_ref()),
                func,
                result,
            },
            param.position,
        );
        self.ctx.bind(entry, &param.name, result);
        self.arena.append(entry, op);
        self.arena.func_mut(func).params.push(op);
        Ok(())
    }

    /// Allocate a function record for a declaration
    fn declare_func(&mut self, name: String, position: Position) -> FuncId {
        let func = self.arena.new_func(name);
        let record = self.arena.func_mut(func);
        record.position = position;
        record.file_path = Some(self.file_path.clone());
        func
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    pub(super) fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        let pos = stmt.position;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.lower_expr(expr)?;
            }
            StmtKind::Echo(exprs) => {
                for expr in exprs {
                    let value = self.lower_read(expr)?;
                    self.emit(OpKind::Echo { expr: value }, expr.position);
                }
            }
            StmtKind::InlineHtml(html) => {
                let value = self.arena.new_string(html.as_str());
                self.emit(OpKind::Echo { expr: value }, pos);
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(e) => Some(self.lower_read(e)?),
                    None => None,
                };
                self.emit(OpKind::Return { expr: value }, pos);
                self.block = self.new_dead_block();
            }
            StmtKind::Throw(expr) => {
                let value = self.lower_read(expr)?;
                self.emit(OpKind::Throw { expr: value }, pos);
                self.block = self.new_dead_block();
            }
            StmtKind::If {
                cond,
                then_branch,
                elseifs,
                else_branch,
            } => {
                let end = self.new_block();
                self.lower_if(cond, then_branch, elseifs, else_branch.as_deref(), end, pos)?;
                self.block = end;
            }
            StmtKind::While { cond, body } => self.lower_while(cond, body, pos)?,
            StmtKind::DoWhile { body, cond } => self.lower_do_while(body, cond, pos)?,
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.lower_for(init, cond, step, body, pos)?,
            StmtKind::Foreach {
                expr,
                key,
                value,
                by_ref,
                body,
            } => self.lower_foreach(expr, key.as_ref(), value, *by_ref, body, pos)?,
            StmtKind::Switch { cond, cases } => self.lower_switch(cond, cases, pos)?,
            StmtKind::Break(_) | StmtKind::Continue(_) => {
                return Err(self.lowering_error(format!(
                    "break/continue left after loop resolution (line {})",
                    pos.start_line
                )));
            }
            StmtKind::Goto(label) => {
                match self.ctx.label(label) {
                    Some(target) => self.jump(target, pos),
                    None => self.ctx.add_unresolved_goto(label, self.block),
                }
                self.block = self.new_dead_block();
            }
            StmtKind::Label(label) => self.lower_label(label, pos),
            StmtKind::Try {
                body,
                catches,
                finally,
            } => self.lower_try(body, catches, finally.as_deref())?,
            StmtKind::Global(vars) => {
                for var in vars {
                    let raw = self.lower_expr(var)?;
                    let value = self.write_variable(raw);
                    self.emit(OpKind::GlobalVar { var: value }, var.position);
                }
            }
            StmtKind::Static(vars) => {
                for var in vars {
                    self.lower_static_var(var)?;
                }
            }
            StmtKind::Unset(exprs) => {
                let mut reads = Vec::with_capacity(exprs.len());
                let mut writes = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    let raw = self.lower_expr(expr)?;
                    reads.push(self.read_variable(raw));
                    let named = matches!(
                        expr.kind,
                        ExprKind::Variable(_)
                            | ExprKind::PropertyFetch { .. }
                            | ExprKind::StaticPropertyFetch { .. }
                    );
                    writes.push(if named {
                        self.write_variable(raw)
                    } else {
                        self.arena.new_temporary(None)
                    });
                }
                self.emit(
                    OpKind::Unset {
                        exprs: reads,
                        results: writes,
                    },
                    pos,
                );
            }
            StmtKind::Function(decl) => self.lower_function_decl(decl, pos)?,
            StmtKind::Class(decl) => self.lower_class(decl, pos)?,
            StmtKind::ClassMethod(decl) => self.lower_method(decl, pos)?,
            StmtKind::PropertyList(list) => self.lower_properties(list)?,
            StmtKind::ClassConstList(consts) => self.lower_consts(consts, true)?,
            StmtKind::ConstList(consts) => self.lower_consts(consts, false)?,
            StmtKind::TraitUse {
                traits,
                adaptations,
            } => {
                let traits = traits
                    .iter()
                    .map(|t| self.arena.new_string(t.joined()))
                    .collect();
                self.emit(
                    OpKind::TraitUse {
                        traits,
                        adaptations: adaptations.clone(),
                    },
                    pos,
                );
            }
            StmtKind::Namespace { body, .. } => {
                if let Some(body) = body {
                    self.lower_stmts(body)?;
                }
            }
            StmtKind::Block(stmts) => self.lower_stmts(stmts)?,
            StmtKind::Use { .. } | StmtKind::Nop => {}
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Branches
    // ───────────────────────────────────────────────────────────────────────

    fn lower_if(
        &mut self,
        cond: &Expr,
        body: &[Stmt],
        elseifs: &[ElseIf],
        else_branch: Option<&[Stmt]>,
        end: BlockId,
        pos: Position,
    ) -> Result<()> {
        let cond = self.lower_read(cond)?;
        let if_block = self.new_block();
        let else_block = self.new_block();
        self.jump_if(cond, if_block, else_block, pos);
        self.process_assertion(cond, if_block, else_block);

        self.ctx.push_condition(cond);
        self.set_conditions(if_block);
        self.block = if_block;
        self.lower_stmts(body)?;
        self.jump(end, pos);
        self.ctx.pop_condition();

        let negated = self.negate(cond);
        self.ctx.push_condition(negated);
        self.set_conditions(else_block);
        self.block = else_block;
        match elseifs.split_first() {
            Some((first, rest)) => {
                self.lower_if(&first.cond, &first.body, rest, else_branch, end, first.position)?;
            }
            None => {
                if let Some(stmts) = else_branch {
                    self.lower_stmts(stmts)?;
                }
                self.jump(end, pos);
            }
        }
        self.ctx.pop_condition();
        Ok(())
    }

    /// Inject the condition's type assertions (and their negations) into the
    /// branch targets
    pub(super) fn process_assertion(&mut self, cond: OperandId, if_block: BlockId, else_block: BlockId) {
        let assertions = self.arena.operand(cond).assertions.clone();
        if assertions.is_empty() {
            return;
        }
        let saved = self.block;
        for asserted in assertions {
            for (block, negated) in [(if_block, false), (else_block, true)] {
                // Never append behind a terminator
                if self.arena.terminator(block).is_some() {
                    continue;
                }
                self.block = block;
                let read = self.read_variable(asserted.var);
                let write = self.write_variable(asserted.var);
                let mut assertion = self.read_assertion(&asserted.assertion);
                if negated {
                    assertion = assertion.negation();
                }
                self.emit(
                    OpKind::Assertion {
                        expr: read,
                        assertion,
                        result: write,
                    },
                    Position::zero(),
                );
            }
        }
        self.block = saved;
    }

    fn read_assertion(&mut self, assertion: &Assertion) -> Assertion {
        match assertion {
            Assertion::Type { value, negated } => Assertion::Type {
                value: self.read_variable(*value),
                negated: *negated,
            },
            Assertion::Composite {
                children,
                mode,
                negated,
            } => Assertion::Composite {
                children: children.iter().map(|c| self.read_assertion(c)).collect(),
                mode: *mode,
                negated: *negated,
            },
        }
    }

    fn lower_switch(&mut self, cond: &Expr, cases: &[Case], pos: Position) -> Result<()> {
        let cond = self.lower_read(cond)?;
        let end = self.new_block();
        let case_blocks: Vec<BlockId> = cases.iter().map(|_| self.new_block()).collect();
        let mut default_target = None;

        if is_jump_table(cases) {
            let switch_block = self.block;
            let mut values = Vec::new();
            let mut targets = Vec::new();
            for (case, block) in cases.iter().zip(&case_blocks) {
                self.arena.link(switch_block, *block);
                match &case.cond {
                    Some(expr) => {
                        let value = self.lower_read(expr)?;
                        values.push(value);
                        targets.push(*block);
                        let equal = self.arena.new_temporary(None);
                        self.detached(
                            OpKind::Binary {
                                op: BinaryOp::Equal,
                                left: cond,
                                right: value,
                                result: equal,
                            },
                            case.position,
                        );
                        self.arena.add_block_condition(*block, equal);
                    }
                    None => default_target = Some(*block),
                }
            }
            let default_target = default_target.unwrap_or(end);
            self.arena.link(switch_block, default_target);
            self.emit(
                OpKind::Switch {
                    cond,
                    cases: values,
                    targets,
                    default_target,
                },
                pos,
            );
            self.arena.block_mut(switch_block).conditional = true;
        } else {
            for (case, block) in cases.iter().zip(&case_blocks) {
                match &case.cond {
                    Some(expr) => {
                        let value = self.lower_read(expr)?;
                        let equal = self.emit_value(case.position, |result| OpKind::Binary {
                            op: BinaryOp::Equal,
                            left: cond,
                            right: value,
                            result,
                        });
                        let next = self.new_block();
                        self.jump_if(equal, *block, next, case.position);
                        self.arena.add_block_condition(*block, equal);
                        self.block = next;
                    }
                    None => default_target = Some(*block),
                }
            }
            self.jump(default_target.unwrap_or(end), pos);
        }

        // Bodies in source order; a live case end falls through
        let mut previous: Option<BlockId> = None;
        for (case, block) in cases.iter().zip(&case_blocks) {
            if let Some(prev) = previous {
                if !self.is_dead(prev) {
                    self.block = prev;
                    self.jump(*block, case.position);
                }
            }
            self.block = *block;
            self.lower_stmts(&case.body)?;
            previous = Some(self.block);
        }
        if let Some(prev) = previous {
            if !self.is_dead(prev) {
                self.block = prev;
                self.jump(end, pos);
            }
        }
        self.block = end;
        Ok(())
    }

    fn lower_label(&mut self, label: &str, pos: Position) {
        if self.ctx.label(label).is_some() {
            warn!(file = %self.file_path, label, "label defined twice; keeping the first");
            return;
        }
        let block = self.new_block();
        self.jump(block, pos);
        self.set_conditions(block);
        for from in self.ctx.resolve_gotos(label) {
            let jump = self.detached(OpKind::Jump { target: block }, pos);
            self.arena.append(from, jump);
            self.arena.link(from, block);
        }
        self.ctx.define_label(label, block);
        self.block = block;
    }

    /// Catch bodies are lowered into unconnected blocks
    fn lower_try(
        &mut self,
        body: &[Stmt],
        catches: &[Catch],
        finally: Option<&[Stmt]>,
    ) -> Result<()> {
        self.lower_stmts(body)?;
        let resume = self.block;
        for catch in catches {
            let block = self.new_block();
            self.block = block;
            if let Some(var) = &catch.var {
                let name = self.arena.new_string(var.as_str());
                let raw = self
                    .arena
                    .new_operand(OperandKind::Variable { name, value: None });
                self.write_variable(raw);
            }
            self.lower_stmts(&catch.body)?;
        }
        self.block = resume;
        if let Some(stmts) = finally {
            self.lower_stmts(stmts)?;
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Loops
    // ───────────────────────────────────────────────────────────────────────

    /// Header/body/end shape shared by while and for; `cond` is lowered in
    /// the header
    fn lower_loop(
        &mut self,
        cond: impl FnOnce(&mut Self) -> Result<OperandId>,
        body: &[Stmt],
        step: &[Expr],
        pos: Position,
    ) -> Result<()> {
        let header = self.new_block();
        let body_block = self.new_block();
        let end = self.new_block();

        self.jump(header, pos);
        self.block = header;
        let cond = cond(self)?;
        self.jump_if(cond, body_block, end, pos);
        self.process_assertion(cond, body_block, end);

        self.ctx.push_condition(cond);
        self.set_conditions(body_block);
        self.block = body_block;
        self.lower_stmts(body)?;
        for expr in step {
            self.lower_read(expr)?;
        }
        self.jump(header, pos);
        self.ctx.pop_condition();

        let negated = self.negate(cond);
        self.ctx.push_condition(negated);
        self.set_conditions(end);
        self.ctx.pop_condition();
        self.block = end;
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &[Stmt], pos: Position) -> Result<()> {
        self.lower_loop(|b| b.lower_read(cond), body, &[], pos)
    }

    fn lower_for(
        &mut self,
        init: &[Expr],
        cond: &[Expr],
        step: &[Expr],
        body: &[Stmt],
        pos: Position,
    ) -> Result<()> {
        for expr in init {
            self.lower_read(expr)?;
        }
        self.lower_loop(
            |b| {
                let mut last = None;
                for expr in cond {
                    last = Some(b.lower_read(expr)?);
                }
                Ok(match last {
                    Some(value) => value,
                    None => b.arena.new_operand(OperandKind::Bool(true)),
                })
            },
            body,
            step,
            pos,
        )
    }

    fn lower_do_while(&mut self, body: &[Stmt], cond: &Expr, pos: Position) -> Result<()> {
        let body_block = self.new_block();
        let end = self.new_block();

        self.jump(body_block, pos);
        self.block = body_block;
        self.lower_stmts(body)?;

        let cond = self.lower_read(cond)?;
        self.jump_if(cond, body_block, end, pos);
        self.process_assertion(cond, body_block, end);

        let negated = self.negate(cond);
        self.ctx.push_condition(negated);
        self.set_conditions(end);
        self.ctx.pop_condition();
        self.block = end;
        Ok(())
    }

    fn lower_foreach(
        &mut self,
        expr: &Expr,
        key: Option<&Expr>,
        value: &Expr,
        by_ref: bool,
        body: &[Stmt],
        pos: Position,
    ) -> Result<()> {
        let iterable = self.lower_read(expr)?;
        self.emit(OpKind::Reset { var: iterable }, pos);

        let header = self.new_block();
        let body_block = self.new_block();
        let end = self.new_block();

        self.jump(header, pos);
        self.block = header;
        let valid = self.emit_value(pos, |result| OpKind::IterValid {
            var: iterable,
            result,
        });
        self.jump_if(valid, body_block, end, pos);

        self.block = body_block;
        if let Some(key) = key {
            let current_key = self.emit_value(key.position, |result| OpKind::IterKey {
                var: iterable,
                result,
            });
            let target = self.lower_write_target(key)?;
            self.emit_value(key.position, |result| OpKind::Assign {
                var: target,
                expr: current_key,
                result,
            });
        }
        let current = self.emit_value(value.position, |result| OpKind::IterValue {
            var: iterable,
            by_ref,
            result,
        });
        match &value.kind {
            ExprKind::Array { items, .. } => self.lower_list_assign(items, current, value.position)?,
            _ => {
                let target = self.lower_write_target(value)?;
                self.emit_value(value.position, |result| {
                    if by_ref {
                        OpKind::AssignRef {
                            var: target,
                            expr: current,
                            result,
                        }
                    } else {
                        OpKind::Assign {
                            var: target,
                            expr: current,
                            result,
                        }
                    }
                });
            }
        }

        self.lower_stmts(body)?;
        self.emit(OpKind::Next { var: iterable }, pos);
        self.jump(header, pos);
        self.block = end;
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Declarations
    // ───────────────────────────────────────────────────────────────────────

    fn lower_static_var(&mut self, var: &StaticVar) -> Result<()> {
        let (default_var, default_block) = match &var.default {
            Some(default) => {
                let saved = self.block;
                let block = self.new_block();
                self.block = block;
                let value = self.lower_expr(default)?;
                self.block = saved;
                (Some(value), Some(block))
            }
            None => (None, None),
        };
        let name = self.arena.new_string(var.name.as_str());
        let bound = self.arena.new_operand(OperandKind::BoundVariable {
            name,
            value: default_var,
            by_ref: false,
            scope: VarScope::Function,
        });
        self.ctx.bind(self.block, &var.name, bound);
        self.emit(
            OpKind::StaticVar {
                var: bound,
                default_var,
                default_block,
            },
            var.position,
        );
        Ok(())
    }

    fn lower_function_decl(&mut self, decl: &FunctionDecl, pos: Position) -> Result<()> {
        let name = decl.name.joined();
        let func = self.declare_func(name.clone(), pos);
        {
            let record = self.arena.func_mut(func);
            record.return_type = lower_type(decl.return_type.as_ref());
            if decl.by_ref {
                record.flags |= func_flags::RETURNS_REF;
            }
        }
        let op = self.emit(OpKind::Function { func }, pos);
        self.arena.func_mut(func).callable_op = Some(op);
        self.lower_func(func, &decl.params, &[], &decl.body)?;
        self.script.add_function(name, func);
        Ok(())
    }

    fn lower_class(&mut self, decl: &ClassDecl, pos: Position) -> Result<()> {
        let class_name = decl.name.joined();
        let prev_class = self.class.replace(class_name.clone());

        let saved = self.block;
        let stmts = self.new_block();
        self.block = stmts;
        let lowered = self.lower_stmts(&decl.body);
        self.block = saved;
        self.class = prev_class;
        lowered?;

        let name = self.arena.new_string(class_name);
        let extends = decl
            .extends
            .as_ref()
            .map(|e| self.arena.new_string(e.joined()));
        let implements = decl
            .implements
            .iter()
            .map(|i| self.arena.new_string(i.joined()))
            .collect();
        self.emit(
            OpKind::Class {
                kind: decl.kind,
                name,
                stmts,
                flags: decl.modifiers.0,
                extends,
                implements,
            },
            pos,
        );
        Ok(())
    }

    fn lower_method(&mut self, decl: &MethodDecl, pos: Position) -> Result<()> {
        let func = self.declare_func(decl.name.clone(), pos);
        let flags = method_flags(decl.modifiers, decl.by_ref);
        {
            let record = self.arena.func_mut(func);
            record.class = self.class.clone();
            record.flags = flags;
            record.return_type = lower_type(decl.return_type.as_ref());
        }
        let op = self.emit(OpKind::ClassMethod { func, flags }, pos);
        self.arena.func_mut(func).callable_op = Some(op);
        let body = decl.body.as_deref().unwrap_or(&[]);
        self.lower_func(func, &decl.params, &[], body)?;
        let scoped = self.arena.func(func).scoped_name();
        self.script.add_function(scoped, func);
        Ok(())
    }

    fn lower_properties(&mut self, list: &PropertyList) -> Result<()> {
        let declared_type = lower_type(list.type_hint.as_ref());
        for prop in &list.props {
            let (default_var, default_block) = match &prop.default {
                Some(default) => {
                    let saved = self.block;
                    let block = self.new_block();
                    self.block = block;
                    let value = self.lower_expr(default)?;
                    self.block = saved;
                    if self.arena.operand(value).tainted {
                        let func = self.func;
                        self.arena.func_mut(func).contains_tainted = true;
                        self.arena.block_mut(block).contains_tainted = true;
                    }
                    (Some(value), Some(block))
                }
                None => (None, None),
            };
            let name = self.arena.new_string(prop.name.as_str());
            self.emit(
                OpKind::Property {
                    name,
                    flags: list.modifiers.0,
                    declared_type: declared_type.clone(),
                    default_var,
                    default_block,
                },
                prop.position,
            );
        }
        Ok(())
    }

    fn lower_consts(&mut self, consts: &[ConstDecl], in_class: bool) -> Result<()> {
        for decl in consts {
            let saved = self.block;
            let block = self.new_block();
            self.block = block;
            let value = self.lower_expr(&decl.value)?;
            self.block = saved;

            let const_name = match (&self.class, in_class) {
                (Some(class), true) => format!("{}::{}", class, decl.name.joined()),
                _ => decl.name.joined(),
            };
            let name = self.arena.new_string(const_name.as_str());
            self.emit(
                OpKind::Const {
                    name,
                    value,
                    value_block: Some(block),
                },
                decl.position,
            );
            if self.func == self.script.main {
                self.consts.insert(const_name, value);
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Synthesized property keys (`<propfetch>a->p`, `<staticpropfetch>A::p`)
pub(super) fn is_field_key(name: &str) -> bool {
    name.starts_with("<propfetch>") || name.starts_with("<staticpropfetch>")
}

/// Every case label is a scalar literal
fn is_jump_table(cases: &[Case]) -> bool {
    cases.iter().all(|case| match &case.cond {
        None => true,
        Some(expr) => matches!(
            expr.kind,
            ExprKind::Literal(Literal::Int(_) | Literal::Float(_) | Literal::String(_) | Literal::Bool(_))
        ),
    })
}

fn method_flags(modifiers: Modifiers, by_ref: bool) -> u32 {
    let mut flags = 0;
    for (bit, flag) in [
        (Modifiers::PUBLIC, func_flags::PUBLIC),
        (Modifiers::PROTECTED, func_flags::PROTECTED),
        (Modifiers::PRIVATE, func_flags::PRIVATE),
        (Modifiers::STATIC, func_flags::STATIC),
        (Modifiers::ABSTRACT, func_flags::ABSTRACT),
        (Modifiers::FINAL, func_flags::FINAL),
    ] {
        if modifiers.has(bit) {
            flags |= flag;
        }
    }
    if flags & (func_flags::PROTECTED | func_flags::PRIVATE) == 0 {
        flags |= func_flags::PUBLIC;
    }
    if by_ref {
        flags |= func_flags::RETURNS_REF;
    }
    flags
}

pub(super) fn lower_type(hint: Option<&TypeHint>) -> OpType {
    match hint {
        None => OpType::Mixed,
        Some(TypeHint::Union(types)) => {
            OpType::Union(types.iter().map(|t| lower_type(Some(t))).collect())
        }
        Some(TypeHint::Named { name, nullable }) => {
            let lower = name.joined().to_ascii_lowercase();
            match lower.as_str() {
                "mixed" => OpType::Mixed,
                "void" => OpType::Void,
                _ if name.parts.len() == 1 && BUILTIN_TYPES.contains(&lower.as_str()) => {
                    OpType::Literal {
                        name: lower,
                        nullable: *nullable,
                    }
                }
                _ => OpType::Reference {
                    declaration: name.joined(),
                    nullable: *nullable,
                },
            }
        }
    }
}
