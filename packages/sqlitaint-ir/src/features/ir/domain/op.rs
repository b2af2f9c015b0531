//! Op model
//!
//! One sum type for every IR operation. Operand and sub-block fields are
//! reached through a single visitor (`for_each_operand_mut`,
//! `for_each_sub_block_mut`) so rewriting never needs per-variant code.

use std::sync::Arc;

use super::assertion::Assertion;
use super::ids::{BlockId, FuncId, OperandId};
use super::types::OpType;
use crate::shared::models::Position;

pub use crate::features::parsing::ast::{BinaryOp, CastKind, ClassKind, IncludeKind, UnaryOp};

/// Named operand field of an op; `index` is set for list fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSlot {
    pub name: &'static str,
    pub index: Option<usize>,
}

impl OperandSlot {
    pub fn scalar(name: &'static str) -> Self {
        Self { name, index: None }
    }

    pub fn list(name: &'static str, index: usize) -> Self {
        Self {
            name,
            index: Some(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    // ───────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────
    Assign {
        var: OperandId,
        expr: OperandId,
        result: OperandId,
    },
    AssignRef {
        var: OperandId,
        expr: OperandId,
        result: OperandId,
    },
    Binary {
        op: BinaryOp,
        left: OperandId,
        right: OperandId,
        result: OperandId,
    },
    Unary {
        op: UnaryOp,
        expr: OperandId,
        result: OperandId,
    },
    Cast {
        kind: CastKind,
        expr: OperandId,
        result: OperandId,
    },
    /// `keys[i]` is a Null operand when the element had no explicit key
    Array {
        keys: Vec<OperandId>,
        values: Vec<OperandId>,
        by_ref: Vec<bool>,
        result: OperandId,
    },
    ArrayDimFetch {
        var: OperandId,
        dim: Option<OperandId>,
        result: OperandId,
    },
    ConcatList {
        list: Vec<OperandId>,
        result: OperandId,
    },
    ConstFetch {
        name: OperandId,
        result: OperandId,
    },
    ClassConstFetch {
        class: OperandId,
        name: OperandId,
        result: OperandId,
    },
    PropertyFetch {
        var: OperandId,
        name: OperandId,
        result: OperandId,
    },
    StaticPropertyFetch {
        class: OperandId,
        name: OperandId,
        result: OperandId,
    },
    FunctionCall {
        name: OperandId,
        args: Vec<OperandId>,
        result: OperandId,
    },
    MethodCall {
        var: OperandId,
        name: OperandId,
        args: Vec<OperandId>,
        nullsafe: bool,
        result: OperandId,
    },
    StaticCall {
        class: OperandId,
        name: OperandId,
        args: Vec<OperandId>,
        result: OperandId,
    },
    New {
        class: OperandId,
        args: Vec<OperandId>,
        result: OperandId,
    },
    Closure {
        func: FuncId,
        use_vars: Vec<OperandId>,
        result: OperandId,
    },
    Include {
        kind: IncludeKind,
        expr: OperandId,
        result: OperandId,
    },
    InstanceOf {
        expr: OperandId,
        class: OperandId,
        result: OperandId,
    },
    Isset {
        vars: Vec<OperandId>,
        result: OperandId,
    },
    Param {
        name: OperandId,
        default_var: Option<OperandId>,
        default_block: Option<BlockId>,
        by_ref: bool,
        variadic: bool,
        declared_type: OpType,
        func: FuncId,
        result: OperandId,
    },
    Phi {
        vars: Vec<OperandId>,
        result: OperandId,
    },
    Assertion {
        expr: OperandId,
        assertion: Assertion,
        result: OperandId,
    },
    Yield {
        key: Option<OperandId>,
        value: Option<OperandId>,
        result: OperandId,
    },
    YieldFrom {
        expr: OperandId,
        result: OperandId,
    },

    // ───────────────────────────────────────────────────────────────────────
    // Iterator protocol
    // ───────────────────────────────────────────────────────────────────────
    Reset {
        var: OperandId,
    },
    IterValid {
        var: OperandId,
        result: OperandId,
    },
    IterKey {
        var: OperandId,
        result: OperandId,
    },
    IterValue {
        var: OperandId,
        by_ref: bool,
        result: OperandId,
    },
    Next {
        var: OperandId,
    },

    // ───────────────────────────────────────────────────────────────────────
    // Statements
    // ───────────────────────────────────────────────────────────────────────
    Echo {
        expr: OperandId,
    },
    /// `results[i]` is the fresh (undefined) value bound to `exprs[i]`'s name
    Unset {
        exprs: Vec<OperandId>,
        results: Vec<OperandId>,
    },
    GlobalVar {
        var: OperandId,
    },
    StaticVar {
        var: OperandId,
        default_var: Option<OperandId>,
        default_block: Option<BlockId>,
    },
    Const {
        name: OperandId,
        value: OperandId,
        value_block: Option<BlockId>,
    },
    Class {
        kind: ClassKind,
        name: OperandId,
        stmts: BlockId,
        flags: u32,
        extends: Option<OperandId>,
        implements: Vec<OperandId>,
    },
    ClassMethod {
        func: FuncId,
        flags: u32,
    },
    Function {
        func: FuncId,
    },
    Property {
        name: OperandId,
        flags: u32,
        declared_type: OpType,
        default_var: Option<OperandId>,
        default_block: Option<BlockId>,
    },
    TraitUse {
        traits: Vec<OperandId>,
        adaptations: Vec<String>,
    },

    // ───────────────────────────────────────────────────────────────────────
    // Terminators
    // ───────────────────────────────────────────────────────────────────────
    Jump {
        target: BlockId,
    },
    JumpIf {
        cond: OperandId,
        if_target: BlockId,
        else_target: BlockId,
    },
    /// Jump table: `cases[i]` selects `targets[i]`
    Switch {
        cond: OperandId,
        cases: Vec<OperandId>,
        targets: Vec<BlockId>,
        default_target: BlockId,
    },
    Return {
        expr: Option<OperandId>,
    },
    Exit {
        expr: Option<OperandId>,
    },
    Throw {
        expr: OperandId,
    },
}

/// Expands `$body` once per operand field; `$s` / `$o` / `$l` are macros
/// taking `(name, binding)` for scalar, optional and list fields.
macro_rules! visit_operand_fields {
    ($kind:expr, $s:ident, $o:ident, $l:ident) => {
        match $kind {
            OpKind::Assign { var, expr, result } | OpKind::AssignRef { var, expr, result } => {
                $s!("var", var);
                $s!("expr", expr);
                $s!("result", result);
            }
            OpKind::Binary {
                left,
                right,
                result,
                ..
            } => {
                $s!("left", left);
                $s!("right", right);
                $s!("result", result);
            }
            OpKind::Unary { expr, result, .. }
            | OpKind::Cast { expr, result, .. }
            | OpKind::Include { expr, result, .. }
            | OpKind::YieldFrom { expr, result } => {
                $s!("expr", expr);
                $s!("result", result);
            }
            OpKind::Array {
                keys,
                values,
                result,
                ..
            } => {
                $l!("keys", keys);
                $l!("values", values);
                $s!("result", result);
            }
            OpKind::ArrayDimFetch { var, dim, result } => {
                $s!("var", var);
                $o!("dim", dim);
                $s!("result", result);
            }
            OpKind::ConcatList { list, result } => {
                $l!("list", list);
                $s!("result", result);
            }
            OpKind::ConstFetch { name, result } => {
                $s!("name", name);
                $s!("result", result);
            }
            OpKind::ClassConstFetch {
                class,
                name,
                result,
            }
            | OpKind::StaticPropertyFetch {
                class,
                name,
                result,
            } => {
                $s!("class", class);
                $s!("name", name);
                $s!("result", result);
            }
            OpKind::PropertyFetch { var, name, result } => {
                $s!("var", var);
                $s!("name", name);
                $s!("result", result);
            }
            OpKind::FunctionCall { name, args, result } => {
                $s!("name", name);
                $l!("args", args);
                $s!("result", result);
            }
            OpKind::MethodCall {
                var,
                name,
                args,
                result,
                ..
            } => {
                $s!("var", var);
                $s!("name", name);
                $l!("args", args);
                $s!("result", result);
            }
            OpKind::StaticCall {
                class,
                name,
                args,
                result,
            } => {
                $s!("class", class);
                $s!("name", name);
                $l!("args", args);
                $s!("result", result);
            }
            OpKind::New {
                class,
                args,
                result,
            } => {
                $s!("class", class);
                $l!("args", args);
                $s!("result", result);
            }
            OpKind::Closure {
                use_vars, result, ..
            } => {
                $l!("use_vars", use_vars);
                $s!("result", result);
            }
            OpKind::InstanceOf {
                expr,
                class,
                result,
            } => {
                $s!("expr", expr);
                $s!("class", class);
                $s!("result", result);
            }
            OpKind::Isset { vars, result } | OpKind::Phi { vars, result } => {
                $l!("vars", vars);
                $s!("result", result);
            }
            OpKind::Param {
                name,
                default_var,
                result,
                ..
            } => {
                $s!("name", name);
                $o!("default_var", default_var);
                $s!("result", result);
            }
            OpKind::Assertion { expr, result, .. } => {
                $s!("expr", expr);
                $s!("result", result);
            }
            OpKind::Yield { key, value, result } => {
                $o!("key", key);
                $o!("value", value);
                $s!("result", result);
            }
            OpKind::Reset { var } | OpKind::Next { var } | OpKind::GlobalVar { var } => {
                $s!("var", var);
            }
            OpKind::IterValid { var, result }
            | OpKind::IterKey { var, result }
            | OpKind::IterValue { var, result, .. } => {
                $s!("var", var);
                $s!("result", result);
            }
            OpKind::Echo { expr } | OpKind::Throw { expr } => {
                $s!("expr", expr);
            }
            OpKind::Unset { exprs, results } => {
                $l!("exprs", exprs);
                $l!("result", results);
            }
            OpKind::StaticVar {
                var, default_var, ..
            } => {
                $s!("var", var);
                $o!("default_var", default_var);
            }
            OpKind::Const { name, value, .. } => {
                $s!("name", name);
                $s!("value", value);
            }
            OpKind::Class {
                name,
                extends,
                implements,
                ..
            } => {
                $s!("name", name);
                $o!("extends", extends);
                $l!("implements", implements);
            }
            OpKind::Property {
                name, default_var, ..
            } => {
                $s!("name", name);
                $o!("default_var", default_var);
            }
            OpKind::TraitUse { traits, .. } => {
                $l!("traits", traits);
            }
            OpKind::JumpIf { cond, .. } => {
                $s!("cond", cond);
            }
            OpKind::Switch { cond, cases, .. } => {
                $s!("cond", cond);
                $l!("cases", cases);
            }
            OpKind::Return { expr } | OpKind::Exit { expr } => {
                $o!("expr", expr);
            }
            OpKind::ClassMethod { .. } | OpKind::Function { .. } | OpKind::Jump { .. } => {}
        }
    };
}

impl OpKind {
    /// Visit every operand field mutably
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(OperandSlot, &mut OperandId)) {
        macro_rules! scalar {
            ($name:literal, $v:expr) => {
                f(OperandSlot::scalar($name), $v)
            };
        }
        macro_rules! optional {
            ($name:literal, $v:expr) => {
                if let Some(id) = $v.as_mut() {
                    f(OperandSlot::scalar($name), id)
                }
            };
        }
        macro_rules! list {
            ($name:literal, $v:expr) => {
                for (i, id) in $v.iter_mut().enumerate() {
                    f(OperandSlot::list($name, i), id)
                }
            };
        }
        visit_operand_fields!(self, scalar, optional, list);
    }

    /// Visit every operand field
    pub fn for_each_operand(&self, mut f: impl FnMut(OperandSlot, OperandId)) {
        macro_rules! scalar {
            ($name:literal, $v:expr) => {
                f(OperandSlot::scalar($name), *$v)
            };
        }
        macro_rules! optional {
            ($name:literal, $v:expr) => {
                if let Some(id) = $v {
                    f(OperandSlot::scalar($name), *id)
                }
            };
        }
        macro_rules! list {
            ($name:literal, $v:expr) => {
                for (i, id) in $v.iter().enumerate() {
                    f(OperandSlot::list($name, i), *id)
                }
            };
        }
        visit_operand_fields!(self, scalar, optional, list);
    }

    /// All operand fields in declaration order
    pub fn operands(&self) -> Vec<(OperandSlot, OperandId)> {
        let mut out = Vec::new();
        self.for_each_operand(|slot, id| out.push((slot, id)));
        out
    }

    /// Operands read by this op (everything not at a written position)
    pub fn read_operands(&self) -> Vec<OperandId> {
        let mut out = Vec::new();
        self.for_each_operand(|slot, id| {
            if !self.is_write_slot(slot) {
                out.push(id);
            }
        });
        out
    }

    /// Scalar operand field by name
    pub fn operand(&self, name: &str) -> Option<OperandId> {
        let mut found = None;
        self.for_each_operand(|slot, id| {
            if found.is_none() && slot.index.is_none() && slot.name == name {
                found = Some(id);
            }
        });
        found
    }

    /// List operand field by name
    pub fn operand_list(&self, name: &str) -> Vec<OperandId> {
        let mut out = Vec::new();
        self.for_each_operand(|slot, id| {
            if slot.index.is_some() && slot.name == name {
                out.push(id);
            }
        });
        out
    }

    pub fn result(&self) -> Option<OperandId> {
        self.operand("result")
    }

    /// `result` always; `var` for assignments and static vars
    pub fn is_write_slot(&self, slot: OperandSlot) -> bool {
        match slot.name {
            "result" => true,
            "var" => matches!(
                self,
                OpKind::Assign { .. } | OpKind::AssignRef { .. } | OpKind::StaticVar { .. }
            ),
            _ => false,
        }
    }

    /// Visit every sub-block field mutably
    pub fn for_each_sub_block_mut(&mut self, mut f: impl FnMut(&'static str, &mut BlockId)) {
        match self {
            OpKind::Jump { target } => f("target", target),
            OpKind::JumpIf {
                if_target,
                else_target,
                ..
            } => {
                f("if", if_target);
                f("else", else_target);
            }
            OpKind::Switch {
                targets,
                default_target,
                ..
            } => {
                for t in targets.iter_mut() {
                    f("targets", t);
                }
                f("default", default_target);
            }
            OpKind::Param { default_block, .. } | OpKind::StaticVar { default_block, .. } => {
                if let Some(b) = default_block.as_mut() {
                    f("default_block", b);
                }
            }
            OpKind::Property { default_block, .. } => {
                if let Some(b) = default_block.as_mut() {
                    f("default_block", b);
                }
            }
            OpKind::Const { value_block, .. } => {
                if let Some(b) = value_block.as_mut() {
                    f("value_block", b);
                }
            }
            OpKind::Class { stmts, .. } => f("stmts", stmts),
            _ => {}
        }
    }

    /// All sub-blocks by field name
    pub fn sub_blocks(&self) -> Vec<(&'static str, BlockId)> {
        let mut out = Vec::new();
        let mut copy = self.clone();
        copy.for_each_sub_block_mut(|name, b| out.push((name, *b)));
        out
    }

    /// Control-flow successors (terminators only)
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            OpKind::Jump { target } => vec![*target],
            OpKind::JumpIf {
                if_target,
                else_target,
                ..
            } => vec![*if_target, *else_target],
            OpKind::Switch {
                targets,
                default_target,
                ..
            } => {
                let mut out = targets.clone();
                out.push(*default_target);
                out
            }
            _ => Vec::new(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            OpKind::Jump { .. }
                | OpKind::JumpIf { .. }
                | OpKind::Switch { .. }
                | OpKind::Return { .. }
                | OpKind::Exit { .. }
                | OpKind::Throw { .. }
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(
            self,
            OpKind::FunctionCall { .. } | OpKind::MethodCall { .. } | OpKind::StaticCall { .. }
        )
    }

    /// Short variant name used by the printer and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Assign { .. } => "Assign",
            OpKind::AssignRef { .. } => "AssignRef",
            OpKind::Binary { .. } => "Binary",
            OpKind::Unary { .. } => "Unary",
            OpKind::Cast { .. } => "Cast",
            OpKind::Array { .. } => "Array",
            OpKind::ArrayDimFetch { .. } => "ArrayDimFetch",
            OpKind::ConcatList { .. } => "ConcatList",
            OpKind::ConstFetch { .. } => "ConstFetch",
            OpKind::ClassConstFetch { .. } => "ClassConstFetch",
            OpKind::PropertyFetch { .. } => "PropertyFetch",
            OpKind::StaticPropertyFetch { .. } => "StaticPropertyFetch",
            OpKind::FunctionCall { .. } => "FunctionCall",
            OpKind::MethodCall { .. } => "MethodCall",
            OpKind::StaticCall { .. } => "StaticCall",
            OpKind::New { .. } => "New",
            OpKind::Closure { .. } => "Closure",
            OpKind::Include { .. } => "Include",
            OpKind::InstanceOf { .. } => "InstanceOf",
            OpKind::Isset { .. } => "Isset",
            OpKind::Param { .. } => "Param",
            OpKind::Phi { .. } => "Phi",
            OpKind::Assertion { .. } => "Assertion",
            OpKind::Yield { .. } => "Yield",
            OpKind::YieldFrom { .. } => "YieldFrom",
            OpKind::Reset { .. } => "Reset",
            OpKind::IterValid { .. } => "IterValid",
            OpKind::IterKey { .. } => "IterKey",
            OpKind::IterValue { .. } => "IterValue",
            OpKind::Next { .. } => "Next",
            OpKind::Echo { .. } => "Echo",
            OpKind::Unset { .. } => "Unset",
            OpKind::GlobalVar { .. } => "GlobalVar",
            OpKind::StaticVar { .. } => "StaticVar",
            OpKind::Const { .. } => "Const",
            OpKind::Class { .. } => "Class",
            OpKind::ClassMethod { .. } => "ClassMethod",
            OpKind::Function { .. } => "Function",
            OpKind::Property { .. } => "Property",
            OpKind::TraitUse { .. } => "TraitUse",
            OpKind::Jump { .. } => "Jump",
            OpKind::JumpIf { .. } => "JumpIf",
            OpKind::Switch { .. } => "Switch",
            OpKind::Return { .. } => "Return",
            OpKind::Exit { .. } => "Exit",
            OpKind::Throw { .. } => "Throw",
        }
    }
}

/// Op plus its source location and owning block
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub kind: OpKind,
    pub position: Position,
    pub file_path: Option<Arc<str>>,
    pub block: Option<BlockId>,
}

impl Op {
    pub fn new(kind: OpKind, position: Position) -> Self {
        Self {
            kind,
            position,
            file_path: None,
            block: None,
        }
    }
}
