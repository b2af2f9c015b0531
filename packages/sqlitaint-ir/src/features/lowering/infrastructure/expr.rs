//! Expression lowering
//!
//! `lower_expr` returns the raw operand of an expression: a literal, an
//! unread variable reference, or the result of the op it appended. Callers
//! that need the current SSA value go through `lower_read`.

use std::path::Path;

use super::builder::{lower_type, IrBuilder};
use crate::errors::Result;
use crate::features::ir::domain::op::{BinaryOp, CastKind, UnaryOp};
use crate::features::ir::domain::{
    func_flags, Assertion, OpKind, OperandId, OperandKind, VarScope,
};
use crate::features::parsing::ast::{
    Arg, ArrayItem, ClosureDecl, Expr, ExprKind, Literal, VarName,
};
use crate::shared::models::Position;
use crate::shared::normalize_path;

/// `is_*` predicates and the type they assert
const TYPE_PREDICATES: &[(&str, &str)] = &[
    ("is_array", "array"),
    ("is_bool", "bool"),
    ("is_callable", "callable"),
    ("is_double", "float"),
    ("is_float", "float"),
    ("is_int", "int"),
    ("is_integer", "int"),
    ("is_long", "int"),
    ("is_null", "null"),
    ("is_numeric", "numeric"),
    ("is_object", "object"),
    ("is_real", "float"),
    ("is_resource", "resource"),
    ("is_string", "string"),
];

/// `gettype()` spelling → assertion type name
fn gettype_name(name: &str) -> &str {
    match name {
        "integer" => "int",
        "double" => "float",
        "boolean" => "bool",
        "NULL" => "null",
        other => other,
    }
}

fn settype_cast(name: &str) -> Option<CastKind> {
    Some(match name.to_ascii_lowercase().as_str() {
        "int" | "integer" => CastKind::Int,
        "float" | "double" => CastKind::Double,
        "bool" | "boolean" => CastKind::Bool,
        "string" => CastKind::String,
        "array" => CastKind::Array,
        "object" => CastKind::Object,
        "null" => CastKind::Unset,
        _ => return None,
    })
}

/// Compile-time string value of literals and literal concatenations
fn static_string(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Literal(Literal::String(s)) => Some(s.clone()),
        ExprKind::Binary {
            op: BinaryOp::Concat,
            left,
            right,
        } => Some(static_string(left)? + &static_string(right)?),
        ExprKind::Interpolated(parts) => parts.iter().map(static_string).collect(),
        _ => None,
    }
}

impl<'a> IrBuilder<'a> {
    /// Lower and read the current SSA value
    pub(super) fn lower_read(&mut self, expr: &Expr) -> Result<OperandId> {
        let raw = self.lower_expr(expr)?;
        Ok(self.read_variable(raw))
    }

    /// Assignment target; `$a[k]` and `$a->p[k]` write their root
    pub(super) fn lower_write_target(&mut self, expr: &Expr) -> Result<OperandId> {
        match &expr.kind {
            ExprKind::ArrayDimFetch { var, dim } => {
                if let Some(dim) = dim {
                    self.lower_read(dim)?;
                }
                self.lower_write_target(var)
            }
            _ => {
                let raw = self.lower_expr(expr)?;
                Ok(self.write_variable(raw))
            }
        }
    }

    fn literal(&mut self, literal: &Literal) -> OperandId {
        let kind = match literal {
            Literal::Null => OperandKind::Null,
            Literal::Bool(b) => OperandKind::Bool(*b),
            Literal::Int(i) => OperandKind::Number(*i as f64),
            Literal::Float(f) => OperandKind::Number(*f),
            Literal::String(s) => OperandKind::String(s.clone()),
        };
        self.arena.new_operand(kind)
    }

    /// Class or member slot: static names become strings, anything else is read
    fn lower_name_slot(&mut self, expr: &Expr) -> Result<OperandId> {
        match &expr.kind {
            ExprKind::Name(name) => Ok(self.arena.new_string(name.joined())),
            ExprKind::Identifier(ident) => Ok(self.arena.new_string(ident.as_str())),
            _ => self.lower_read(expr),
        }
    }

    fn lower_args(&mut self, args: &[Arg]) -> Result<Vec<OperandId>> {
        args.iter().map(|arg| self.lower_read(&arg.value)).collect()
    }

    /// Emit a call op and register it with the function
    fn emit_call(&mut self, position: Position, make: impl FnOnce(OperandId) -> OpKind) -> OperandId {
        let result = self.arena.new_temporary(None);
        let op = self.emit(make(result), position);
        let func = self.func;
        self.arena.func_mut(func).calls.push(op);
        result
    }

    /// Result temporary standing for a named field
    fn field_result(&mut self, key: Option<String>) -> OperandId {
        match key {
            Some(key) => {
                let name = self.arena.new_string(key);
                let var = self
                    .arena
                    .new_operand(OperandKind::Variable { name, value: None });
                self.arena.new_temporary(Some(var))
            }
            None => self.arena.new_temporary(None),
        }
    }

    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Result<OperandId> {
        let pos = expr.position;
        match &expr.kind {
            ExprKind::Variable(VarName::Named(name)) => Ok(self.lower_variable(name)),
            ExprKind::Variable(VarName::Dynamic(inner)) => {
                let name = self.lower_read(inner)?;
                Ok(self
                    .arena
                    .new_operand(OperandKind::Variable { name, value: None }))
            }
            ExprKind::Literal(literal) => Ok(self.literal(literal)),
            ExprKind::Interpolated(parts) => {
                let list = parts
                    .iter()
                    .map(|p| self.lower_read(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.emit_value(pos, |result| OpKind::ConcatList { list, result }))
            }
            ExprKind::ConstFetch(name) => {
                let joined = name.joined();
                match joined.to_ascii_lowercase().as_str() {
                    "true" => return Ok(self.arena.new_operand(OperandKind::Bool(true))),
                    "false" => return Ok(self.arena.new_operand(OperandKind::Bool(false))),
                    "null" => return Ok(self.arena.new_operand(OperandKind::Null)),
                    _ => {}
                }
                let name_operand = self.arena.new_string(joined.as_str());
                let result = self.emit_value(pos, |result| OpKind::ConstFetch {
                    name: name_operand,
                    result,
                });
                let known = self
                    .consts
                    .get(&joined)
                    .or_else(|| self.consts.get(name.leaf()))
                    .copied();
                Ok(known.unwrap_or(result))
            }
            ExprKind::MagicConst(_) => Ok(self.arena.new_string("")),
            ExprKind::Name(name) => Ok(self.arena.new_string(name.joined())),
            ExprKind::Identifier(ident) => Ok(self.arena.new_string(ident.as_str())),
            ExprKind::Array { items, .. } => self.lower_array(items, pos),
            ExprKind::ArrayDimFetch { var, dim } => {
                let var = self.lower_read(var)?;
                let dim = match dim {
                    Some(d) => Some(self.lower_read(d)?),
                    None => None,
                };
                Ok(self.emit_value(pos, |result| OpKind::ArrayDimFetch { var, dim, result }))
            }
            ExprKind::PropertyFetch { var, name, .. } => {
                let raw = self.lower_expr(var)?;
                let base = self.arena.name_of(raw).map(|n| {
                    n.strip_prefix("<propfetch>").unwrap_or(n).to_string()
                });
                let object = self.read_variable(raw);
                let name = self.lower_name_slot(name)?;
                let key = match (base, self.arena.string_of(name)) {
                    (Some(base), Some(prop)) => Some(format!("<propfetch>{}->{}", base, prop)),
                    _ => None,
                };
                let result = self.field_result(key);
                self.emit(
                    OpKind::PropertyFetch {
                        var: object,
                        name,
                        result,
                    },
                    pos,
                );
                Ok(result)
            }
            ExprKind::StaticPropertyFetch { class, name } => {
                let class = self.lower_name_slot(class)?;
                let name = self.lower_name_slot(name)?;
                let key = match (self.arena.string_of(class), self.arena.string_of(name)) {
                    (Some(c), Some(p)) => Some(format!("<staticpropfetch>{}::{}", c, p)),
                    _ => None,
                };
                let result = self.field_result(key);
                self.emit(
                    OpKind::StaticPropertyFetch {
                        class,
                        name,
                        result,
                    },
                    pos,
                );
                Ok(result)
            }
            ExprKind::ClassConstFetch { class, name } => {
                let class = self.lower_name_slot(class)?;
                let class_name = self.arena.string_of(class).map(str::to_string);
                if name.eq_ignore_ascii_case("class") {
                    if let Some(class_name) = class_name {
                        return Ok(self.arena.new_string(class_name));
                    }
                }
                let name_operand = self.arena.new_string(name.as_str());
                let result = self.emit_value(pos, |result| OpKind::ClassConstFetch {
                    class,
                    name: name_operand,
                    result,
                });
                let known = class_name
                    .and_then(|c| self.consts.get(&format!("{}::{}", c, name)).copied());
                Ok(known.unwrap_or(result))
            }
            ExprKind::Assign { var, expr: rhs } => self.lower_assign(var, rhs, pos),
            ExprKind::AssignRef { var, expr: rhs } => {
                let value = self.lower_read(rhs)?;
                let target = self.lower_write_target(var)?;
                Ok(self.emit_value(pos, |result| OpKind::AssignRef {
                    var: target,
                    expr: value,
                    result,
                }))
            }
            ExprKind::AssignOp { op, var, expr: rhs } => {
                let left = self.lower_read(var)?;
                let right = self.lower_read(rhs)?;
                let op = *op;
                let combined = self.emit_value(pos, |result| OpKind::Binary {
                    op,
                    left,
                    right,
                    result,
                });
                let target = self.lower_write_target(var)?;
                self.emit_value(pos, |result| OpKind::Assign {
                    var: target,
                    expr: combined,
                    result,
                });
                Ok(combined)
            }
            ExprKind::IncDec {
                increment,
                prefix,
                var,
            } => {
                let current = self.lower_read(var)?;
                let one = self.arena.new_operand(OperandKind::Number(1.0));
                let op = if *increment {
                    BinaryOp::Plus
                } else {
                    BinaryOp::Minus
                };
                let updated = self.emit_value(pos, |result| OpKind::Binary {
                    op,
                    left: current,
                    right: one,
                    result,
                });
                let target = self.lower_write_target(var)?;
                self.emit_value(pos, |result| OpKind::Assign {
                    var: target,
                    expr: updated,
                    result,
                });
                Ok(if *prefix { updated } else { current })
            }
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, pos),
            ExprKind::Unary { op, expr: inner } => {
                let value = self.lower_read(inner)?;
                let op = *op;
                let result = self.emit_value(pos, |result| OpKind::Unary {
                    op,
                    expr: value,
                    result,
                });
                if op == UnaryOp::BooleanNot {
                    for asserted in self.arena.operand(value).assertions.clone() {
                        self.arena
                            .add_assertion(result, asserted.var, asserted.assertion.negation());
                    }
                }
                Ok(result)
            }
            ExprKind::Cast { kind, expr: inner } => {
                let value = self.lower_read(inner)?;
                let kind = *kind;
                Ok(self.emit_value(pos, |result| OpKind::Cast {
                    kind,
                    expr: value,
                    result,
                }))
            }
            ExprKind::Call { name, args } => self.lower_call(name, args, pos),
            ExprKind::MethodCall {
                var,
                name,
                args,
                nullsafe,
            } => {
                let object = self.lower_read(var)?;
                let name = self.lower_name_slot(name)?;
                let args = self.lower_args(args)?;
                let nullsafe = *nullsafe;
                Ok(self.emit_call(pos, |result| OpKind::MethodCall {
                    var: object,
                    name,
                    args,
                    nullsafe,
                    result,
                }))
            }
            ExprKind::StaticCall { class, name, args } => {
                let class = self.lower_name_slot(class)?;
                let name = self.lower_name_slot(name)?;
                let args = self.lower_args(args)?;
                Ok(self.emit_call(pos, |result| OpKind::StaticCall {
                    class,
                    name,
                    args,
                    result,
                }))
            }
            ExprKind::New { class, args } => {
                let class = self.lower_name_slot(class)?;
                let args = self.lower_args(args)?;
                let result = match self.arena.string_of(class).map(str::to_string) {
                    Some(class_name) => {
                        let object = self.arena.new_operand(OperandKind::Object { class_name });
                        self.arena.new_temporary(Some(object))
                    }
                    None => self.arena.new_temporary(None),
                };
                self.emit(OpKind::New { class, args, result }, pos);
                Ok(result)
            }
            ExprKind::Closure(decl) => self.lower_closure(decl, pos),
            ExprKind::Include { kind, expr: inner } => {
                let value = self.lower_read(inner)?;
                if let Some(target) = static_string(inner) {
                    let resolved = self.resolve_include(&target);
                    self.script.add_include(resolved);
                }
                let kind = *kind;
                Ok(self.emit_value(pos, |result| OpKind::Include {
                    kind,
                    expr: value,
                    result,
                }))
            }
            ExprKind::InstanceOf { expr: inner, class } => {
                let value = self.lower_read(inner)?;
                let class = self.lower_name_slot(class)?;
                let result = self.emit_value(pos, |result| OpKind::InstanceOf {
                    expr: value,
                    class,
                    result,
                });
                if self.arena.name_of(value).is_some() {
                    self.arena
                        .add_assertion(result, value, Assertion::type_of(class));
                }
                Ok(result)
            }
            ExprKind::Isset(vars) => {
                let vars = vars
                    .iter()
                    .map(|v| self.lower_read(v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.emit_value(pos, |result| OpKind::Isset { vars, result }))
            }
            ExprKind::Exit(inner) => {
                let value = match inner {
                    Some(e) => Some(self.lower_read(e)?),
                    None => None,
                };
                self.emit(OpKind::Exit { expr: value }, pos);
                self.block = self.new_dead_block();
                Ok(self.arena.new_operand(OperandKind::Null))
            }
            ExprKind::ErrorSuppress(inner) => self.lower_expr(inner),
            ExprKind::Ternary {
                cond,
                if_true,
                if_false,
            } => self.lower_ternary(cond, if_true.as_deref(), if_false, pos),
            ExprKind::Yield { key, value } => {
                let key = match key {
                    Some(k) => Some(self.lower_read(k)?),
                    None => None,
                };
                let value = match value {
                    Some(v) => Some(self.lower_read(v)?),
                    None => None,
                };
                Ok(self.emit_value(pos, |result| OpKind::Yield { key, value, result }))
            }
            ExprKind::YieldFrom(inner) => {
                let value = self.lower_read(inner)?;
                Ok(self.emit_value(pos, |result| OpKind::YieldFrom {
                    expr: value,
                    result,
                }))
            }
            ExprKind::ShellExec(parts) => {
                let list = parts
                    .iter()
                    .map(|p| self.lower_read(p))
                    .collect::<Result<Vec<_>>>()?;
                let command = self.emit_value(pos, |result| OpKind::ConcatList { list, result });
                let name = self.arena.new_string("shell_exec");
                Ok(self.emit_call(pos, |result| OpKind::FunctionCall {
                    name,
                    args: vec![command],
                    result,
                }))
            }
        }
    }

    fn lower_variable(&mut self, name: &str) -> OperandId {
        if name == "this" {
            if let Some(class_name) = self.class.clone() {
                let name = self.arena.new_string("this");
                let object = self.arena.new_operand(OperandKind::Object { class_name });
                return self.arena.new_operand(OperandKind::BoundVariable {
                    name,
                    value: Some(object),
                    by_ref: false,
                    scope: VarScope::Object,
                });
            }
        }
        let name = self.arena.new_string(name);
        self.arena
            .new_operand(OperandKind::Variable { name, value: None })
    }

    fn lower_array(&mut self, items: &[ArrayItem], pos: Position) -> Result<OperandId> {
        let mut keys = Vec::with_capacity(items.len());
        let mut values = Vec::with_capacity(items.len());
        let mut by_ref = Vec::with_capacity(items.len());
        for item in items {
            let Some(value) = &item.value else { continue };
            let key = match &item.key {
                Some(k) => self.lower_read(k)?,
                None => self.arena.new_operand(OperandKind::Null),
            };
            keys.push(key);
            values.push(self.lower_read(value)?);
            by_ref.push(item.by_ref);
        }
        Ok(self.emit_value(pos, |result| OpKind::Array {
            keys,
            values,
            by_ref,
            result,
        }))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Assignment
    // ───────────────────────────────────────────────────────────────────────

    fn lower_assign(&mut self, var: &Expr, rhs: &Expr, pos: Position) -> Result<OperandId> {
        let value = self.lower_read(rhs)?;
        if let ExprKind::Array { items, .. } = &var.kind {
            self.lower_list_assign(items, value, pos)?;
            return Ok(value);
        }

        let whole = !matches!(var.kind, ExprKind::ArrayDimFetch { .. });
        let target = self.lower_write_target(var)?;
        let result = self.emit_value(pos, |result| OpKind::Assign {
            var: target,
            expr: value,
            result,
        });

        let resolved = self.arena.value_of(value);
        let kind = &self.arena.operand(resolved).kind;
        if whole && kind.is_constant_like() {
            let scalar = kind.is_scalar();
            self.arena.set_value(target, resolved);
            if scalar {
                return Ok(resolved);
            }
        }
        Ok(result)
    }

    /// `[$a, [$b, $c]] = $v` / `list('k' => $a) = $v`
    pub(super) fn lower_list_assign(
        &mut self,
        items: &[ArrayItem],
        value: OperandId,
        pos: Position,
    ) -> Result<()> {
        let mut index = 0usize;
        for item in items {
            let Some(target) = &item.value else {
                index += 1;
                continue;
            };
            let key = match &item.key {
                Some(k) => self.lower_read(k)?,
                None => {
                    let key = self.arena.new_operand(OperandKind::Number(index as f64));
                    index += 1;
                    key
                }
            };
            let element = self.emit_value(target.position, |result| OpKind::ArrayDimFetch {
                var: value,
                dim: Some(key),
                result,
            });
            match &target.kind {
                ExprKind::Array { items: nested, .. } => {
                    self.lower_list_assign(nested, element, target.position)?
                }
                _ => {
                    let dest = self.lower_write_target(target)?;
                    self.emit_value(pos, |result| OpKind::Assign {
                        var: dest,
                        expr: element,
                        result,
                    });
                }
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Operators
    // ───────────────────────────────────────────────────────────────────────

    /// Left operands are evaluated first; a left-nested chain is lowered in a
    /// loop so long `a . b . c ...` concatenations do not recurse per term
    fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        pos: Position,
    ) -> Result<OperandId> {
        let mut spine = vec![(op, right, pos)];
        let mut leftmost = left;
        while let ExprKind::Binary { op, left, right } = &leftmost.kind {
            spine.push((*op, right.as_ref(), leftmost.position));
            leftmost = left.as_ref();
        }

        let mut acc = self.lower_read(leftmost)?;
        for (op, right, pos) in spine.into_iter().rev() {
            let right = self.lower_read(right)?;
            let result = self.emit_binary(op, acc, right, pos);
            acc = self.read_variable(result);
        }
        Ok(acc)
    }

    fn emit_binary(
        &mut self,
        op: BinaryOp,
        left: OperandId,
        right: OperandId,
        pos: Position,
    ) -> OperandId {
        let result = self.emit_value(pos, |result| OpKind::Binary {
            op,
            left,
            right,
            result,
        });

        match op {
            BinaryOp::Equal | BinaryOp::Identical | BinaryOp::NotEqual | BinaryOp::NotIdentical => {
                let negated = matches!(op, BinaryOp::NotEqual | BinaryOp::NotIdentical);
                let typed = self
                    .gettype_subject(left)
                    .zip(self.arena.string_of(right).map(str::to_string))
                    .or_else(|| {
                        self.gettype_subject(right)
                            .zip(self.arena.string_of(left).map(str::to_string))
                    });
                if let Some((subject, type_name)) = typed {
                    let type_operand = self.arena.new_string(gettype_name(&type_name));
                    let assertion = Assertion::type_of(type_operand);
                    let assertion = if negated {
                        assertion.negation()
                    } else {
                        assertion
                    };
                    self.arena.add_assertion(result, subject, assertion);
                }
            }
            BinaryOp::LogicalAnd => {
                for side in [left, right] {
                    for asserted in self.arena.operand(side).assertions.clone() {
                        self.arena
                            .add_assertion(result, asserted.var, asserted.assertion);
                    }
                }
            }
            _ => {}
        }
        result
    }

    /// Argument of the `gettype()` call defining `operand`
    fn gettype_subject(&self, operand: OperandId) -> Option<OperandId> {
        let def = *self.arena.operand(operand).defs.first()?;
        match &self.arena.op(def).kind {
            OpKind::FunctionCall { name, args, .. }
                if self
                    .arena
                    .string_of(*name)
                    .is_some_and(|n| n.eq_ignore_ascii_case("gettype")) =>
            {
                let subject = *args.first()?;
                self.arena.name_of(subject).map(|_| subject)
            }
            _ => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Calls
    // ───────────────────────────────────────────────────────────────────────

    fn lower_call(&mut self, name: &Expr, args: &[Arg], pos: Position) -> Result<OperandId> {
        let arg_values = self.lower_args(args)?;
        let name = self.lower_name_slot(name)?;
        let callee = self
            .arena
            .string_of(name)
            .map(|n| n.rsplit('\\').next().unwrap_or(n).to_ascii_lowercase());

        if callee.as_deref() == Some("settype") && arg_values.len() >= 2 {
            self.lower_settype(&args[0].value, arg_values[0], arg_values[1], pos)?;
        }
        if callee.as_deref() == Some("define") && arg_values.len() >= 2 {
            if let Some(const_name) = self.arena.string_of(arg_values[0]).map(str::to_string) {
                if self.func == self.script.main {
                    self.consts.insert(const_name, arg_values[1]);
                }
            }
        }

        let args_for_op = arg_values.clone();
        let result = self.emit_call(pos, |result| OpKind::FunctionCall {
            name,
            args: args_for_op,
            result,
        });

        let predicate = callee
            .as_deref()
            .and_then(|c| TYPE_PREDICATES.iter().find(|(f, _)| *f == c))
            .map(|(_, t)| *t);
        if let (Some(type_name), Some(&subject)) = (predicate, arg_values.first()) {
            if self.arena.name_of(subject).is_some() {
                let type_operand = self.arena.new_string(type_name);
                self.arena
                    .add_assertion(result, subject, Assertion::type_of(type_operand));
            }
        }
        Ok(result)
    }

    /// `settype($x, 't')` → `$x = (t) $x`
    fn lower_settype(
        &mut self,
        target: &Expr,
        current: OperandId,
        type_name: OperandId,
        pos: Position,
    ) -> Result<()> {
        let Some(kind) = self.arena.string_of(type_name).and_then(settype_cast) else {
            return Ok(());
        };
        let cast = self.emit_value(pos, |result| OpKind::Cast {
            kind,
            expr: current,
            result,
        });
        let dest = self.lower_write_target(target)?;
        self.emit_value(pos, |result| OpKind::Assign {
            var: dest,
            expr: cast,
            result,
        });
        Ok(())
    }

    fn resolve_include(&self, target: &str) -> String {
        let path = Path::new(target);
        if path.is_absolute() {
            return normalize_path(target);
        }
        match Path::new(self.file_path.as_ref()).parent() {
            Some(dir) => normalize_path(&dir.join(path).to_string_lossy()),
            None => normalize_path(target),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Closures and ternaries
    // ───────────────────────────────────────────────────────────────────────

    fn lower_closure(&mut self, decl: &ClosureDecl, pos: Position) -> Result<OperandId> {
        let name = self.labels.next_anonymous();
        let func = self.arena.new_func(name.clone());
        {
            let record = self.arena.func_mut(func);
            record.position = pos;
            record.file_path = Some(self.file_path.clone());
            record.return_type = lower_type(decl.return_type.as_ref());
            record.flags = func_flags::CLOSURE;
            if decl.by_ref {
                record.flags |= func_flags::RETURNS_REF;
            }
            if decl.is_static {
                record.flags |= func_flags::STATIC;
            }
        }

        let mut captured = Vec::with_capacity(decl.uses.len());
        let mut use_vars = Vec::with_capacity(decl.uses.len());
        for used in &decl.uses {
            let current = self.read_variable_name(&used.name, self.block);
            let name = self.arena.new_string(used.name.as_str());
            let bound = self.arena.new_operand(OperandKind::BoundVariable {
                name,
                value: Some(current),
                by_ref: used.by_ref,
                scope: VarScope::Local,
            });
            captured.push((used.name.clone(), bound));
            use_vars.push(bound);
        }

        self.lower_func(func, &decl.params, &captured, &decl.body)?;
        self.script.add_function(name, func);

        let result = self.arena.new_temporary(None);
        let op = self.emit(
            OpKind::Closure {
                func,
                use_vars,
                result,
            },
            pos,
        );
        self.arena.func_mut(func).callable_op = Some(op);
        Ok(result)
    }

    fn lower_ternary(
        &mut self,
        cond: &Expr,
        if_true: Option<&Expr>,
        if_false: &Expr,
        pos: Position,
    ) -> Result<OperandId> {
        let cond = self.lower_read(cond)?;
        let if_block = self.new_block();
        let else_block = self.new_block();
        let end = self.new_block();
        self.jump_if(cond, if_block, else_block, pos);
        self.process_assertion(cond, if_block, else_block);

        let mut incoming = Vec::with_capacity(2);

        self.ctx.push_condition(cond);
        self.set_conditions(if_block);
        self.block = if_block;
        let value = match if_true {
            Some(e) => self.lower_read(e)?,
            None => cond,
        };
        if !self.is_dead(self.block) {
            incoming.push(value);
        }
        self.jump(end, pos);
        self.ctx.pop_condition();

        let negated = self.negate(cond);
        self.ctx.push_condition(negated);
        self.set_conditions(else_block);
        self.block = else_block;
        let value = self.lower_read(if_false)?;
        if !self.is_dead(self.block) {
            incoming.push(value);
        }
        self.jump(end, pos);
        self.ctx.pop_condition();

        self.block = end;
        let result = self.arena.new_temporary(None);
        let phi = self.detached(
            OpKind::Phi {
                vars: incoming,
                result,
            },
            pos,
        );
        self.arena.attach_phi(end, phi);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::ast::Name;

    fn string(s: &str) -> Expr {
        Expr::new(ExprKind::Literal(Literal::String(s.into())), Position::zero())
    }

    #[test]
    fn test_static_string_concat() {
        let concat = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Concat,
                left: string("/srv/app").boxed(),
                right: string("/db.php").boxed(),
            },
            Position::zero(),
        );
        assert_eq!(static_string(&concat), Some("/srv/app/db.php".to_string()));

        let dynamic = Expr::new(ExprKind::ConstFetch(Name::simple("ROOT")), Position::zero());
        assert_eq!(static_string(&dynamic), None);
    }

    #[test]
    fn test_gettype_names() {
        assert_eq!(gettype_name("integer"), "int");
        assert_eq!(gettype_name("NULL"), "null");
        assert_eq!(gettype_name("string"), "string");
    }

    #[test]
    fn test_settype_casts() {
        assert_eq!(settype_cast("integer"), Some(CastKind::Int));
        assert_eq!(settype_cast("Double"), Some(CastKind::Double));
        assert_eq!(settype_cast("null"), Some(CastKind::Unset));
        assert_eq!(settype_cast("resource"), None);
    }
}
