//! Textual IR dump
//!
//! Output depends only on arena contents and script order, so two lowerings
//! of the same input print identically.

use std::fmt::Write;

use crate::features::ir::domain::{BlockId, FuncId, IrArena, OpId, OperandId, OperandKind, Script};

pub struct IrPrinter<'a> {
    arena: &'a IrArena,
}

impl<'a> IrPrinter<'a> {
    pub fn new(arena: &'a IrArena) -> Self {
        Self { arena }
    }

    pub fn print_script(&self, script: &Script) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "script {}", script.file_path);
        for include in &script.included_files {
            let _ = writeln!(out, "  include {}", include);
        }
        for func in &script.ordered_functions {
            out.push_str(&self.print_func(*func));
        }
        out
    }

    pub fn print_func(&self, func_id: FuncId) -> String {
        let func = self.arena.func(func_id);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "function {}(): {} [flags={:#x}]",
            func.scoped_name(),
            func.return_type,
            func.flags
        );
        for block in &func.blocks {
            self.print_block(&mut out, *block);
        }
        out
    }

    fn print_block(&self, out: &mut String, id: BlockId) {
        let block = self.arena.block(id);
        let preds: Vec<String> = block.predecessors.iter().map(|p| p.to_string()).collect();
        let _ = write!(out, "  {}:", id);
        if !preds.is_empty() {
            let _ = write!(out, " preds=[{}]", preds.join(", "));
        }
        if block.dead {
            out.push_str(" dead");
        }
        if block.conditional {
            let conds: Vec<String> = block.conditions.iter().map(|c| self.operand(*c)).collect();
            let _ = write!(out, " when [{}]", conds.join(", "));
        }
        out.push('\n');
        for phi in &block.phis {
            let _ = writeln!(out, "    {}", self.op(*phi));
        }
        for op in &block.instructions {
            let _ = writeln!(out, "    {}", self.op(*op));
        }
    }

    /// One op on one line: `Name field=value ...`
    pub fn op(&self, id: OpId) -> String {
        let kind = &self.arena.op(id).kind;
        let mut line = String::from(kind.name());
        let mut last_list: Option<&str> = None;
        for (slot, operand) in kind.operands() {
            match slot.index {
                None => {
                    last_list = None;
                    let _ = write!(line, " {}={}", slot.name, self.operand(operand));
                }
                Some(i) => {
                    if last_list != Some(slot.name) || i == 0 {
                        let _ = write!(line, " {}=", slot.name);
                    } else {
                        line.push(',');
                    }
                    last_list = Some(slot.name);
                    line.push_str(&self.operand(operand));
                }
            }
        }
        for (name, block) in kind.sub_blocks() {
            let _ = write!(line, " {}->{}", name, block);
        }
        line
    }

    /// Literals inline, variables by name, everything else by id
    pub fn operand(&self, id: OperandId) -> String {
        match &self.arena.operand(id).kind {
            OperandKind::Null => "null".to_string(),
            OperandKind::Bool(b) => b.to_string(),
            OperandKind::Number(n) => n.to_string(),
            OperandKind::String(s) => format!("{:?}", s),
            OperandKind::Object { class_name } => format!("object({})", class_name),
            OperandKind::Symbolic { tag } => format!("<{}>", tag),
            OperandKind::Variable { .. } | OperandKind::BoundVariable { .. } => {
                match self.arena.name_of(id) {
                    Some(name) => format!("${}", name),
                    None => format!("${{{}}}", id),
                }
            }
            OperandKind::Temporary { .. } => match self.arena.name_of(id) {
                Some(name) => format!("{}<${}>", id, name),
                None => id.to_string(),
            },
        }
    }
}

/// Print every script in order
pub fn print_scripts<'s>(arena: &IrArena, scripts: impl IntoIterator<Item = &'s Script>) -> String {
    let printer = IrPrinter::new(arena);
    scripts
        .into_iter()
        .map(|s| printer.print_script(s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::OpKind;
    use crate::shared::models::Position;
    use std::sync::Arc;

    #[test]
    fn test_prints_ops_with_named_operands() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let entry = arena.func(main).entry;
        let name = arena.new_string("x");
        let var = arena.new_operand(OperandKind::Variable { name, value: None });
        let expr = arena.new_string("hi");
        let result = arena.new_temporary(Some(var));
        let op = arena.add_op(OpKind::Assign { var, expr, result }, Position::zero(), None);
        arena.append(entry, op);
        let ret = arena.add_op(OpKind::Return { expr: None }, Position::zero(), None);
        arena.append(entry, ret);

        let script = Script::new(Arc::from("a.php"), main);
        let text = IrPrinter::new(&arena).print_script(&script);

        assert!(text.contains("function {main}(): mixed"));
        assert!(text.contains("Assign var=$x expr=\"hi\" result=%3<$x>"), "{}", text);
        assert!(text.contains("    Return\n"), "{}", text);
    }

    #[test]
    fn test_list_fields_are_comma_joined() {
        let mut arena = IrArena::new();
        let main = arena.new_func("{main}");
        let entry = arena.func(main).entry;
        let name = arena.new_string("f");
        let a = arena.new_operand(OperandKind::Number(1.0));
        let b = arena.new_operand(OperandKind::Bool(true));
        let result = arena.new_temporary(None);
        let op = arena.add_op(
            OpKind::FunctionCall {
                name,
                args: vec![a, b],
                result,
            },
            Position::zero(),
            None,
        );
        arena.append(entry, op);

        let line = IrPrinter::new(&arena).op(op);
        assert_eq!(line, "FunctionCall name=\"f\" args=1,true result=%3");
    }
}
