//! break/continue → goto
//!
//! Every loop and switch gets fresh labels. `continue` targets a label
//! appended to the loop body, `break` a label inserted right after the
//! construct. A switch uses one label for both.

use super::traverser::AstVisitor;
use crate::errors::{AnalyzerError, Result};
use crate::features::parsing::ast::{Expr, ExprKind, Literal, Stmt, StmtKind};
use crate::shared::LabelGenerator;

/// Break/continue label stacks of one function body
#[derive(Debug, Default)]
struct LoopFrame {
    break_labels: Vec<String>,
    continue_labels: Vec<String>,
}

#[derive(Debug)]
pub struct LoopResolver {
    labels: LabelGenerator,
    /// One frame per enclosing function; loops never cross function bodies
    frames: Vec<LoopFrame>,
}

impl LoopResolver {
    pub fn new(file_path: &str) -> Self {
        Self {
            labels: LabelGenerator::for_file(file_path),
            frames: vec![LoopFrame::default()],
        }
    }

    pub fn into_labels(self) -> LabelGenerator {
        self.labels
    }

    fn frame(&mut self) -> &mut LoopFrame {
        if self.frames.is_empty() {
            self.frames.push(LoopFrame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn push_loop(&mut self) {
        let brk = self.labels.next_label();
        let cont = self.labels.next_label();
        let frame = self.frame();
        frame.break_labels.push(brk);
        frame.continue_labels.push(cont);
    }

    fn push_switch(&mut self) {
        let label = self.labels.next_label();
        let frame = self.frame();
        frame.break_labels.push(label.clone());
        frame.continue_labels.push(label);
    }

    fn pop(&mut self) -> Option<(String, String)> {
        let frame = self.frame();
        Some((frame.break_labels.pop()?, frame.continue_labels.pop()?))
    }

    fn target(&self, level: &Option<Expr>, is_break: bool) -> Result<String> {
        let keyword = if is_break { "break" } else { "continue" };
        let n = match level {
            None => 1,
            Some(Expr {
                kind: ExprKind::Literal(Literal::Int(n)),
                ..
            }) => *n,
            Some(_) => {
                return Err(AnalyzerError::Loop(format!(
                    "'{}' operator accepts only positive integers",
                    keyword
                )))
            }
        };
        let stack = self
            .frames
            .last()
            .map(|f| {
                if is_break {
                    &f.break_labels
                } else {
                    &f.continue_labels
                }
            })
            .ok_or_else(|| AnalyzerError::Loop(format!("'{}' outside of a function", keyword)))?;
        if n <= 0 {
            return Err(AnalyzerError::Loop(format!(
                "'{}' operator accepts only positive integers",
                keyword
            )));
        }
        let depth = n as usize;
        if depth > stack.len() {
            return Err(AnalyzerError::Loop(format!(
                "Cannot '{}' {} level{}",
                keyword,
                n,
                if n == 1 { "" } else { "s" }
            )));
        }
        Ok(stack[stack.len() - depth].clone())
    }
}

impl AstVisitor for LoopResolver {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::Foreach { .. } => self.push_loop(),
            StmtKind::Switch { .. } => self.push_switch(),
            StmtKind::Function(_) | StmtKind::ClassMethod(_) => {
                self.frames.push(LoopFrame::default())
            }
            StmtKind::Break(level) => {
                let target = self.target(level, true)?;
                stmt.kind = StmtKind::Goto(target);
            }
            StmtKind::Continue(level) => {
                let target = self.target(level, false)?;
                stmt.kind = StmtKind::Goto(target);
            }
            _ => {}
        }
        Ok(())
    }

    fn leave_stmt(&mut self, stmt: &mut Stmt) -> Result<Vec<Stmt>> {
        match &mut stmt.kind {
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::For { body, .. }
            | StmtKind::Foreach { body, .. } => {
                let Some((brk, cont)) = self.pop() else {
                    return Ok(Vec::new());
                };
                let position = stmt.position;
                body.push(Stmt::new(StmtKind::Label(cont), position));
                Ok(vec![Stmt::new(StmtKind::Label(brk), position)])
            }
            StmtKind::Switch { .. } => {
                let Some((brk, _)) = self.pop() else {
                    return Ok(Vec::new());
                };
                Ok(vec![Stmt::new(StmtKind::Label(brk), stmt.position)])
            }
            StmtKind::Function(_) | StmtKind::ClassMethod(_) => {
                self.frames.pop();
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn enter_expr(&mut self, expr: &mut Expr) -> Result<()> {
        if let ExprKind::Closure(_) = expr.kind {
            self.frames.push(LoopFrame::default());
        }
        Ok(())
    }

    fn leave_expr(&mut self, expr: &mut Expr) -> Result<()> {
        if let ExprKind::Closure(_) = expr.kind {
            self.frames.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::lowering::passes::traverser::traverse;
    use crate::shared::models::Position;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind, Position::zero())
    }

    fn int(n: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(n)), Position::zero())
    }

    fn while_loop(body: Vec<Stmt>) -> Stmt {
        stmt(StmtKind::While {
            cond: int(1),
            body,
        })
    }

    #[test]
    fn test_break_and_continue_become_gotos() {
        let mut stmts = vec![while_loop(vec![
            stmt(StmtKind::Continue(None)),
            stmt(StmtKind::Break(None)),
        ])];
        traverse(&mut stmts, &mut LoopResolver::new("a.php")).unwrap();

        assert_eq!(stmts.len(), 2, "break label inserted after the loop");
        let StmtKind::Label(break_label) = &stmts[1].kind else {
            panic!("expected label");
        };
        let StmtKind::While { body, .. } = &stmts[0].kind else {
            panic!("expected while");
        };
        let StmtKind::Label(continue_label) = &body[2].kind else {
            panic!("expected continue label at end of body");
        };
        assert_eq!(body[0].kind, StmtKind::Goto(continue_label.clone()));
        assert_eq!(body[1].kind, StmtKind::Goto(break_label.clone()));
        assert_ne!(break_label, continue_label);
    }

    #[test]
    fn test_break_two_targets_outer_loop() {
        let mut stmts = vec![while_loop(vec![while_loop(vec![stmt(StmtKind::Break(
            Some(int(2)),
        ))])])];
        traverse(&mut stmts, &mut LoopResolver::new("a.php")).unwrap();

        let StmtKind::Label(outer_break) = &stmts[1].kind else {
            panic!("expected outer break label");
        };
        let StmtKind::While { body: outer, .. } = &stmts[0].kind else {
            panic!("expected while");
        };
        let StmtKind::While { body: inner, .. } = &outer[0].kind else {
            panic!("expected inner while");
        };
        assert_eq!(inner[0].kind, StmtKind::Goto(outer_break.clone()));
    }

    #[test]
    fn test_switch_shares_label() {
        let mut stmts = vec![stmt(StmtKind::Switch {
            cond: int(1),
            cases: vec![crate::features::parsing::ast::Case {
                cond: Some(int(1)),
                body: vec![stmt(StmtKind::Continue(None))],
                position: Position::zero(),
            }],
        })];
        traverse(&mut stmts, &mut LoopResolver::new("a.php")).unwrap();
        let StmtKind::Label(label) = &stmts[1].kind else {
            panic!("expected label after switch");
        };
        let StmtKind::Switch { cases, .. } = &stmts[0].kind else {
            panic!("expected switch");
        };
        assert_eq!(cases[0].body[0].kind, StmtKind::Goto(label.clone()));
    }

    #[test]
    fn test_invalid_levels_are_errors() {
        let mut zero = vec![while_loop(vec![stmt(StmtKind::Break(Some(int(0))))])];
        let err = traverse(&mut zero, &mut LoopResolver::new("a.php")).unwrap_err();
        assert!(matches!(err, AnalyzerError::Loop(_)));

        let mut deep = vec![while_loop(vec![stmt(StmtKind::Break(Some(int(3))))])];
        let err = traverse(&mut deep, &mut LoopResolver::new("a.php")).unwrap_err();
        assert!(err.to_string().contains("3 levels"), "{}", err);

        let mut outside = vec![stmt(StmtKind::Break(None))];
        assert!(traverse(&mut outside, &mut LoopResolver::new("a.php")).is_err());
    }
}
