//! Mutable AST traversal shared by the pre-passes
//!
//! A visitor sees every statement and expression twice (enter, leave).
//! `leave_stmt` may return statements that are spliced in right after the
//! visited one; spliced statements are not visited.

use crate::errors::Result;
use crate::features::parsing::ast::{Expr, ExprKind, Param, Stmt, StmtKind, VarName};

/// Rewriting visitor over the AST
pub trait AstVisitor {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        let _ = stmt;
        Ok(())
    }

    /// Statements returned here are inserted after `stmt`
    fn leave_stmt(&mut self, stmt: &mut Stmt) -> Result<Vec<Stmt>> {
        let _ = stmt;
        Ok(Vec::new())
    }

    fn enter_expr(&mut self, expr: &mut Expr) -> Result<()> {
        let _ = expr;
        Ok(())
    }

    fn leave_expr(&mut self, expr: &mut Expr) -> Result<()> {
        let _ = expr;
        Ok(())
    }
}

/// Drives one visitor over a statement list
pub struct Traverser<'v> {
    visitor: &'v mut dyn AstVisitor,
}

impl<'v> Traverser<'v> {
    pub fn new(visitor: &'v mut dyn AstVisitor) -> Self {
        Self { visitor }
    }

    pub fn traverse(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        let mut i = 0;
        while i < stmts.len() {
            let siblings = self.stmt(&mut stmts[i])?;
            let inserted = siblings.len();
            for (offset, sibling) in siblings.into_iter().enumerate() {
                stmts.insert(i + 1 + offset, sibling);
            }
            i += 1 + inserted;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> Result<Vec<Stmt>> {
        self.visitor.enter_stmt(stmt)?;
        match &mut stmt.kind {
            StmtKind::Expr(e) | StmtKind::Throw(e) => self.expr(e)?,
            StmtKind::Echo(list) | StmtKind::Global(list) | StmtKind::Unset(list) => {
                self.exprs(list)?
            }
            StmtKind::Return(e) | StmtKind::Break(e) | StmtKind::Continue(e) => {
                self.opt_expr(e)?
            }
            StmtKind::If {
                cond,
                then_branch,
                elseifs,
                else_branch,
            } => {
                self.expr(cond)?;
                self.traverse(then_branch)?;
                for elseif in elseifs {
                    self.expr(&mut elseif.cond)?;
                    self.traverse(&mut elseif.body)?;
                }
                if let Some(body) = else_branch {
                    self.traverse(body)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond)?;
                self.traverse(body)?;
            }
            StmtKind::DoWhile { body, cond } => {
                self.traverse(body)?;
                self.expr(cond)?;
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.exprs(init)?;
                self.exprs(cond)?;
                self.exprs(step)?;
                self.traverse(body)?;
            }
            StmtKind::Foreach {
                expr,
                key,
                value,
                body,
                ..
            } => {
                self.expr(expr)?;
                self.opt_expr(key)?;
                self.expr(value)?;
                self.traverse(body)?;
            }
            StmtKind::Switch { cond, cases } => {
                self.expr(cond)?;
                for case in cases {
                    self.opt_expr(&mut case.cond)?;
                    self.traverse(&mut case.body)?;
                }
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.traverse(body)?;
                for catch in catches {
                    self.traverse(&mut catch.body)?;
                }
                if let Some(f) = finally {
                    self.traverse(f)?;
                }
            }
            StmtKind::Static(vars) => {
                for var in vars {
                    self.opt_expr(&mut var.default)?;
                }
            }
            StmtKind::Function(decl) => {
                self.params(&mut decl.params)?;
                self.traverse(&mut decl.body)?;
            }
            StmtKind::ClassMethod(decl) => {
                self.params(&mut decl.params)?;
                if let Some(body) = &mut decl.body {
                    self.traverse(body)?;
                }
            }
            StmtKind::Class(decl) => self.traverse(&mut decl.body)?,
            StmtKind::PropertyList(list) => {
                for prop in &mut list.props {
                    self.opt_expr(&mut prop.default)?;
                }
            }
            StmtKind::ClassConstList(consts) | StmtKind::ConstList(consts) => {
                for c in consts {
                    self.expr(&mut c.value)?;
                }
            }
            StmtKind::Namespace { body, .. } => {
                if let Some(body) = body {
                    self.traverse(body)?;
                }
            }
            StmtKind::Block(body) => self.traverse(body)?,
            StmtKind::Goto(_)
            | StmtKind::Label(_)
            | StmtKind::TraitUse { .. }
            | StmtKind::Use { .. }
            | StmtKind::InlineHtml(_)
            | StmtKind::Nop => {}
        }
        self.visitor.leave_stmt(stmt)
    }

    fn params(&mut self, params: &mut [Param]) -> Result<()> {
        for param in params {
            self.opt_expr(&mut param.default)?;
        }
        Ok(())
    }

    fn exprs(&mut self, exprs: &mut [Expr]) -> Result<()> {
        for e in exprs {
            self.expr(e)?;
        }
        Ok(())
    }

    fn opt_expr(&mut self, expr: &mut Option<Expr>) -> Result<()> {
        match expr {
            Some(e) => self.expr(e),
            None => Ok(()),
        }
    }

    fn opt_boxed(&mut self, expr: &mut Option<Box<Expr>>) -> Result<()> {
        match expr {
            Some(e) => self.expr(e),
            None => Ok(()),
        }
    }

    pub fn expr(&mut self, expr: &mut Expr) -> Result<()> {
        self.visitor.enter_expr(expr)?;
        match &mut expr.kind {
            ExprKind::Variable(VarName::Dynamic(inner))
            | ExprKind::Unary { expr: inner, .. }
            | ExprKind::Cast { expr: inner, .. }
            | ExprKind::IncDec { var: inner, .. }
            | ExprKind::Include { expr: inner, .. }
            | ExprKind::ErrorSuppress(inner)
            | ExprKind::YieldFrom(inner) => self.expr(inner)?,
            ExprKind::Interpolated(parts) | ExprKind::ShellExec(parts) | ExprKind::Isset(parts) => {
                self.exprs(parts)?
            }
            ExprKind::Array { items, .. } => {
                for item in items {
                    self.opt_expr(&mut item.key)?;
                    self.opt_expr(&mut item.value)?;
                }
            }
            ExprKind::ArrayDimFetch { var, dim } => {
                self.expr(var)?;
                self.opt_boxed(dim)?;
            }
            ExprKind::PropertyFetch { var, name, .. } => {
                self.expr(var)?;
                self.expr(name)?;
            }
            ExprKind::StaticPropertyFetch { class, name } => {
                self.expr(class)?;
                self.expr(name)?;
            }
            ExprKind::ClassConstFetch { class, .. } => self.expr(class)?,
            ExprKind::Assign { var, expr: value }
            | ExprKind::AssignRef { var, expr: value }
            | ExprKind::AssignOp {
                var, expr: value, ..
            } => {
                self.expr(var)?;
                self.expr(value)?;
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)?;
            }
            ExprKind::Call { name, args } => {
                self.expr(name)?;
                for arg in args {
                    self.expr(&mut arg.value)?;
                }
            }
            ExprKind::MethodCall { var, name, args, .. } => {
                self.expr(var)?;
                self.expr(name)?;
                for arg in args {
                    self.expr(&mut arg.value)?;
                }
            }
            ExprKind::StaticCall { class, name, args } => {
                self.expr(class)?;
                self.expr(name)?;
                for arg in args {
                    self.expr(&mut arg.value)?;
                }
            }
            ExprKind::New { class, args } => {
                self.expr(class)?;
                for arg in args {
                    self.expr(&mut arg.value)?;
                }
            }
            ExprKind::Closure(decl) => {
                self.params(&mut decl.params)?;
                self.traverse(&mut decl.body)?;
            }
            ExprKind::InstanceOf { expr: inner, class } => {
                self.expr(inner)?;
                self.expr(class)?;
            }
            ExprKind::Exit(inner) => self.opt_boxed(inner)?,
            ExprKind::Ternary {
                cond,
                if_true,
                if_false,
            } => {
                self.expr(cond)?;
                self.opt_boxed(if_true)?;
                self.expr(if_false)?;
            }
            ExprKind::Yield { key, value } => {
                self.opt_boxed(key)?;
                self.opt_boxed(value)?;
            }
            ExprKind::Variable(VarName::Named(_))
            | ExprKind::Literal(_)
            | ExprKind::ConstFetch(_)
            | ExprKind::MagicConst(_)
            | ExprKind::Name(_)
            | ExprKind::Identifier(_) => {}
        }
        self.visitor.leave_expr(expr)
    }
}

/// Run one visitor over a file's statements
pub fn traverse(stmts: &mut Vec<Stmt>, visitor: &mut dyn AstVisitor) -> Result<()> {
    Traverser::new(visitor).traverse(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::ast::Literal;
    use crate::shared::models::Position;

    struct Counter {
        stmts: usize,
        exprs: usize,
    }

    impl AstVisitor for Counter {
        fn enter_stmt(&mut self, _stmt: &mut Stmt) -> Result<()> {
            self.stmts += 1;
            Ok(())
        }

        fn leave_stmt(&mut self, stmt: &mut Stmt) -> Result<Vec<Stmt>> {
            if matches!(stmt.kind, StmtKind::Echo(_)) {
                return Ok(vec![Stmt::new(StmtKind::Nop, Position::zero())]);
            }
            Ok(Vec::new())
        }

        fn enter_expr(&mut self, _expr: &mut Expr) -> Result<()> {
            self.exprs += 1;
            Ok(())
        }
    }

    fn lit(n: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(n)), Position::zero())
    }

    #[test]
    fn test_visits_nested_and_splices_siblings() {
        let mut stmts = vec![
            Stmt::new(StmtKind::Echo(vec![lit(1), lit(2)]), Position::zero()),
            Stmt::new(
                StmtKind::While {
                    cond: lit(1),
                    body: vec![Stmt::new(StmtKind::Echo(vec![lit(3)]), Position::zero())],
                },
                Position::zero(),
            ),
        ];
        let mut counter = Counter { stmts: 0, exprs: 0 };
        traverse(&mut stmts, &mut counter).unwrap();

        assert_eq!(counter.stmts, 3);
        assert_eq!(counter.exprs, 4);
        assert_eq!(stmts.len(), 3, "nop spliced after top-level echo");
        assert!(matches!(stmts[1].kind, StmtKind::Nop));
        match &stmts[2].kind {
            StmtKind::While { body, .. } => assert_eq!(body.len(), 2),
            other => panic!("expected while, got {:?}", other),
        }
    }
}
