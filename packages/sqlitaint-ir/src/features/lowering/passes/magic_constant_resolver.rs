//! Magic constant substitution
//!
//! `__CLASS__`, `__FUNCTION__` and friends become string literals, `__LINE__`
//! an int literal. Bare `self` / `parent` class slots become the enclosing
//! class and its parent.

use std::path::Path;

use super::traverser::AstVisitor;
use crate::errors::{AnalyzerError, Result};
use crate::features::parsing::ast::{
    ClassKind, Expr, ExprKind, Literal, MagicConst, Name, NameKind, Stmt, StmtKind,
};
use crate::shared::ScopeStack;

#[derive(Debug)]
pub struct MagicConstantResolver {
    file_path: String,
    namespace: String,
    classes: ScopeStack,
    parents: ScopeStack,
    /// Trait name or "" per enclosing class-like
    traits: ScopeStack,
    functions: ScopeStack,
    methods: ScopeStack,
}

impl MagicConstantResolver {
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            namespace: String::new(),
            classes: ScopeStack::new(),
            parents: ScopeStack::new(),
            traits: ScopeStack::new(),
            functions: ScopeStack::new(),
            methods: ScopeStack::new(),
        }
    }

    fn value_of(&self, magic: MagicConst, line: u32) -> Literal {
        let s = |v: &str| Literal::String(v.to_string());
        match magic {
            MagicConst::Class => s(self.classes.current()),
            MagicConst::Trait => s(self.traits.current()),
            MagicConst::Namespace => s(&self.namespace),
            MagicConst::Function => s(self.functions.current()),
            MagicConst::Method => s(self.methods.current()),
            MagicConst::Line => Literal::Int(line as i64),
            MagicConst::File => s(&self.file_path),
            MagicConst::Dir => s(&Path::new(&self.file_path)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()),
        }
    }

    fn replace_relative_class(&self, name: &mut Name) -> Result<()> {
        if name.kind != NameKind::Name || name.parts.len() != 1 {
            return Ok(());
        }
        let scope = match name.leaf().to_ascii_lowercase().as_str() {
            "self" => &self.classes,
            "parent" => &self.parents,
            _ => return Ok(()),
        };
        match scope.top().filter(|s| !s.is_empty()) {
            Some(target) => {
                *name = Name::new(
                    NameKind::FullyQualified,
                    target.split('\\').map(str::to_string).collect(),
                    name.position,
                );
                Ok(())
            }
            None => Err(AnalyzerError::lowering(
                &self.file_path,
                format!(
                    "cannot use \"{}\" when no class scope is active (line {})",
                    name.leaf(),
                    name.position.start_line
                ),
            )),
        }
    }
}

impl AstVisitor for MagicConstantResolver {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Namespace { name, .. } => {
                self.namespace = name.as_ref().map(Name::joined).unwrap_or_default();
            }
            StmtKind::Class(decl) => {
                let name = decl.name.joined();
                self.traits.push(if decl.kind == ClassKind::Trait {
                    name.clone()
                } else {
                    String::new()
                });
                self.classes.push(name);
                self.parents
                    .push(decl.extends.as_ref().map(Name::joined).unwrap_or_default());
            }
            StmtKind::Function(decl) => {
                let name = decl.name.joined();
                self.functions.push(name.clone());
                self.methods.push(name);
            }
            StmtKind::ClassMethod(decl) => {
                self.functions.push(decl.name.clone());
                self.methods
                    .push(format!("{}::{}", self.classes.current(), decl.name));
            }
            _ => {}
        }
        Ok(())
    }

    fn leave_stmt(&mut self, stmt: &mut Stmt) -> Result<Vec<Stmt>> {
        match &stmt.kind {
            StmtKind::Namespace { body: Some(_), .. } => self.namespace.clear(),
            StmtKind::Class(_) => {
                self.classes.pop();
                self.parents.pop();
                self.traits.pop();
            }
            StmtKind::Function(_) | StmtKind::ClassMethod(_) => {
                self.functions.pop();
                self.methods.pop();
            }
            _ => {}
        }
        Ok(Vec::new())
    }

    fn enter_expr(&mut self, expr: &mut Expr) -> Result<()> {
        match &mut expr.kind {
            ExprKind::MagicConst(magic) => {
                let value = self.value_of(*magic, expr.position.start_line);
                expr.kind = ExprKind::Literal(value);
            }
            ExprKind::Closure(_) => {
                self.functions.push("{closure}");
                self.methods.push("{closure}");
            }
            ExprKind::New { class, .. }
            | ExprKind::StaticCall { class, .. }
            | ExprKind::StaticPropertyFetch { class, .. }
            | ExprKind::ClassConstFetch { class, .. }
            | ExprKind::InstanceOf { class, .. } => {
                if let ExprKind::Name(name) = &mut class.kind {
                    self.replace_relative_class(name)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn leave_expr(&mut self, expr: &mut Expr) -> Result<()> {
        if let ExprKind::Closure(_) = expr.kind {
            self.functions.pop();
            self.methods.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::lowering::passes::traverser::traverse;
    use crate::features::parsing::ast::{ClassDecl, MethodDecl, Modifiers};
    use crate::shared::models::Position;

    fn magic(m: MagicConst, line: u32) -> Expr {
        Expr::new(
            ExprKind::MagicConst(m),
            Position::new(line, line, 0, 0),
        )
    }

    fn class_with(body: Vec<Stmt>) -> Stmt {
        Stmt::new(
            StmtKind::Class(ClassDecl {
                kind: ClassKind::Class,
                name: Name::parse("\\App\\C", Position::zero()),
                modifiers: Modifiers::default(),
                extends: Some(Name::parse("\\App\\Base", Position::zero())),
                implements: vec![],
                body,
            }),
            Position::zero(),
        )
    }

    #[test]
    fn test_class_and_method_names() {
        let method = Stmt::new(
            StmtKind::ClassMethod(MethodDecl {
                name: "run".into(),
                modifiers: Modifiers::default(),
                params: vec![],
                by_ref: false,
                return_type: None,
                body: Some(vec![Stmt::new(
                    StmtKind::Echo(vec![
                        magic(MagicConst::Class, 3),
                        magic(MagicConst::Method, 3),
                        magic(MagicConst::Line, 3),
                    ]),
                    Position::zero(),
                )]),
            }),
            Position::zero(),
        );
        let mut stmts = vec![class_with(vec![method])];
        traverse(&mut stmts, &mut MagicConstantResolver::new("src/a.php")).unwrap();

        let StmtKind::Class(decl) = &stmts[0].kind else {
            panic!("expected class");
        };
        let StmtKind::ClassMethod(m) = &decl.body[0].kind else {
            panic!("expected method");
        };
        let body = m.body.as_ref().unwrap();
        let StmtKind::Echo(values) = &body[0].kind else {
            panic!("expected echo");
        };
        assert_eq!(values[0].kind, ExprKind::Literal(Literal::String("App\\C".into())));
        assert_eq!(
            values[1].kind,
            ExprKind::Literal(Literal::String("App\\C::run".into()))
        );
        assert_eq!(values[2].kind, ExprKind::Literal(Literal::Int(3)));
    }

    #[test]
    fn test_outside_class_is_empty_and_file_dir() {
        let mut stmts = vec![Stmt::new(
            StmtKind::Echo(vec![
                magic(MagicConst::Class, 1),
                magic(MagicConst::File, 1),
                magic(MagicConst::Dir, 1),
            ]),
            Position::zero(),
        )];
        traverse(&mut stmts, &mut MagicConstantResolver::new("src/a.php")).unwrap();
        let StmtKind::Echo(values) = &stmts[0].kind else {
            panic!("expected echo");
        };
        assert_eq!(values[0].kind, ExprKind::Literal(Literal::String(String::new())));
        assert_eq!(values[1].kind, ExprKind::Literal(Literal::String("src/a.php".into())));
        assert_eq!(values[2].kind, ExprKind::Literal(Literal::String("src".into())));
    }

    #[test]
    fn test_self_and_parent_resolved() {
        let new_self = Expr::new(
            ExprKind::New {
                class: Box::new(Expr::new(ExprKind::Name(Name::simple("self")), Position::zero())),
                args: vec![],
            },
            Position::zero(),
        );
        let mut stmts = vec![class_with(vec![Stmt::new(
            StmtKind::Expr(new_self.clone()),
            Position::zero(),
        )])];
        traverse(&mut stmts, &mut MagicConstantResolver::new("a.php")).unwrap();
        let StmtKind::Class(decl) = &stmts[0].kind else {
            panic!("expected class");
        };
        let StmtKind::Expr(Expr {
            kind: ExprKind::New { class, .. },
            ..
        }) = &decl.body[0].kind
        else {
            panic!("expected new");
        };
        assert_eq!(
            class.kind,
            ExprKind::Name(Name::new(
                NameKind::FullyQualified,
                vec!["App".into(), "C".into()],
                Position::zero()
            ))
        );

        let mut outside = vec![Stmt::new(StmtKind::Expr(new_self), Position::zero())];
        assert!(traverse(&mut outside, &mut MagicConstantResolver::new("a.php")).is_err());
    }
}
