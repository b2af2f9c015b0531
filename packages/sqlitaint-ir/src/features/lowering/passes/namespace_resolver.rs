//! Namespace and `use` alias resolution
//!
//! Rewrites every name in a class, function or constant slot into its
//! fully-qualified form. Declared names get the current namespace prefix.

use ahash::AHashMap as HashMap;

use super::traverser::AstVisitor;
use crate::errors::Result;
use crate::features::parsing::ast::{
    Catch, Expr, ExprKind, Name, NameKind, Param, Stmt, StmtKind, TypeHint, UseKind,
};

/// Class-slot names that always refer to themselves
const BUILTIN_CLASS_NAMES: &[&str] = &[
    "self", "static", "parent", "int", "float", "bool", "string", "void", "iterable", "object",
    "array", "callable", "mixed", "null", "never", "false", "true",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Class,
    Function,
    Const,
}

#[derive(Debug, Default)]
struct AliasTables {
    /// lowercase alias → target parts
    class: HashMap<String, Vec<String>>,
    /// lowercase alias → target parts
    function: HashMap<String, Vec<String>>,
    /// alias (case kept) → target parts
    constant: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
pub struct NamespaceResolver {
    namespace: Vec<String>,
    aliases: AliasTables,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter_namespace(&mut self, name: Option<&Name>) {
        self.namespace = name.map(|n| n.parts.clone()).unwrap_or_default();
        self.aliases = AliasTables::default();
    }

    fn add_alias(&mut self, kind: UseKind, target: Vec<String>, alias: Option<&str>) {
        let alias = match alias {
            Some(a) => a.to_string(),
            None => match target.last() {
                Some(leaf) => leaf.clone(),
                None => return,
            },
        };
        match kind {
            UseKind::Normal => {
                self.aliases.class.insert(alias.to_ascii_lowercase(), target);
            }
            UseKind::Function => {
                self.aliases
                    .function
                    .insert(alias.to_ascii_lowercase(), target);
            }
            UseKind::Const => {
                self.aliases.constant.insert(alias, target);
            }
        }
    }

    fn prefixed(&self, parts: &[String]) -> Vec<String> {
        let mut out = self.namespace.clone();
        out.extend(parts.iter().cloned());
        out
    }

    /// Fully-qualified parts for a name used in `slot`
    fn resolve_parts(&self, name: &Name, slot: Slot) -> Vec<String> {
        match name.kind {
            NameKind::FullyQualified => name.parts.clone(),
            NameKind::Relative => self.prefixed(&name.parts),
            NameKind::Name => {
                let Some(first) = name.parts.first() else {
                    return Vec::new();
                };
                if slot == Slot::Class
                    && name.parts.len() == 1
                    && BUILTIN_CLASS_NAMES.contains(&first.to_ascii_lowercase().as_str())
                {
                    return name.parts.clone();
                }
                // Qualified names always resolve their first segment as a class/namespace alias
                let hit = if name.parts.len() > 1 {
                    self.aliases.class.get(&first.to_ascii_lowercase())
                } else {
                    match slot {
                        Slot::Class => self.aliases.class.get(&first.to_ascii_lowercase()),
                        Slot::Function => self.aliases.function.get(&first.to_ascii_lowercase()),
                        Slot::Const => self.aliases.constant.get(first),
                    }
                };
                match hit {
                    Some(target) => {
                        let mut out = target.clone();
                        out.extend(name.parts[1..].iter().cloned());
                        out
                    }
                    None => self.prefixed(&name.parts),
                }
            }
        }
    }

    fn resolve(&self, name: &mut Name, slot: Slot) {
        if slot == Slot::Class
            && name.kind == NameKind::Name
            && name.parts.len() == 1
            && BUILTIN_CLASS_NAMES.contains(&name.leaf().to_ascii_lowercase().as_str())
        {
            return;
        }
        name.parts = self.resolve_parts(name, slot);
        name.kind = NameKind::FullyQualified;
    }

    fn declare(&self, name: &mut Name) {
        if name.kind == NameKind::Name {
            name.parts = self.prefixed(&name.parts);
        }
        name.kind = NameKind::FullyQualified;
    }

    fn resolve_class_expr(&self, expr: &mut Expr) {
        if let ExprKind::Name(name) = &mut expr.kind {
            self.resolve(name, Slot::Class);
        }
    }

    fn resolve_type(&self, hint: &mut Option<TypeHint>) {
        fn walk(resolver: &NamespaceResolver, hint: &mut TypeHint) {
            match hint {
                TypeHint::Named { name, .. } => resolver.resolve(name, Slot::Class),
                TypeHint::Union(types) => {
                    for t in types {
                        walk(resolver, t);
                    }
                }
            }
        }
        if let Some(h) = hint {
            walk(self, h);
        }
    }

    fn resolve_params(&self, params: &mut [Param]) {
        for param in params {
            self.resolve_type(&mut param.type_hint);
        }
    }

    fn resolve_catches(&self, catches: &mut [Catch]) {
        for catch in catches {
            for ty in &mut catch.types {
                self.resolve(ty, Slot::Class);
            }
        }
    }
}

impl AstVisitor for NamespaceResolver {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match &mut stmt.kind {
            StmtKind::Namespace { name, .. } => self.enter_namespace(name.as_ref()),
            StmtKind::Use { kind, prefix, uses } => {
                for item in uses.iter() {
                    let mut target = prefix.as_ref().map(|p| p.parts.clone()).unwrap_or_default();
                    target.extend(item.name.parts.iter().cloned());
                    self.add_alias(item.kind.unwrap_or(*kind), target, item.alias.as_deref());
                }
            }
            StmtKind::Function(decl) => {
                self.declare(&mut decl.name);
                self.resolve_params(&mut decl.params);
                self.resolve_type(&mut decl.return_type);
            }
            StmtKind::Class(decl) => {
                self.declare(&mut decl.name);
                if let Some(parent) = &mut decl.extends {
                    self.resolve(parent, Slot::Class);
                }
                for iface in &mut decl.implements {
                    self.resolve(iface, Slot::Class);
                }
            }
            StmtKind::ClassMethod(decl) => {
                self.resolve_params(&mut decl.params);
                self.resolve_type(&mut decl.return_type);
            }
            StmtKind::PropertyList(list) => self.resolve_type(&mut list.type_hint),
            StmtKind::ConstList(consts) => {
                for c in consts {
                    self.declare(&mut c.name);
                }
            }
            StmtKind::TraitUse { traits, .. } => {
                for t in traits {
                    self.resolve(t, Slot::Class);
                }
            }
            StmtKind::Try { catches, .. } => self.resolve_catches(catches),
            _ => {}
        }
        Ok(())
    }

    fn leave_stmt(&mut self, stmt: &mut Stmt) -> Result<Vec<Stmt>> {
        // A braced namespace ends with its block
        if let StmtKind::Namespace { body: Some(_), .. } = stmt.kind {
            self.enter_namespace(None);
        }
        Ok(Vec::new())
    }

    fn enter_expr(&mut self, expr: &mut Expr) -> Result<()> {
        match &mut expr.kind {
            ExprKind::ConstFetch(name) => self.resolve(name, Slot::Const),
            ExprKind::Call { name, .. } => {
                if let ExprKind::Name(n) = &mut name.kind {
                    self.resolve(n, Slot::Function);
                }
            }
            ExprKind::New { class, .. }
            | ExprKind::StaticCall { class, .. }
            | ExprKind::StaticPropertyFetch { class, .. }
            | ExprKind::ClassConstFetch { class, .. }
            | ExprKind::InstanceOf { class, .. } => self.resolve_class_expr(class),
            ExprKind::Closure(decl) => {
                self.resolve_params(&mut decl.params);
                self.resolve_type(&mut decl.return_type);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::lowering::passes::traverser::traverse;
    use crate::features::parsing::ast::{Arg, UseItem};
    use crate::shared::models::Position;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind, Position::zero())
    }

    fn name_expr(text: &str) -> Box<Expr> {
        Box::new(Expr::new(
            ExprKind::Name(Name::parse(text, Position::zero())),
            Position::zero(),
        ))
    }

    fn call(text: &str) -> Stmt {
        stmt(StmtKind::Expr(Expr::new(
            ExprKind::Call {
                name: name_expr(text),
                args: vec![Arg::new(Expr::new(
                    ExprKind::New {
                        class: name_expr("Db"),
                        args: vec![],
                    },
                    Position::zero(),
                ))],
            },
            Position::zero(),
        )))
    }

    fn call_parts(stmt: &Stmt) -> (Vec<String>, Vec<String>) {
        let StmtKind::Expr(Expr {
            kind: ExprKind::Call { name, args },
            ..
        }) = &stmt.kind
        else {
            panic!("expected call");
        };
        let ExprKind::Name(f) = &name.kind else {
            panic!("expected name");
        };
        let ExprKind::New { class, .. } = &args[0].value.kind else {
            panic!("expected new");
        };
        let ExprKind::Name(c) = &class.kind else {
            panic!("expected class name");
        };
        (f.parts.clone(), c.parts.clone())
    }

    #[test]
    fn test_unaliased_names_get_namespace_prefix() {
        let mut stmts = vec![
            stmt(StmtKind::Namespace {
                name: Some(Name::parse("App", Position::zero())),
                body: None,
            }),
            call("helper"),
        ];
        traverse(&mut stmts, &mut NamespaceResolver::new()).unwrap();
        let (f, c) = call_parts(&stmts[1]);
        assert_eq!(f, vec!["App", "helper"]);
        assert_eq!(c, vec!["App", "Db"]);
    }

    #[test]
    fn test_use_alias_is_case_insensitive_for_classes() {
        let mut stmts = vec![
            stmt(StmtKind::Namespace {
                name: Some(Name::parse("App", Position::zero())),
                body: None,
            }),
            stmt(StmtKind::Use {
                kind: UseKind::Normal,
                prefix: None,
                uses: vec![UseItem {
                    name: Name::parse("Vendor\\Database", Position::zero()),
                    alias: Some("DB".into()),
                    kind: None,
                }],
            }),
            call("\\strlen"),
        ];
        traverse(&mut stmts, &mut NamespaceResolver::new()).unwrap();
        let (f, c) = call_parts(&stmts[2]);
        assert_eq!(f, vec!["strlen"]);
        assert_eq!(c, vec!["Vendor", "Database"]);
    }

    #[test]
    fn test_braced_namespace_resets_after_block() {
        let mut stmts = vec![
            stmt(StmtKind::Namespace {
                name: Some(Name::parse("A", Position::zero())),
                body: Some(vec![call("f")]),
            }),
            call("g"),
        ];
        traverse(&mut stmts, &mut NamespaceResolver::new()).unwrap();
        let StmtKind::Namespace {
            body: Some(body), ..
        } = &stmts[0].kind
        else {
            panic!("expected namespace");
        };
        assert_eq!(call_parts(&body[0]).0, vec!["A", "f"]);
        assert_eq!(call_parts(&stmts[1]).0, vec!["g"]);
    }

    #[test]
    fn test_builtin_class_names_untouched() {
        let resolver = NamespaceResolver {
            namespace: vec!["App".into()],
            aliases: AliasTables::default(),
        };
        let mut name = Name::simple("self");
        resolver.resolve(&mut name, Slot::Class);
        assert_eq!(name.parts, vec!["self"]);
        assert_eq!(name.kind, NameKind::Name);
    }
}
