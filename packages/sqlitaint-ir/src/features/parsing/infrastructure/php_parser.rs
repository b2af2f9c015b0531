//! Tree-sitter PHP parser
//!
//! This is where the tree-sitter dependency lives. The CST is converted into
//! the crate's own AST (`domain::ast`) in a single recursive pass.

use std::cell::Cell;

use tracing::debug;
use tree_sitter::{Node, Parser as TSParser};

use crate::errors::{AnalyzerError, Result};
use crate::features::parsing::domain::ast::*;
use crate::features::parsing::ports::Parser;
use crate::shared::models::Position;

/// Deepest expression nesting accepted; deeper files fail with a parse error
/// instead of exhausting the stack in later passes
pub const MAX_EXPR_DEPTH: usize = 10_000;

/// Tree-sitter based PHP parser
#[derive(Debug, Default, Clone, Copy)]
pub struct PhpParser;

impl PhpParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for PhpParser {
    fn parse(&self, source: &str, file_path: &str) -> Result<SourceFile> {
        let mut parser = TSParser::new();
        parser
            .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
            .map_err(|e| AnalyzerError::parse(file_path, format!("grammar: {}", e)))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalyzerError::parse(file_path, "tree-sitter returned None"))?;

        let root = tree.root_node();
        let converter = CstConverter {
            source,
            path: file_path,
            depth: Cell::new(0),
        };
        converter.check_top_level_errors(root)?;
        let stmts = converter.stmt_list(root)?;
        debug!(file = file_path, stmts = stmts.len(), "parsed");
        Ok(SourceFile::new(file_path, source, stmts))
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_ascii_lowercase().as_str(), "php" | "phtml" | "inc")
    }

    fn language_name(&self) -> &'static str {
        "php"
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CST → AST
// ═══════════════════════════════════════════════════════════════════════════

struct CstConverter<'s> {
    source: &'s str,
    path: &'s str,
    depth: Cell<usize>,
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn all_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn first_named<'t>(node: Node<'t>) -> Option<Node<'t>> {
    named_children(node).into_iter().next()
}

fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    all_children(node).iter().any(|c| c.kind() == kind)
}

fn position_of(node: Node<'_>) -> Position {
    let start = node.start_byte();
    let end = node.end_byte();
    Position::new(
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
        start,
        if end > start { end - 1 } else { start },
    )
}

impl<'s> CstConverter<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    fn fail(&self, node: Node<'_>, msg: &str) -> AnalyzerError {
        AnalyzerError::parse(
            self.path,
            format!(
                "{} at line {} ({})",
                msg,
                node.start_position().row + 1,
                node.kind()
            ),
        )
    }

    fn required<'t>(&self, node: Node<'t>, field: &str) -> Result<Node<'t>> {
        node.child_by_field_name(field)
            .ok_or_else(|| self.fail(node, &format!("missing '{}'", field)))
    }

    fn check_top_level_errors(&self, root: Node<'_>) -> Result<()> {
        if root.is_error() {
            return Err(self.fail(root, "unparseable file"));
        }
        for child in all_children(root) {
            if child.is_error() {
                return Err(self.fail(child, "syntax error"));
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Statements
    // ───────────────────────────────────────────────────────────────────────

    fn stmt_list(&self, node: Node<'_>) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        for child in named_children(node) {
            if let Some(stmt) = self.stmt(child)? {
                out.push(stmt);
            }
        }
        Ok(out)
    }

    /// Body of a control structure: compound, colon block or a single statement
    fn body(&self, node: Node<'_>) -> Result<Vec<Stmt>> {
        match node.kind() {
            "compound_statement" | "colon_block" | "declaration_list" | "switch_block" => {
                self.stmt_list(node)
            }
            _ => Ok(self.stmt(node)?.into_iter().collect()),
        }
    }

    fn stmt(&self, node: Node<'_>) -> Result<Option<Stmt>> {
        let pos = position_of(node);
        let kind = match node.kind() {
            "php_tag" | "comment" | "empty_statement" | "declare_statement" => return Ok(None),
            "text_interpolation" => StmtKind::InlineHtml(self.text(node).to_string()),
            "expression_statement" => {
                let inner = first_named(node).ok_or_else(|| self.fail(node, "empty expression"))?;
                if inner.kind() == "throw_expression" {
                    let thrown =
                        first_named(inner).ok_or_else(|| self.fail(inner, "empty throw"))?;
                    StmtKind::Throw(self.expr(thrown)?)
                } else {
                    StmtKind::Expr(self.expr(inner)?)
                }
            }
            "echo_statement" => {
                let mut exprs = Vec::new();
                for child in named_children(node) {
                    self.flatten_sequence(child, &mut exprs)?;
                }
                StmtKind::Echo(exprs)
            }
            "return_statement" => StmtKind::Return(self.optional_expr(first_named(node))?),
            "exit_statement" => StmtKind::Expr(Expr::new(
                ExprKind::Exit(self.optional_expr(first_named(node))?.map(Box::new)),
                pos,
            )),
            "compound_statement" => StmtKind::Block(self.stmt_list(node)?),
            "if_statement" => self.if_stmt(node)?,
            "while_statement" => StmtKind::While {
                cond: self.expr(self.required(node, "condition")?)?,
                body: self.body(self.required(node, "body")?)?,
            },
            "do_statement" => StmtKind::DoWhile {
                body: self.body(self.required(node, "body")?)?,
                cond: self.expr(self.required(node, "condition")?)?,
            },
            "for_statement" => self.for_stmt(node)?,
            "foreach_statement" => self.foreach_stmt(node)?,
            "switch_statement" => self.switch_stmt(node)?,
            "break_statement" => StmtKind::Break(self.optional_expr(first_named(node))?),
            "continue_statement" => StmtKind::Continue(self.optional_expr(first_named(node))?),
            "goto_statement" => StmtKind::Goto(self.label_name(node)?),
            "named_label_statement" => StmtKind::Label(self.label_name(node)?),
            "try_statement" => self.try_stmt(node)?,
            "global_declaration" => StmtKind::Global(
                named_children(node)
                    .into_iter()
                    .map(|c| self.expr(c))
                    .collect::<Result<_>>()?,
            ),
            "function_static_declaration" => {
                let mut vars = Vec::new();
                for decl in named_children(node) {
                    let name = self.required(decl, "name")?;
                    vars.push(StaticVar {
                        name: self.var_text(name),
                        default: self.optional_expr(decl.child_by_field_name("value"))?,
                        position: position_of(decl),
                    });
                }
                StmtKind::Static(vars)
            }
            "unset_statement" => StmtKind::Unset(
                named_children(node)
                    .into_iter()
                    .map(|c| self.expr(c))
                    .collect::<Result<_>>()?,
            ),
            "function_definition" => StmtKind::Function(FunctionDecl {
                name: Name::parse(self.text(self.required(node, "name")?), pos),
                params: self.params(node.child_by_field_name("parameters"))?,
                by_ref: has_child_kind(node, "reference_modifier"),
                return_type: self.type_hint(node.child_by_field_name("return_type")),
                body: self.body(self.required(node, "body")?)?,
            }),
            "class_declaration" | "interface_declaration" | "trait_declaration"
            | "enum_declaration" => StmtKind::Class(self.class_decl(node)?),
            "method_declaration" => StmtKind::ClassMethod(MethodDecl {
                name: self.text(self.required(node, "name")?).to_string(),
                modifiers: self.modifiers(node),
                params: self.params(node.child_by_field_name("parameters"))?,
                by_ref: has_child_kind(node, "reference_modifier"),
                return_type: self.type_hint(node.child_by_field_name("return_type")),
                body: match node.child_by_field_name("body") {
                    Some(body) => Some(self.body(body)?),
                    None => None,
                },
            }),
            "property_declaration" => StmtKind::PropertyList(self.property_list(node)?),
            "const_declaration" => {
                let consts = self.const_elements(node)?;
                if node
                    .parent()
                    .map_or(false, |p| p.kind() == "declaration_list")
                {
                    StmtKind::ClassConstList(consts)
                } else {
                    StmtKind::ConstList(consts)
                }
            }
            "use_declaration" => {
                let mut traits = Vec::new();
                let mut adaptations = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "name" | "qualified_name" => {
                            traits.push(Name::parse(self.text(child), position_of(child)))
                        }
                        _ => adaptations.push(self.text(child).to_string()),
                    }
                }
                StmtKind::TraitUse {
                    traits,
                    adaptations,
                }
            }
            "namespace_definition" => StmtKind::Namespace {
                name: node
                    .child_by_field_name("name")
                    .map(|n| Name::parse(self.text(n), position_of(n))),
                body: match node.child_by_field_name("body") {
                    Some(body) => Some(self.stmt_list(body)?),
                    None => None,
                },
            },
            "namespace_use_declaration" => self.use_decl(node)?,
            "ERROR" => {
                debug!(file = self.path, line = pos.start_line, "skipping nested ERROR node");
                return Ok(None);
            }
            other => {
                debug!(file = self.path, kind = other, "unsupported statement");
                return Ok(None);
            }
        };
        Ok(Some(Stmt::new(kind, pos)))
    }

    fn label_name(&self, node: Node<'_>) -> Result<String> {
        let name = first_named(node).ok_or_else(|| self.fail(node, "missing label"))?;
        Ok(self.text(name).to_string())
    }

    fn if_stmt(&self, node: Node<'_>) -> Result<StmtKind> {
        let cond = self.expr(self.required(node, "condition")?)?;
        let then_branch = self.body(self.required(node, "body")?)?;
        let mut elseifs = Vec::new();
        let mut else_branch = None;
        for child in named_children(node) {
            match child.kind() {
                "else_if_clause" => elseifs.push(ElseIf {
                    cond: self.expr(self.required(child, "condition")?)?,
                    body: self.body(self.required(child, "body")?)?,
                    position: position_of(child),
                }),
                "else_clause" => {
                    else_branch = Some(self.body(self.required(child, "body")?)?);
                }
                _ => {}
            }
        }
        Ok(StmtKind::If {
            cond,
            then_branch,
            elseifs,
            else_branch,
        })
    }

    /// `for (init; cond; step)`: sections are split on the `;` tokens
    fn for_stmt(&self, node: Node<'_>) -> Result<StmtKind> {
        let mut sections: [Vec<Expr>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        let mut section = 0usize;
        let mut inside = false;
        let body_node = node.child_by_field_name("body");
        for child in all_children(node) {
            match child.kind() {
                "(" if !inside => inside = true,
                ")" if inside && section == 2 => inside = false,
                ";" if inside => section = (section + 1).min(2),
                _ if inside && child.is_named() => {
                    let mut exprs = Vec::new();
                    self.flatten_sequence(child, &mut exprs)?;
                    sections[section].extend(exprs);
                }
                _ => {}
            }
        }
        let body_node = match body_node {
            Some(b) => b,
            None => named_children(node)
                .into_iter()
                .last()
                .ok_or_else(|| self.fail(node, "missing for body"))?,
        };
        let [init, cond, step] = sections;
        Ok(StmtKind::For {
            init,
            cond,
            step,
            body: self.body(body_node)?,
        })
    }

    fn foreach_stmt(&self, node: Node<'_>) -> Result<StmtKind> {
        let children = named_children(node);
        if children.len() < 3 {
            return Err(self.fail(node, "malformed foreach"));
        }
        let expr = self.expr(children[0])?;
        let binding = children[1];
        let body_node = node
            .child_by_field_name("body")
            .unwrap_or(children[children.len() - 1]);

        let (key, value_node) = if binding.kind() == "pair" {
            let parts = named_children(binding);
            if parts.len() != 2 {
                return Err(self.fail(binding, "malformed foreach pair"));
            }
            (Some(self.expr(parts[0])?), parts[1])
        } else {
            (None, binding)
        };
        let (by_ref, value_node) = if value_node.kind() == "by_ref" {
            let inner = first_named(value_node).ok_or_else(|| self.fail(value_node, "empty &"))?;
            (true, inner)
        } else {
            (false, value_node)
        };
        Ok(StmtKind::Foreach {
            expr,
            key,
            value: self.expr(value_node)?,
            by_ref,
            body: self.body(body_node)?,
        })
    }

    fn switch_stmt(&self, node: Node<'_>) -> Result<StmtKind> {
        let cond = self.expr(self.required(node, "condition")?)?;
        let block = self.required(node, "body")?;
        let mut cases = Vec::new();
        for child in named_children(block) {
            match child.kind() {
                "case_statement" => {
                    let value = self.required(child, "value")?;
                    let mut body = Vec::new();
                    for stmt in named_children(child) {
                        if stmt.id() == value.id() {
                            continue;
                        }
                        if let Some(s) = self.stmt(stmt)? {
                            body.push(s);
                        }
                    }
                    cases.push(Case {
                        cond: Some(self.expr(value)?),
                        body,
                        position: position_of(child),
                    });
                }
                "default_statement" => cases.push(Case {
                    cond: None,
                    body: self.stmt_list(child)?,
                    position: position_of(child),
                }),
                _ => {}
            }
        }
        Ok(StmtKind::Switch { cond, cases })
    }

    fn try_stmt(&self, node: Node<'_>) -> Result<StmtKind> {
        let body = self.body(self.required(node, "body")?)?;
        let mut catches = Vec::new();
        let mut finally = None;
        for child in named_children(node) {
            match child.kind() {
                "catch_clause" => {
                    let types = match child.child_by_field_name("type") {
                        Some(list) => named_children(list)
                            .into_iter()
                            .map(|t| Name::parse(self.text(t), position_of(t)))
                            .collect(),
                        None => Vec::new(),
                    };
                    catches.push(Catch {
                        types,
                        var: child
                            .child_by_field_name("name")
                            .map(|n| self.var_text(n)),
                        body: self.body(self.required(child, "body")?)?,
                    });
                }
                "finally_clause" => {
                    finally = Some(self.body(self.required(child, "body")?)?);
                }
                _ => {}
            }
        }
        Ok(StmtKind::Try {
            body,
            catches,
            finally,
        })
    }

    fn class_decl(&self, node: Node<'_>) -> Result<ClassDecl> {
        let kind = match node.kind() {
            "interface_declaration" => ClassKind::Interface,
            "trait_declaration" => ClassKind::Trait,
            _ => ClassKind::Class,
        };
        let name_node = self.required(node, "name")?;
        let mut extends = None;
        let mut implements = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "base_clause" => {
                    let names: Vec<Name> = named_children(child)
                        .into_iter()
                        .map(|n| Name::parse(self.text(n), position_of(n)))
                        .collect();
                    if kind == ClassKind::Interface {
                        implements.extend(names);
                    } else {
                        extends = names.into_iter().next();
                    }
                }
                "class_interface_clause" => implements.extend(
                    named_children(child)
                        .into_iter()
                        .map(|n| Name::parse(self.text(n), position_of(n))),
                ),
                _ => {}
            }
        }
        let body = match node.child_by_field_name("body") {
            Some(b) => self.stmt_list(b)?,
            None => Vec::new(),
        };
        Ok(ClassDecl {
            kind,
            name: Name::parse(self.text(name_node), position_of(name_node)),
            modifiers: self.modifiers(node),
            extends,
            implements,
            body,
        })
    }

    fn modifiers(&self, node: Node<'_>) -> Modifiers {
        let mut bits = 0;
        for child in all_children(node) {
            match child.kind() {
                "visibility_modifier" | "static_modifier" | "abstract_modifier"
                | "final_modifier" | "readonly_modifier" => {
                    bits |= Modifiers::from_keyword(self.text(child).trim());
                }
                _ => {}
            }
        }
        Modifiers(bits)
    }

    fn property_list(&self, node: Node<'_>) -> Result<PropertyList> {
        let mut props = Vec::new();
        for element in named_children(node) {
            if element.kind() != "property_element" {
                continue;
            }
            let name = self.required(element, "name")?;
            let default = match element.child_by_field_name("default_value") {
                Some(v) => Some(self.expr(v)?),
                None => match named_children(element)
                    .into_iter()
                    .find(|c| c.kind() == "property_initializer")
                    .and_then(first_named)
                {
                    Some(v) => Some(self.expr(v)?),
                    None => None,
                },
            };
            props.push(PropertyDecl {
                name: self.var_text(name),
                default,
                position: position_of(element),
            });
        }
        Ok(PropertyList {
            modifiers: self.modifiers(node),
            type_hint: self.type_hint(node.child_by_field_name("type")),
            props,
        })
    }

    fn const_elements(&self, node: Node<'_>) -> Result<Vec<ConstDecl>> {
        let mut consts = Vec::new();
        for element in named_children(node) {
            if element.kind() != "const_element" {
                continue;
            }
            let parts = named_children(element);
            if parts.len() < 2 {
                return Err(self.fail(element, "malformed const"));
            }
            consts.push(ConstDecl {
                name: Name::parse(self.text(parts[0]), position_of(parts[0])),
                value: self.expr(parts[parts.len() - 1])?,
                position: position_of(element),
            });
        }
        Ok(consts)
    }

    /// `use function ...` / `use const ...` keyword before the first clause
    fn use_kind_of(&self, node: Node<'_>) -> Option<UseKind> {
        for child in all_children(node) {
            if child.is_named() {
                break;
            }
            match self.text(child).to_ascii_lowercase().as_str() {
                "function" => return Some(UseKind::Function),
                "const" => return Some(UseKind::Const),
                _ => {}
            }
        }
        None
    }

    fn use_decl(&self, node: Node<'_>) -> Result<StmtKind> {
        let kind = self.use_kind_of(node).unwrap_or(UseKind::Normal);
        let mut prefix = None;
        let mut uses = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "namespace_use_clause" => uses.push(self.use_clause(child)),
                "namespace_name" => prefix = Some(Name::parse(self.text(child), position_of(child))),
                "namespace_use_group" => {
                    for clause in named_children(child) {
                        uses.push(self.use_clause(clause));
                    }
                }
                _ => {}
            }
        }
        Ok(StmtKind::Use { kind, prefix, uses })
    }

    fn use_clause(&self, clause: Node<'_>) -> UseItem {
        let mut name = None;
        let mut alias = clause
            .child_by_field_name("alias")
            .map(|a| self.text(a).to_string());
        for child in named_children(clause) {
            match child.kind() {
                "name" | "qualified_name" | "namespace_name" if name.is_none() => {
                    name = Some(Name::parse(self.text(child), position_of(child)));
                }
                "name" if alias.is_none() => alias = Some(self.text(child).to_string()),
                "namespace_aliasing_clause" => {
                    alias = first_named(child).map(|a| self.text(a).to_string());
                }
                _ => {}
            }
        }
        UseItem {
            name: name.unwrap_or_else(|| Name::parse(self.text(clause), position_of(clause))),
            alias,
            kind: self.use_kind_of(clause),
        }
    }

    fn params(&self, node: Option<Node<'_>>) -> Result<Vec<Param>> {
        let Some(node) = node else {
            return Ok(Vec::new());
        };
        let mut params = Vec::new();
        for p in named_children(node) {
            match p.kind() {
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter" => {
                    let name = self.required(p, "name")?;
                    params.push(Param {
                        name: self.var_text(name),
                        default: self.optional_expr(p.child_by_field_name("default_value"))?,
                        by_ref: has_child_kind(p, "reference_modifier")
                            || p.child_by_field_name("reference_modifier").is_some(),
                        variadic: p.kind() == "variadic_parameter",
                        type_hint: self.type_hint(p.child_by_field_name("type")),
                        position: position_of(p),
                    });
                }
                _ => {}
            }
        }
        Ok(params)
    }

    fn type_hint(&self, node: Option<Node<'_>>) -> Option<TypeHint> {
        let node = node?;
        match node.kind() {
            "optional_type" => match self.type_hint(first_named(node))? {
                TypeHint::Named { name, .. } => Some(TypeHint::Named {
                    name,
                    nullable: true,
                }),
                other => Some(other),
            },
            "union_type" | "intersection_type" | "disjunctive_normal_form_type" => {
                let members: Vec<TypeHint> = named_children(node)
                    .into_iter()
                    .filter_map(|c| self.type_hint(Some(c)))
                    .collect();
                Some(TypeHint::Union(members))
            }
            "named_type" if named_children(node).len() == 1 => self.type_hint(first_named(node)),
            _ => Some(TypeHint::Named {
                name: Name::parse(self.text(node).trim(), position_of(node)),
                nullable: false,
            }),
        }
    }

    /// Variable name text without the leading `$`
    fn var_text(&self, node: Node<'_>) -> String {
        self.text(node).trim_start_matches('$').to_string()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────

    fn optional_expr(&self, node: Option<Node<'_>>) -> Result<Option<Expr>> {
        match node {
            Some(n) => Ok(Some(self.expr(n)?)),
            None => Ok(None),
        }
    }

    fn flatten_sequence(&self, node: Node<'_>, out: &mut Vec<Expr>) -> Result<()> {
        if node.kind() == "sequence_expression" {
            for child in named_children(node) {
                self.flatten_sequence(child, out)?;
            }
        } else {
            out.push(self.expr(node)?);
        }
        Ok(())
    }

    fn boxed(&self, node: Node<'_>) -> Result<Box<Expr>> {
        Ok(Box::new(self.expr(node)?))
    }

    fn expr(&self, node: Node<'_>) -> Result<Expr> {
        let depth = self.depth.get();
        self.enter(node, 1)?;
        let expr = self.expr_kind(node);
        self.depth.set(depth);
        expr
    }

    /// Account for `levels` more nesting below the current expression
    fn enter(&self, node: Node<'_>, levels: usize) -> Result<()> {
        let depth = self.depth.get() + levels;
        if depth > MAX_EXPR_DEPTH {
            return Err(self.fail(node, "expression nested too deeply"));
        }
        self.depth.set(depth);
        Ok(())
    }

    /// Left-associative chains (`a . b . c ...`) are walked down their left
    /// spine in a loop and rebuilt bottom-up
    fn binary_chain(&self, node: Node<'_>) -> Result<Expr> {
        let mut spine = Vec::new();
        let mut current = node;
        while current.kind() == "binary_expression" {
            let op_node = self.required(current, "operator")?;
            let token = self.text(op_node);
            if token.eq_ignore_ascii_case("instanceof") {
                break;
            }
            let op = BinaryOp::from_token(token)
                .ok_or_else(|| self.fail(op_node, "unknown binary operator"))?;
            spine.push((op, self.required(current, "right")?, position_of(current)));
            current = self.required(current, "left")?;
        }
        self.enter(node, spine.len().saturating_sub(1))?;

        let mut expr = if current.kind() == "binary_expression" {
            self.instance_of(current)?
        } else {
            self.expr(current)?
        };
        for (op, right, pos) in spine.into_iter().rev() {
            let right = self.expr(right)?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                pos,
            );
        }
        Ok(expr)
    }

    fn instance_of(&self, node: Node<'_>) -> Result<Expr> {
        let kind = ExprKind::InstanceOf {
            expr: self.boxed(self.required(node, "left")?)?,
            class: Box::new(self.class_ref(self.required(node, "right")?)?),
        };
        Ok(Expr::new(kind, position_of(node)))
    }

    fn expr_kind(&self, node: Node<'_>) -> Result<Expr> {
        let pos = position_of(node);
        let kind = match node.kind() {
            "parenthesized_expression" => {
                let inner = first_named(node).ok_or_else(|| self.fail(node, "empty parens"))?;
                return self.expr(inner);
            }
            "variable_name" => ExprKind::Variable(VarName::Named(self.var_text(node))),
            "dynamic_variable_name" => {
                let inner = first_named(node).ok_or_else(|| self.fail(node, "empty $$"))?;
                ExprKind::Variable(VarName::Dynamic(self.boxed(inner)?))
            }
            "integer" => ExprKind::Literal(parse_int(self.text(node))),
            "float" => ExprKind::Literal(Literal::Float(
                self.text(node).replace('_', "").parse().unwrap_or(0.0),
            )),
            "boolean" => ExprKind::Literal(Literal::Bool(
                self.text(node).eq_ignore_ascii_case("true"),
            )),
            "null" => ExprKind::Literal(Literal::Null),
            "string" => ExprKind::Literal(Literal::String(unquote_single(self.text(node)))),
            "encapsed_string" | "heredoc" | "nowdoc" => self.interpolated(node)?,
            "shell_command_expression" => match self.interpolated(node)? {
                ExprKind::Interpolated(parts) => ExprKind::ShellExec(parts),
                lit => ExprKind::ShellExec(vec![Expr::new(lit, pos)]),
            },
            "name" | "qualified_name" => {
                let text = self.text(node);
                match MagicConst::from_name(text) {
                    Some(magic) => ExprKind::MagicConst(magic),
                    None => ExprKind::ConstFetch(Name::parse(text, pos)),
                }
            }
            "relative_scope" | "named_type" | "primitive_type" => {
                ExprKind::Name(Name::parse(self.text(node).trim(), pos))
            }
            "assignment_expression" => {
                let left = self.required(node, "left")?;
                ExprKind::Assign {
                    var: self.boxed(left)?,
                    expr: self.boxed(self.required(node, "right")?)?,
                }
            }
            "reference_assignment_expression" => ExprKind::AssignRef {
                var: self.boxed(self.required(node, "left")?)?,
                expr: self.boxed(self.required(node, "right")?)?,
            },
            "augmented_assignment_expression" => {
                let op_node = self.required(node, "operator")?;
                let token = self.text(op_node);
                let op = BinaryOp::from_token(token.strip_suffix('=').unwrap_or(token))
                    .ok_or_else(|| self.fail(op_node, "unknown compound operator"))?;
                ExprKind::AssignOp {
                    op,
                    var: self.boxed(self.required(node, "left")?)?,
                    expr: self.boxed(self.required(node, "right")?)?,
                }
            }
            "binary_expression" => return self.binary_chain(node),
            "unary_op_expression" => {
                let operand = named_children(node)
                    .into_iter()
                    .last()
                    .ok_or_else(|| self.fail(node, "missing operand"))?;
                let token = all_children(node)
                    .into_iter()
                    .find(|c| !c.is_named())
                    .map(|c| self.text(c))
                    .unwrap_or("");
                let op = match token {
                    "!" => UnaryOp::BooleanNot,
                    "-" => UnaryOp::UnaryMinus,
                    "+" => UnaryOp::UnaryPlus,
                    "~" => UnaryOp::BitwiseNot,
                    _ => return Err(self.fail(node, "unknown unary operator")),
                };
                ExprKind::Unary {
                    op,
                    expr: self.boxed(operand)?,
                }
            }
            "update_expression" => {
                let children = all_children(node);
                let prefix = children
                    .first()
                    .map_or(false, |c| matches!(self.text(*c), "++" | "--"));
                let operand = first_named(node).ok_or_else(|| self.fail(node, "missing operand"))?;
                ExprKind::IncDec {
                    increment: self.text(node).contains("++"),
                    prefix,
                    var: self.boxed(operand)?,
                }
            }
            "cast_expression" => {
                let children = named_children(node);
                let type_node = node
                    .child_by_field_name("type")
                    .or_else(|| children.first().copied())
                    .ok_or_else(|| self.fail(node, "missing cast type"))?;
                let value = node
                    .child_by_field_name("value")
                    .or_else(|| children.last().copied())
                    .ok_or_else(|| self.fail(node, "missing cast value"))?;
                let kind = CastKind::from_keyword(self.text(type_node).trim_matches(|c| c == '(' || c == ')'))
                    .ok_or_else(|| self.fail(type_node, "unknown cast"))?;
                ExprKind::Cast {
                    kind,
                    expr: self.boxed(value)?,
                }
            }
            "conditional_expression" => ExprKind::Ternary {
                cond: self.boxed(self.required(node, "condition")?)?,
                if_true: match node.child_by_field_name("body") {
                    Some(b) => Some(self.boxed(b)?),
                    None => None,
                },
                if_false: self.boxed(self.required(node, "alternative")?)?,
            },
            "member_access_expression" | "nullsafe_member_access_expression" => {
                ExprKind::PropertyFetch {
                    var: self.boxed(self.required(node, "object")?)?,
                    name: Box::new(self.member_name(self.required(node, "name")?)?),
                    nullsafe: node.kind().starts_with("nullsafe"),
                }
            }
            "member_call_expression" | "nullsafe_member_call_expression" => ExprKind::MethodCall {
                var: self.boxed(self.required(node, "object")?)?,
                name: Box::new(self.member_name(self.required(node, "name")?)?),
                args: self.args(node.child_by_field_name("arguments"))?,
                nullsafe: node.kind().starts_with("nullsafe"),
            },
            "scoped_call_expression" => ExprKind::StaticCall {
                class: Box::new(self.class_ref(self.required(node, "scope")?)?),
                name: Box::new(self.member_name(self.required(node, "name")?)?),
                args: self.args(node.child_by_field_name("arguments"))?,
            },
            "scoped_property_access_expression" => ExprKind::StaticPropertyFetch {
                class: Box::new(self.class_ref(self.required(node, "scope")?)?),
                name: Box::new(self.member_name(self.required(node, "name")?)?),
            },
            "class_constant_access_expression" => {
                let parts = named_children(node);
                if parts.len() != 2 {
                    return Err(self.fail(node, "malformed class constant access"));
                }
                ExprKind::ClassConstFetch {
                    class: Box::new(self.class_ref(parts[0])?),
                    name: self.text(parts[1]).to_string(),
                }
            }
            "function_call_expression" => self.call(node)?,
            "object_creation_expression" => {
                let mut class = None;
                let mut args = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "arguments" => args = self.args(Some(child))?,
                        "anonymous_class" => {
                            class = Some(Expr::new(
                                ExprKind::Name(Name::simple("class@anonymous")),
                                position_of(child),
                            ));
                            args = self.args(
                                named_children(child)
                                    .into_iter()
                                    .find(|c| c.kind() == "arguments"),
                            )?;
                        }
                        _ if class.is_none() => class = Some(self.class_ref(child)?),
                        _ => {}
                    }
                }
                ExprKind::New {
                    class: Box::new(class.ok_or_else(|| self.fail(node, "missing class"))?),
                    args,
                }
            }
            "subscript_expression" => {
                let parts = named_children(node);
                let var = parts.first().ok_or_else(|| self.fail(node, "missing array"))?;
                ExprKind::ArrayDimFetch {
                    var: self.boxed(*var)?,
                    dim: match parts.get(1) {
                        Some(d) => Some(self.boxed(*d)?),
                        None => None,
                    },
                }
            }
            "array_creation_expression" => ExprKind::Array {
                items: self.array_items(node)?,
                is_list: false,
            },
            "list_literal" => ExprKind::Array {
                items: self.array_items(node)?,
                is_list: true,
            },
            "include_expression" | "include_once_expression" | "require_expression"
            | "require_once_expression" => {
                let keyword = node.kind().trim_end_matches("_expression");
                let inner = first_named(node).ok_or_else(|| self.fail(node, "empty include"))?;
                ExprKind::Include {
                    kind: IncludeKind::from_keyword(keyword).unwrap_or(IncludeKind::Include),
                    expr: self.boxed(inner)?,
                }
            }
            "print_intrinsic" => ExprKind::Unary {
                op: UnaryOp::Print,
                expr: self.boxed(first_named(node).ok_or_else(|| self.fail(node, "empty print"))?)?,
            },
            "clone_expression" => ExprKind::Unary {
                op: UnaryOp::Clone,
                expr: self.boxed(first_named(node).ok_or_else(|| self.fail(node, "empty clone"))?)?,
            },
            "error_suppression_expression" => ExprKind::ErrorSuppress(
                self.boxed(first_named(node).ok_or_else(|| self.fail(node, "empty @"))?)?,
            ),
            "anonymous_function" | "anonymous_function_creation_expression" => {
                ExprKind::Closure(self.closure(node)?)
            }
            "arrow_function" => {
                let body = self.required(node, "body")?;
                let body_expr = self.expr(body)?;
                ExprKind::Closure(ClosureDecl {
                    params: self.params(node.child_by_field_name("parameters"))?,
                    uses: Vec::new(),
                    by_ref: has_child_kind(node, "reference_modifier"),
                    is_static: has_child_kind(node, "static_modifier"),
                    return_type: self.type_hint(node.child_by_field_name("return_type")),
                    body: vec![Stmt::new(StmtKind::Return(Some(body_expr)), position_of(body))],
                    arrow: true,
                })
            }
            "yield_expression" => {
                let text = self.text(node);
                let inner = first_named(node);
                if text.len() > 5 && text[5..].trim_start().to_ascii_lowercase().starts_with("from") {
                    let inner = inner.ok_or_else(|| self.fail(node, "empty yield from"))?;
                    ExprKind::YieldFrom(self.boxed(inner)?)
                } else {
                    match inner {
                        Some(pair) if pair.kind() == "array_element_initializer" => {
                            let parts = named_children(pair);
                            if parts.len() == 2 {
                                ExprKind::Yield {
                                    key: Some(self.boxed(parts[0])?),
                                    value: Some(self.boxed(parts[1])?),
                                }
                            } else {
                                ExprKind::Yield {
                                    key: None,
                                    value: match parts.first() {
                                        Some(v) => Some(self.boxed(*v)?),
                                        None => None,
                                    },
                                }
                            }
                        }
                        Some(value) => ExprKind::Yield {
                            key: None,
                            value: Some(self.boxed(value)?),
                        },
                        None => ExprKind::Yield {
                            key: None,
                            value: None,
                        },
                    }
                }
            }
            "sequence_expression" => {
                let last = named_children(node)
                    .into_iter()
                    .last()
                    .ok_or_else(|| self.fail(node, "empty sequence"))?;
                return self.expr(last);
            }
            "by_ref" => {
                let inner = first_named(node).ok_or_else(|| self.fail(node, "empty &"))?;
                return self.expr(inner);
            }
            other => {
                debug!(file = self.path, kind = other, line = pos.start_line, "opaque expression");
                ExprKind::Literal(Literal::Null)
            }
        };
        Ok(Expr::new(kind, pos))
    }

    /// Class slot of `new`, `::` and `instanceof`
    fn class_ref(&self, node: Node<'_>) -> Result<Expr> {
        match node.kind() {
            "name" | "qualified_name" | "relative_scope" | "named_type" => Ok(Expr::new(
                ExprKind::Name(Name::parse(self.text(node).trim(), position_of(node))),
                position_of(node),
            )),
            _ => self.expr(node),
        }
    }

    /// Member slot of `->` and `::`
    fn member_name(&self, node: Node<'_>) -> Result<Expr> {
        match node.kind() {
            "name" => Ok(Expr::new(
                ExprKind::Identifier(self.text(node).to_string()),
                position_of(node),
            )),
            "variable_name" if node.parent().map_or(false, |p| {
                p.kind() == "scoped_property_access_expression"
            }) =>
            {
                Ok(Expr::new(
                    ExprKind::Identifier(self.var_text(node)),
                    position_of(node),
                ))
            }
            _ => self.expr(node),
        }
    }

    fn call(&self, node: Node<'_>) -> Result<ExprKind> {
        let function = self.required(node, "function")?;
        let args = self.args(node.child_by_field_name("arguments"))?;
        let callee = match function.kind() {
            "name" | "qualified_name" => {
                let name = Name::parse(self.text(function), position_of(function));
                match name.leaf().to_ascii_lowercase().as_str() {
                    "isset" if name.parts.len() == 1 => {
                        return Ok(ExprKind::Isset(args.into_iter().map(|a| a.value).collect()))
                    }
                    "empty" | "eval" if name.parts.len() == 1 => {
                        let op = if name.leaf().eq_ignore_ascii_case("empty") {
                            UnaryOp::Empty
                        } else {
                            UnaryOp::Eval
                        };
                        let arg = args
                            .into_iter()
                            .next()
                            .ok_or_else(|| self.fail(node, "missing argument"))?;
                        return Ok(ExprKind::Unary {
                            op,
                            expr: Box::new(arg.value),
                        });
                    }
                    "exit" | "die" if name.parts.len() == 1 => {
                        return Ok(ExprKind::Exit(
                            args.into_iter().next().map(|a| Box::new(a.value)),
                        ))
                    }
                    _ => Expr::new(ExprKind::Name(name), position_of(function)),
                }
            }
            _ => self.expr(function)?,
        };
        Ok(ExprKind::Call {
            name: Box::new(callee),
            args,
        })
    }

    fn args(&self, node: Option<Node<'_>>) -> Result<Vec<Arg>> {
        let Some(node) = node else {
            return Ok(Vec::new());
        };
        let mut args = Vec::new();
        for arg in named_children(node) {
            let (value, unpack) = match arg.kind() {
                "argument" => {
                    let value = named_children(arg)
                        .into_iter()
                        .last()
                        .ok_or_else(|| self.fail(arg, "empty argument"))?;
                    if value.kind() == "variadic_unpacking" {
                        let inner =
                            first_named(value).ok_or_else(|| self.fail(value, "empty ..."))?;
                        (inner, true)
                    } else {
                        (value, false)
                    }
                }
                "variadic_placeholder" => continue,
                _ => (arg, false),
            };
            args.push(Arg {
                value: self.expr(value)?,
                unpack,
            });
        }
        Ok(args)
    }

    fn array_items(&self, node: Node<'_>) -> Result<Vec<ArrayItem>> {
        let mut items = Vec::new();
        let mut pending_slot = true;
        for child in all_children(node) {
            if !child.is_named() {
                if self.text(child) == "," {
                    if pending_slot {
                        items.push(ArrayItem {
                            key: None,
                            value: None,
                            by_ref: false,
                            unpack: false,
                        });
                    }
                    pending_slot = true;
                }
                continue;
            }
            pending_slot = false;
            items.push(self.array_item(child)?);
        }
        // Trailing comma does not create a slot
        if let Some(last) = items.last() {
            if last.value.is_none() && last.key.is_none() && pending_slot {
                items.pop();
            }
        }
        Ok(items)
    }

    fn array_item(&self, node: Node<'_>) -> Result<ArrayItem> {
        if node.kind() != "array_element_initializer" {
            let (by_ref, value) = self.by_ref_value(node)?;
            return Ok(ArrayItem {
                key: None,
                value: Some(value),
                by_ref,
                unpack: false,
            });
        }
        let parts = named_children(node);
        let has_arrow = all_children(node).iter().any(|c| self.text(*c) == "=>");
        match (has_arrow, parts.as_slice()) {
            (true, [key, value]) => {
                let (by_ref, value) = self.by_ref_value(*value)?;
                Ok(ArrayItem {
                    key: Some(self.expr(*key)?),
                    value: Some(value),
                    by_ref,
                    unpack: false,
                })
            }
            (_, [value]) if value.kind() == "variadic_unpacking" => {
                let inner = first_named(*value).ok_or_else(|| self.fail(*value, "empty ..."))?;
                Ok(ArrayItem {
                    key: None,
                    value: Some(self.expr(inner)?),
                    by_ref: false,
                    unpack: true,
                })
            }
            (_, [value]) => {
                let (by_ref, value) = self.by_ref_value(*value)?;
                Ok(ArrayItem {
                    key: None,
                    value: Some(value),
                    by_ref,
                    unpack: false,
                })
            }
            _ => Err(self.fail(node, "malformed array element")),
        }
    }

    fn by_ref_value(&self, node: Node<'_>) -> Result<(bool, Expr)> {
        if node.kind() == "by_ref" {
            let inner = first_named(node).ok_or_else(|| self.fail(node, "empty &"))?;
            Ok((true, self.expr(inner)?))
        } else {
            Ok((false, self.expr(node)?))
        }
    }

    fn closure(&self, node: Node<'_>) -> Result<ClosureDecl> {
        let mut uses = Vec::new();
        for child in named_children(node) {
            if child.kind() != "anonymous_function_use_clause" {
                continue;
            }
            for var in named_children(child) {
                let (by_ref, var) = if var.kind() == "by_ref" {
                    (true, first_named(var).unwrap_or(var))
                } else {
                    (false, var)
                };
                uses.push(ClosureUse {
                    name: self.var_text(var),
                    by_ref,
                });
            }
        }
        Ok(ClosureDecl {
            params: self.params(node.child_by_field_name("parameters"))?,
            uses,
            by_ref: has_child_kind(node, "reference_modifier"),
            is_static: has_child_kind(node, "static_modifier"),
            return_type: self.type_hint(node.child_by_field_name("return_type")),
            body: self.body(self.required(node, "body")?)?,
            arrow: false,
        })
    }

    // ───────────────────────────────────────────────────────────────────────
    // Strings
    // ───────────────────────────────────────────────────────────────────────

    fn interpolated(&self, node: Node<'_>) -> Result<ExprKind> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut text_start: Option<Position> = None;
        self.collect_string_parts(node, &mut parts, &mut text, &mut text_start)?;
        flush_text(&mut parts, &mut text, &mut text_start);

        match parts.len() {
            0 => Ok(ExprKind::Literal(Literal::String(String::new()))),
            1 if matches!(parts[0].kind, ExprKind::Literal(_)) => Ok(parts.remove(0).kind),
            _ => Ok(ExprKind::Interpolated(parts)),
        }
    }

    fn collect_string_parts(
        &self,
        node: Node<'_>,
        parts: &mut Vec<Expr>,
        text: &mut String,
        text_start: &mut Option<Position>,
    ) -> Result<()> {
        for child in all_children(node) {
            match child.kind() {
                "string_content" | "string_value" | "nowdoc_string" | "string" => {
                    text_start.get_or_insert(position_of(child));
                    text.push_str(self.text(child));
                }
                "escape_sequence" => {
                    text_start.get_or_insert(position_of(child));
                    text.push_str(&decode_escape(self.text(child)));
                }
                "heredoc_body" | "nowdoc_body" => {
                    self.collect_string_parts(child, parts, text, text_start)?
                }
                "heredoc_start" | "heredoc_end" | "heredoc_start_newline" | "heredoc_end_newline" => {}
                _ if !child.is_named() => {}
                "subscript_expression" => {
                    flush_text(parts, text, text_start);
                    parts.push(self.string_subscript(child)?);
                }
                _ => {
                    flush_text(parts, text, text_start);
                    parts.push(self.expr(child)?);
                }
            }
        }
        Ok(())
    }

    /// `"$a[key]"`: a bare key inside a string is a string literal
    fn string_subscript(&self, node: Node<'_>) -> Result<Expr> {
        let parts = named_children(node);
        match parts.as_slice() {
            [var, dim] if dim.kind() == "name" => Ok(Expr::new(
                ExprKind::ArrayDimFetch {
                    var: self.boxed(*var)?,
                    dim: Some(Box::new(Expr::new(
                        ExprKind::Literal(Literal::String(self.text(*dim).to_string())),
                        position_of(*dim),
                    ))),
                },
                position_of(node),
            )),
            _ => self.expr(node),
        }
    }
}

fn flush_text(parts: &mut Vec<Expr>, text: &mut String, start: &mut Option<Position>) {
    if let Some(pos) = start.take() {
        parts.push(Expr::new(
            ExprKind::Literal(Literal::String(std::mem::take(text))),
            pos,
        ));
    }
}

fn parse_int(text: &str) -> Literal {
    let clean = text.replace('_', "");
    let lower = clean.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        i64::from_str_radix(&lower[1..], 8)
    } else {
        lower.parse::<i64>()
    };
    match parsed {
        Ok(v) => Literal::Int(v),
        // Integer overflow becomes a float in PHP
        Err(_) => Literal::Float(clean.parse().unwrap_or(0.0)),
    }
}

fn unquote_single(text: &str) -> String {
    let body = text
        .strip_prefix('b')
        .or_else(|| text.strip_prefix('B'))
        .unwrap_or(text);
    let body = body
        .strip_prefix('\'')
        .and_then(|b| b.strip_suffix('\''))
        .unwrap_or(body);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('\'') | Some('\\') => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

fn decode_escape(seq: &str) -> String {
    match seq {
        "\\n" => "\n".to_string(),
        "\\t" => "\t".to_string(),
        "\\r" => "\r".to_string(),
        "\\v" => "\u{0b}".to_string(),
        "\\e" => "\u{1b}".to_string(),
        "\\f" => "\u{0c}".to_string(),
        "\\\\" => "\\".to_string(),
        "\\$" => "$".to_string(),
        "\\\"" => "\"".to_string(),
        _ => {
            if let Some(hex) = seq.strip_prefix("\\x") {
                if let Ok(v) = u8::from_str_radix(hex, 16) {
                    return (v as char).to_string();
                }
            }
            if let Some(code) = seq.strip_prefix("\\u{").and_then(|s| s.strip_suffix('}')) {
                if let Some(c) = u32::from_str_radix(code, 16).ok().and_then(char::from_u32) {
                    return c.to_string();
                }
            }
            if let Some(oct) = seq.strip_prefix('\\') {
                if !oct.is_empty() && oct.chars().all(|c| ('0'..='7').contains(&c)) {
                    if let Ok(v) = u8::from_str_radix(oct, 8) {
                        return (v as char).to_string();
                    }
                }
            }
            seq.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SourceFile {
        PhpParser::new().parse(src, "test.php").unwrap()
    }

    fn first_expr(file: &SourceFile) -> &Expr {
        match &file.stmts[0].kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assignment_of_superglobal_fetch() {
        let file = parse("<?php $x = $_GET[\"q\"];");
        match &first_expr(&file).kind {
            ExprKind::Assign { var, expr } => {
                assert_eq!(var.kind, ExprKind::Variable(VarName::Named("x".into())));
                match &expr.kind {
                    ExprKind::ArrayDimFetch { var, dim } => {
                        assert_eq!(var.kind, ExprKind::Variable(VarName::Named("_GET".into())));
                        assert_eq!(
                            dim.as_ref().map(|d| d.kind.clone()),
                            Some(ExprKind::Literal(Literal::String("q".into())))
                        );
                    }
                    other => panic!("expected dim fetch, got {:?}", other),
                }
                assert_eq!(expr.position.slice(&file.source), "$_GET[\"q\"]");
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_call_name() {
        let file = parse("<?php mysql_query($x);");
        match &first_expr(&file).kind {
            ExprKind::Call { name, args } => {
                match &name.kind {
                    ExprKind::Name(name) => {
                        assert_eq!(name.parts, vec!["mysql_query".to_string()]);
                        assert_eq!(name.kind, NameKind::Name);
                        assert_eq!(name.position.slice(&file.source), "mysql_query");
                    }
                    other => panic!("expected name, got {:?}", other),
                }
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(first_expr(&file).position.slice(&file.source), "mysql_query($x)");
    }

    #[test]
    fn test_parse_if_else() {
        let file = parse("<?php if ($a) { echo 1; } elseif ($b) { echo 2; } else { echo 3; }");
        match &file.stmts[0].kind {
            StmtKind::If {
                then_branch,
                elseifs,
                else_branch,
                ..
            } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(elseifs.len(), 1);
                assert!(else_branch.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_and_class() {
        let file = parse(
            "<?php function f($a, &$b = 1) { return $a; }\nclass C extends B { public function m() { echo __CLASS__; } }",
        );
        match &file.stmts[0].kind {
            StmtKind::Function(decl) => {
                assert_eq!(decl.name.joined(), "f");
                assert_eq!(decl.params.len(), 2);
                assert!(decl.params[1].by_ref);
                assert!(decl.params[1].default.is_some());
            }
            other => panic!("expected function, got {:?}", other),
        }
        match &file.stmts[1].kind {
            StmtKind::Class(decl) => {
                assert_eq!(decl.name.joined(), "C");
                assert_eq!(decl.extends.as_ref().map(|n| n.joined()), Some("B".into()));
                assert!(matches!(decl.body[0].kind, StmtKind::ClassMethod(_)));
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_interpolated_string() {
        let file = parse("<?php $q = \"SELECT * FROM t WHERE id = $id\";");
        match &first_expr(&file).kind {
            ExprKind::Assign { expr, .. } => match &expr.kind {
                ExprKind::Interpolated(parts) => {
                    assert_eq!(parts.len(), 2);
                    assert!(matches!(parts[1].kind, ExprKind::Variable(_)));
                }
                other => panic!("expected interpolation, got {:?}", other),
            },
            other => panic!("expected assign, got {:?}", other),
        }
    }

    fn concat_chain(terms: usize) -> String {
        let mut src = String::from("<?php $q = 'a'");
        for _ in 1..terms {
            src.push_str(" . 'a'");
        }
        src.push_str(";");
        src
    }

    #[test]
    fn test_binary_chain_is_left_associative() {
        let file = parse("<?php $r = 1 - 2 - 3;");
        let ExprKind::Assign { expr, .. } = &first_expr(&file).kind else {
            panic!("expected assign");
        };
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                assert_eq!(*op, BinaryOp::Minus);
                assert_eq!(right.kind, ExprKind::Literal(Literal::Int(3)));
                assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Minus, .. }));
                assert_eq!(left.position.slice(&file.source), "1 - 2");
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_long_concat_chain_parses() {
        let file = parse(&concat_chain(1000));
        let ExprKind::Assign { expr, .. } = &first_expr(&file).kind else {
            panic!("expected assign");
        };
        let mut depth = 0;
        let mut current = expr.as_ref();
        while let ExprKind::Binary { op, left, .. } = &current.kind {
            assert_eq!(*op, BinaryOp::Concat);
            depth += 1;
            current = left.as_ref();
        }
        assert_eq!(depth, 999);
    }

    #[test]
    fn test_nesting_past_limit_is_parse_error() {
        let result = PhpParser::new().parse(&concat_chain(MAX_EXPR_DEPTH + 2), "deep.php");
        match result {
            Err(AnalyzerError::Parse { message, .. }) => {
                assert!(message.contains("nested too deeply"), "{}", message)
            }
            other => panic!("expected parse error, got {:?}", other.map(|f| f.stmts.len())),
        }
    }

    #[test]
    fn test_top_level_error_is_parse_failure() {
        let result = PhpParser::new().parse("<?php )))) ;", "bad.php");
        assert!(matches!(result, Err(AnalyzerError::Parse { .. })));
    }

    #[test]
    fn test_empty_file() {
        let file = parse("");
        assert!(file.stmts.is_empty());
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("0x1A"), Literal::Int(26));
        assert_eq!(parse_int("0b101"), Literal::Int(5));
        assert_eq!(parse_int("017"), Literal::Int(15));
        assert_eq!(parse_int("1_000"), Literal::Int(1000));
        assert!(matches!(parse_int("99999999999999999999"), Literal::Float(_)));
    }

    #[test]
    fn test_unquote_single() {
        assert_eq!(unquote_single("'it\\'s'"), "it's");
        assert_eq!(unquote_single("'a\\nb'"), "a\\nb");
    }
}
