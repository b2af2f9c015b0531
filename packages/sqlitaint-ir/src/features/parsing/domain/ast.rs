//! PHP abstract syntax tree
//!
//! The tree the pre-passes rewrite in place and the IR builder lowers.
//! Produced by `PhpParser` from a tree-sitter CST, or built by hand in tests.

use crate::shared::models::Position;

// ═══════════════════════════════════════════════════════════════════════════
// Names
// ═══════════════════════════════════════════════════════════════════════════

/// How a name was written in source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// `Foo\Bar`, subject to alias and namespace resolution
    Name,
    /// `\Foo\Bar`
    FullyQualified,
    /// `namespace\Foo`
    Relative,
}

/// Possibly qualified name
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub kind: NameKind,
    pub parts: Vec<String>,
    pub position: Position,
}

impl Name {
    pub fn new(kind: NameKind, parts: Vec<String>, position: Position) -> Self {
        Self {
            kind,
            parts,
            position,
        }
    }

    /// Parse `\A\B`, `namespace\A` or `A\B`
    pub fn parse(text: &str, position: Position) -> Self {
        let (kind, rest) = if let Some(rest) = text.strip_prefix('\\') {
            (NameKind::FullyQualified, rest)
        } else if text
            .get(..10)
            .map_or(false, |head| head.eq_ignore_ascii_case("namespace\\"))
        {
            (NameKind::Relative, &text[10..])
        } else {
            (NameKind::Name, text)
        };
        let parts = rest
            .split('\\')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(kind, parts, position)
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(NameKind::Name, vec![name.into()], Position::zero())
    }

    /// Parts joined with `\`, no leading separator
    pub fn joined(&self) -> String {
        self.parts.join("\\")
    }

    /// Last segment
    pub fn leaf(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    pub fn is_unqualified(&self) -> bool {
        self.kind == NameKind::Name && self.parts.len() == 1
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Statements
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Echo(Vec<Expr>),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        elseifs: Vec<ElseIf>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Expr>,
        cond: Vec<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Foreach {
        expr: Expr,
        key: Option<Expr>,
        value: Expr,
        by_ref: bool,
        body: Vec<Stmt>,
    },
    Switch {
        cond: Expr,
        cases: Vec<Case>,
    },
    /// `break N`; `None` means level 1
    Break(Option<Expr>),
    Continue(Option<Expr>),
    Goto(String),
    Label(String),
    Try {
        body: Vec<Stmt>,
        catches: Vec<Catch>,
        finally: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    Global(Vec<Expr>),
    Static(Vec<StaticVar>),
    Unset(Vec<Expr>),
    Function(FunctionDecl),
    Class(ClassDecl),
    ClassMethod(MethodDecl),
    PropertyList(PropertyList),
    ClassConstList(Vec<ConstDecl>),
    ConstList(Vec<ConstDecl>),
    TraitUse {
        traits: Vec<Name>,
        adaptations: Vec<String>,
    },
    /// `body` is `None` for the unbraced form, which covers the following statements
    Namespace {
        name: Option<Name>,
        body: Option<Vec<Stmt>>,
    },
    Use {
        kind: UseKind,
        prefix: Option<Name>,
        uses: Vec<UseItem>,
    },
    InlineHtml(String),
    Block(Vec<Stmt>),
    Nop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub position: Position,
}

/// `case X:` or `default:` (`cond == None`)
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub cond: Option<Expr>,
    pub body: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catch {
    pub types: Vec<Name>,
    pub var: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticVar {
    pub name: String,
    pub default: Option<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Normal,
    Function,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseItem {
    pub name: Name,
    pub alias: Option<String>,
    /// Per-item kind inside a mixed group use
    pub kind: Option<UseKind>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Declarations
// ═══════════════════════════════════════════════════════════════════════════

/// Modifier bits shared by classes, methods, properties and constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(pub u32);

impl Modifiers {
    pub const PUBLIC: u32 = 1;
    pub const PROTECTED: u32 = 1 << 1;
    pub const PRIVATE: u32 = 1 << 2;
    pub const STATIC: u32 = 1 << 3;
    pub const ABSTRACT: u32 = 1 << 4;
    pub const FINAL: u32 = 1 << 5;
    pub const READONLY: u32 = 1 << 6;

    pub fn from_keyword(word: &str) -> u32 {
        match word.to_ascii_lowercase().as_str() {
            "public" => Self::PUBLIC,
            "protected" => Self::PROTECTED,
            "private" => Self::PRIVATE,
            "static" => Self::STATIC,
            "abstract" => Self::ABSTRACT,
            "final" => Self::FINAL,
            "readonly" => Self::READONLY,
            _ => 0,
        }
    }

    pub fn has(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Named { name: Name, nullable: bool },
    Union(Vec<TypeHint>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub by_ref: bool,
    pub variadic: bool,
    pub type_hint: Option<TypeHint>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Name,
    pub params: Vec<Param>,
    pub by_ref: bool,
    pub return_type: Option<TypeHint>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub kind: ClassKind,
    pub name: Name,
    pub modifiers: Modifiers,
    pub extends: Option<Name>,
    pub implements: Vec<Name>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub params: Vec<Param>,
    pub by_ref: bool,
    pub return_type: Option<TypeHint>,
    /// `None` for abstract and interface methods
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyList {
    pub modifiers: Modifiers,
    pub type_hint: Option<TypeHint>,
    pub props: Vec<PropertyDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub default: Option<Expr>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: Name,
    pub value: Expr,
    pub position: Position,
}

// ═══════════════════════════════════════════════════════════════════════════
// Expressions
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarName {
    /// `$name` (stored without the `$`)
    Named(String),
    /// `$$expr` / `${expr}`
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicConst {
    Class,
    Trait,
    Namespace,
    Function,
    Method,
    Line,
    File,
    Dir,
}

impl MagicConst {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "__CLASS__" => Some(Self::Class),
            "__TRAIT__" => Some(Self::Trait),
            "__NAMESPACE__" => Some(Self::Namespace),
            "__FUNCTION__" => Some(Self::Function),
            "__METHOD__" => Some(Self::Method),
            "__LINE__" => Some(Self::Line),
            "__FILE__" => Some(Self::File),
            "__DIR__" => Some(Self::Dir),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Coalesce,
    Concat,
    Div,
    Equal,
    Greater,
    GreaterOrEqual,
    Identical,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Minus,
    Mod,
    Mul,
    NotEqual,
    NotIdentical,
    Plus,
    Pow,
    ShiftLeft,
    ShiftRight,
    Smaller,
    SmallerOrEqual,
    Spaceship,
}

impl BinaryOp {
    /// Operator token (assignment forms strip the trailing `=` first)
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token.to_ascii_lowercase().as_str() {
            "&" => Self::BitwiseAnd,
            "|" => Self::BitwiseOr,
            "^" => Self::BitwiseXor,
            "??" => Self::Coalesce,
            "." => Self::Concat,
            "/" => Self::Div,
            "==" => Self::Equal,
            ">" => Self::Greater,
            ">=" => Self::GreaterOrEqual,
            "===" => Self::Identical,
            "&&" | "and" => Self::LogicalAnd,
            "||" | "or" => Self::LogicalOr,
            "xor" => Self::LogicalXor,
            "-" => Self::Minus,
            "%" => Self::Mod,
            "*" => Self::Mul,
            "!=" | "<>" => Self::NotEqual,
            "!==" => Self::NotIdentical,
            "+" => Self::Plus,
            "**" => Self::Pow,
            "<<" => Self::ShiftLeft,
            ">>" => Self::ShiftRight,
            "<" => Self::Smaller,
            "<=" => Self::SmallerOrEqual,
            "<=>" => Self::Spaceship,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
            Self::Coalesce => "??",
            Self::Concat => ".",
            Self::Div => "/",
            Self::Equal => "==",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Identical => "===",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::LogicalXor => "xor",
            Self::Minus => "-",
            Self::Mod => "%",
            Self::Mul => "*",
            Self::NotEqual => "!=",
            Self::NotIdentical => "!==",
            Self::Plus => "+",
            Self::Pow => "**",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Smaller => "<",
            Self::SmallerOrEqual => "<=",
            Self::Spaceship => "<=>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    BitwiseNot,
    BooleanNot,
    UnaryMinus,
    UnaryPlus,
    Print,
    Clone,
    Empty,
    Eval,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::BitwiseNot => "~",
            Self::BooleanNot => "!",
            Self::UnaryMinus => "-",
            Self::UnaryPlus => "+",
            Self::Print => "print",
            Self::Clone => "clone",
            Self::Empty => "empty",
            Self::Eval => "eval",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Array,
    Bool,
    Double,
    Int,
    Object,
    String,
    Unset,
}

impl CastKind {
    /// `(int)`, `(integer)`, `(string)`, `(binary)`...
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.trim().to_ascii_lowercase().as_str() {
            "array" => Self::Array,
            "bool" | "boolean" => Self::Bool,
            "float" | "double" | "real" => Self::Double,
            "int" | "integer" => Self::Int,
            "object" => Self::Object,
            "string" | "binary" => Self::String,
            "unset" => Self::Unset,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Bool => "bool",
            Self::Double => "double",
            Self::Int => "int",
            Self::Object => "object",
            Self::String => "string",
            Self::Unset => "unset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

impl IncludeKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "include" => Self::Include,
            "include_once" => Self::IncludeOnce,
            "require" => Self::Require,
            "require_once" => Self::RequireOnce,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::IncludeOnce => "include_once",
            Self::Require => "require",
            Self::RequireOnce => "require_once",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    /// `None` for skipped slots in `list(, $b)`
    pub value: Option<Expr>,
    pub by_ref: bool,
    pub unpack: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub value: Expr,
    pub unpack: bool,
}

impl Arg {
    pub fn new(value: Expr) -> Self {
        Self {
            value,
            unpack: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosureUse {
    pub name: String,
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosureDecl {
    pub params: Vec<Param>,
    pub uses: Vec<ClosureUse>,
    pub by_ref: bool,
    pub is_static: bool,
    pub return_type: Option<TypeHint>,
    pub body: Vec<Stmt>,
    /// `fn($x) => expr`; body holds a single return
    pub arrow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Variable(VarName),
    Literal(Literal),
    /// Double-quoted string or heredoc with embedded expressions
    Interpolated(Vec<Expr>),
    ConstFetch(Name),
    MagicConst(MagicConst),
    /// Class-name slot (`new X`, `X::m()`, `instanceof X`) or call target
    Name(Name),
    /// Member name slot (`->name`, `::name`)
    Identifier(String),
    Array {
        items: Vec<ArrayItem>,
        /// `list(...)` syntax
        is_list: bool,
    },
    ArrayDimFetch {
        var: Box<Expr>,
        dim: Option<Box<Expr>>,
    },
    PropertyFetch {
        var: Box<Expr>,
        name: Box<Expr>,
        nullsafe: bool,
    },
    StaticPropertyFetch {
        class: Box<Expr>,
        name: Box<Expr>,
    },
    ClassConstFetch {
        class: Box<Expr>,
        name: String,
    },
    Assign {
        var: Box<Expr>,
        expr: Box<Expr>,
    },
    AssignRef {
        var: Box<Expr>,
        expr: Box<Expr>,
    },
    AssignOp {
        op: BinaryOp,
        var: Box<Expr>,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Cast {
        kind: CastKind,
        expr: Box<Expr>,
    },
    IncDec {
        increment: bool,
        prefix: bool,
        var: Box<Expr>,
    },
    Call {
        name: Box<Expr>,
        args: Vec<Arg>,
    },
    MethodCall {
        var: Box<Expr>,
        name: Box<Expr>,
        args: Vec<Arg>,
        nullsafe: bool,
    },
    StaticCall {
        class: Box<Expr>,
        name: Box<Expr>,
        args: Vec<Arg>,
    },
    New {
        class: Box<Expr>,
        args: Vec<Arg>,
    },
    Closure(ClosureDecl),
    Include {
        kind: IncludeKind,
        expr: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        class: Box<Expr>,
    },
    Isset(Vec<Expr>),
    Exit(Option<Box<Expr>>),
    ErrorSuppress(Box<Expr>),
    Ternary {
        cond: Box<Expr>,
        if_true: Option<Box<Expr>>,
        if_false: Box<Expr>,
    },
    Yield {
        key: Option<Box<Expr>>,
        value: Option<Box<Expr>>,
    },
    YieldFrom(Box<Expr>),
    ShellExec(Vec<Expr>),
}

// ═══════════════════════════════════════════════════════════════════════════
// File root
// ═══════════════════════════════════════════════════════════════════════════

/// Parsed file: statements plus the source they came from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub source: String,
    pub stmts: Vec<Stmt>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>, stmts: Vec<Stmt>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            stmts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parse_kinds() {
        let fq = Name::parse("\\App\\Db", Position::zero());
        assert_eq!(fq.kind, NameKind::FullyQualified);
        assert_eq!(fq.parts, vec!["App", "Db"]);

        let rel = Name::parse("namespace\\Util", Position::zero());
        assert_eq!(rel.kind, NameKind::Relative);
        assert_eq!(rel.joined(), "Util");

        let plain = Name::parse("Foo\\Bar", Position::zero());
        assert_eq!(plain.kind, NameKind::Name);
        assert_eq!(plain.leaf(), "Bar");
        assert!(!plain.is_unqualified());
    }

    #[test]
    fn test_binary_op_tokens() {
        assert_eq!(BinaryOp::from_token("and"), Some(BinaryOp::LogicalAnd));
        assert_eq!(BinaryOp::from_token("<>"), Some(BinaryOp::NotEqual));
        assert_eq!(BinaryOp::from_token("<=>"), Some(BinaryOp::Spaceship));
        assert_eq!(BinaryOp::from_token("=>"), None);
    }

    #[test]
    fn test_cast_keywords() {
        assert_eq!(CastKind::from_keyword(" integer "), Some(CastKind::Int));
        assert_eq!(CastKind::from_keyword("real"), Some(CastKind::Double));
        assert_eq!(CastKind::from_keyword("binary"), Some(CastKind::String));
        assert_eq!(CastKind::from_keyword("resource"), None);
    }

    #[test]
    fn test_magic_const_names() {
        assert_eq!(MagicConst::from_name("__class__"), Some(MagicConst::Class));
        assert_eq!(MagicConst::from_name("__LINE__"), Some(MagicConst::Line));
        assert_eq!(MagicConst::from_name("__FOO__"), None);
    }
}
