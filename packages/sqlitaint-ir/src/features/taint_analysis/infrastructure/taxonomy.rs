/*
 * SQL injection taxonomy for PHP
 *
 * Classifies one IR op as a source, sanitizer, sink, inert op or plain
 * propagator. Function names are matched on their leaf (`\Foo\mysql_query`
 * is `mysql_query`); function, method and class names are case-insensitive
 * as in PHP.
 */

use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::features::ir::domain::op::{BinaryOp, CastKind, UnaryOp};
use crate::features::ir::domain::{FuncId, IrArena, OpId, OpKind, OperandId, OperandKind};
use crate::features::taint_analysis::domain::{OpRole, SinkArgs};

/// Functions returning request data
static SOURCE_FUNCTIONS: Lazy<AHashSet<&'static str>> =
    Lazy::new(|| ["apache_request_headers", "getallheaders"].into_iter().collect());

/// Laravel route registrars
static ROUTE_METHODS: Lazy<AHashSet<&'static str>> =
    Lazy::new(|| ["get", "post", "put", "patch", "delete"].into_iter().collect());

/// Filters whose output is numeric
static NUMERIC_FILTERS: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "filter_sanitize_number_int",
        "filter_sanitize_number_float",
    ]
    .into_iter()
    .collect()
});

static VALIDATING_FILTERS: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    ["filter_validate_int", "filter_validate_float"]
        .into_iter()
        .collect()
});

/// Escapers, numeric conversions and functions whose result is a number or a
/// digest
static SANITIZER_FUNCTIONS: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        // escaping
        "mysql_real_escape_string",
        "mysql_escape_string",
        "mysqli_real_escape_string",
        "pg_escape_string",
        "pg_escape_literal",
        "pg_escape_identifier",
        // numeric conversion
        "intval",
        "floatval",
        "boolval",
        "doubleval",
        // numeric results
        "count_chars",
        "crc32",
        "sizeof",
        "count",
        "strlen",
        "strpos",
        "stripos",
        "strrpos",
        "strripos",
        "ord",
        "substr_count",
        "bindec",
        "strspn",
        "hexdec",
        // encodings and digests
        "bin2hex",
        "hash",
        "metaphone",
        "hash_hmac",
        "gzdeflate",
        "soundex",
        "zlib_encode",
        "base64_encode",
        "md5",
        "gzcompress",
        "mhash",
        "password_hash",
        "crypt",
        "gzencode",
    ]
    .into_iter()
    .collect()
});

static SANITIZER_METHODS: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    ["escape_string", "real_escape_string", "quote"]
        .into_iter()
        .collect()
});

/// Only pattern accepted as a digit check
const DIGITS_ONLY_PATTERN: &str = "/^[0-9]*$/";

static SINK_FUNCTIONS: Lazy<AHashMap<&'static str, SinkArgs>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    for name in [
        "mysql_query",
        "mysql_db_query",
        "mysqli_query",
        "mysqli_multi_query",
        "mysqli_real_query",
        "mysqli_execute",
        "mysqli_execute_query",
        "mysqli_prepare",
        "pg_query",
        "pg_send_query",
        "pg_prepare",
        "pg_send_prepare",
    ] {
        map.insert(name, SinkArgs::All);
    }
    map.insert("pg_query_params", SinkArgs::Only(1));
    map.insert("pg_send_query_params", SinkArgs::Only(1));
    map
});

/// Method and static-method sinks, keyed by lowercase leaf
static SINK_METHODS: Lazy<AHashMap<&'static str, SinkArgs>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    for name in ["query", "direct_query", "multi_query", "real_query", "prepare"] {
        map.insert(name, SinkArgs::All);
    }
    map.insert("execute_query", SinkArgs::Only(0));

    // Laravel query builder
    for name in [
        "raw",
        "selectraw",
        "whereraw",
        "orwhereraw",
        "havingraw",
        "orhavingraw",
        "orderbyraw",
        "groupbyraw",
    ] {
        map.insert(name, SinkArgs::All);
    }
    for name in ["select", "where", "orwhere", "having", "orderby", "groupby"] {
        map.insert(name, SinkArgs::Only(0));
    }
    map
});

/// Name pattern matched case-insensitively
#[derive(Debug, Clone)]
pub struct NamePattern {
    pub pattern: String,
    regex: Option<Regex>,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Self {
        let regex = Regex::new(&format!("(?i){}", pattern)).ok();
        NamePattern {
            pattern: pattern.to_string(),
            regex,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(name),
            None => name.to_ascii_lowercase().contains(&self.pattern),
        }
    }
}

/// Any method named `...query`
static QUERY_METHOD: Lazy<NamePattern> = Lazy::new(|| NamePattern::new("query$"));

/// `Route`, `RouteServiceProvider`... (leaf of the class name)
static ROUTE_CLASS: Lazy<NamePattern> = Lazy::new(|| NamePattern::new("^route"));

/// Segment after the last `\`, lowercased
pub fn leaf_name(name: &str) -> String {
    name.rsplit('\\').next().unwrap_or(name).to_ascii_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    laravel: bool,
}

impl Taxonomy {
    pub fn new(laravel: bool) -> Self {
        Self { laravel }
    }

    pub fn laravel(&self) -> bool {
        self.laravel
    }

    /// Function touches request data: a superglobal read or a source call
    pub fn reads_input(&self, arena: &IrArena, func: FuncId) -> bool {
        let func = arena.func(func);
        func.contains_tainted
            || func
                .calls
                .iter()
                .any(|call| self.is_source(arena, &arena.op(*call).kind))
    }

    pub fn classify(&self, arena: &IrArena, op: OpId) -> OpRole {
        let kind = &arena.op(op).kind;
        if self.is_source(arena, kind) {
            OpRole::Source
        } else if self.is_sanitizer(arena, kind) {
            OpRole::Sanitizer
        } else if let Some(args) = self.sink_args(arena, kind) {
            OpRole::Sink(args)
        } else if is_inert(kind) {
            OpRole::Inert
        } else {
            OpRole::Propagate
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sources
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_source(&self, arena: &IrArena, kind: &OpKind) -> bool {
        match kind {
            OpKind::ArrayDimFetch { var, .. } if arena.is_symbolic(*var) => return true,
            OpKind::Assign { expr, .. } if arena.is_symbolic(*expr) => return true,
            OpKind::FunctionCall { name, args, .. } => {
                if let Some(callee) = callee_name(arena, *name) {
                    match callee.as_str() {
                        "filter_input" => return !has_numeric_filter(arena, args, 2),
                        "filter_input_array" => return !has_numeric_filter(arena, args, 1),
                        other if SOURCE_FUNCTIONS.contains(other) => return true,
                        _ => {}
                    }
                }
            }
            OpKind::StaticCall { class, name, .. } if self.laravel => {
                let routed = callee_name(arena, *class).is_some_and(|c| ROUTE_CLASS.matches(&c))
                    && callee_name(arena, *name).is_some_and(|m| ROUTE_METHODS.contains(m.as_str()));
                if routed {
                    return true;
                }
            }
            _ => {}
        }

        // Any value-producing op reading request data directly
        if kind.result().is_none()
            || is_inert(kind)
            || matches!(kind, OpKind::Reset { .. } | OpKind::Next { .. })
        {
            return false;
        }
        let mut reads_input = false;
        kind.for_each_operand(|slot, id| {
            if !kind.is_write_slot(slot) && arena.is_symbolic(id) {
                reads_input = true;
            }
        });
        reads_input
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sanitizers
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_sanitizer(&self, arena: &IrArena, kind: &OpKind) -> bool {
        match kind {
            OpKind::FunctionCall { name, args, .. } => {
                let Some(callee) = callee_name(arena, *name) else {
                    return false;
                };
                if SANITIZER_FUNCTIONS.contains(callee.as_str()) {
                    return true;
                }
                match callee.as_str() {
                    "preg_match" => args
                        .first()
                        .and_then(|p| literal_string(arena, *p))
                        .is_some_and(|p| p == DIGITS_ONLY_PATTERN),
                    // raw binary digests can hold any byte
                    "sha1" => !args
                        .get(1)
                        .is_some_and(|raw| matches!(arena.literal_of(*raw), Some(OperandKind::Bool(true)))),
                    // format 0 returns the word count
                    "str_word_count" => match args.get(1) {
                        None => true,
                        Some(format) => matches!(
                            arena.literal_of(*format),
                            Some(OperandKind::Number(n)) if *n == 0.0
                        ),
                    },
                    "filter_var" => args.get(1).and_then(|f| constant_name(arena, *f)).is_some_and(|c| {
                        NUMERIC_FILTERS.contains(c.as_str()) || VALIDATING_FILTERS.contains(c.as_str())
                    }),
                    _ => false,
                }
            }
            OpKind::MethodCall { name, .. } | OpKind::StaticCall { name, .. } => {
                callee_name(arena, *name).is_some_and(|m| SANITIZER_METHODS.contains(m.as_str()))
            }
            OpKind::Cast { kind, .. } => matches!(
                kind,
                CastKind::Bool | CastKind::Int | CastKind::Double | CastKind::Unset
            ),
            OpKind::Unset { .. } => true,
            OpKind::Assertion { assertion, .. } => assertion.excludes_strings(arena),
            _ => false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sinks
    // ═══════════════════════════════════════════════════════════════════════

    pub fn sink_args(&self, arena: &IrArena, kind: &OpKind) -> Option<SinkArgs> {
        match kind {
            OpKind::FunctionCall { name, .. } => {
                let callee = callee_name(arena, *name)?;
                SINK_FUNCTIONS.get(callee.as_str()).copied()
            }
            OpKind::MethodCall { name, .. } | OpKind::StaticCall { name, .. } => {
                let method = callee_name(arena, *name)?;
                if let Some(args) = SINK_METHODS.get(method.as_str()) {
                    return Some(*args);
                }
                QUERY_METHOD.matches(&method).then_some(SinkArgs::All)
            }
            _ => None,
        }
    }
}

/// Ops whose output is a number, a boolean or nothing
pub fn is_inert(kind: &OpKind) -> bool {
    match kind {
        OpKind::Binary { op, .. } => !matches!(op, BinaryOp::Concat | BinaryOp::Coalesce),
        OpKind::Unary { op, .. } => !matches!(op, UnaryOp::Clone),
        OpKind::Isset { .. }
        | OpKind::InstanceOf { .. }
        | OpKind::Echo { .. }
        | OpKind::Reset { .. }
        | OpKind::IterValid { .. }
        | OpKind::Next { .. } => true,
        other => other.is_terminator(),
    }
}

/// Lowercase leaf of a call, method or class name held in `operand`
pub fn callee_name(arena: &IrArena, operand: OperandId) -> Option<String> {
    literal_string(arena, operand).map(leaf_name)
}

fn literal_string(arena: &IrArena, operand: OperandId) -> Option<&str> {
    match arena.literal_of(operand) {
        Some(OperandKind::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Lowercase leaf of the constant fetched into `operand`
fn constant_name(arena: &IrArena, operand: OperandId) -> Option<String> {
    let def = *arena.operand(operand).defs.first()?;
    match &arena.op(def).kind {
        OpKind::ConstFetch { name, .. } => callee_name(arena, *name),
        _ => None,
    }
}

/// The filter argument at `index` is a numeric sanitizing filter, alone or
/// inside an options array
fn has_numeric_filter(arena: &IrArena, args: &[OperandId], index: usize) -> bool {
    let Some(filter) = args.get(index) else {
        return false;
    };
    if constant_name(arena, *filter).is_some_and(|c| NUMERIC_FILTERS.contains(c.as_str())) {
        return true;
    }
    let Some(def) = arena.operand(*filter).defs.first() else {
        return false;
    };
    match &arena.op(*def).kind {
        OpKind::Array { values, .. } => values
            .iter()
            .any(|v| constant_name(arena, *v).is_some_and(|c| NUMERIC_FILTERS.contains(c.as_str()))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Position;

    struct Ir {
        arena: IrArena,
        func: FuncId,
    }

    impl Ir {
        fn new() -> Self {
            let mut arena = IrArena::new();
            let func = arena.new_func("{main}");
            Self { arena, func }
        }

        fn place(&mut self, kind: OpKind) -> OpId {
            let entry = self.arena.func(self.func).entry;
            let op = self.arena.add_op(kind, Position::new(1, 1, 0, 0), None);
            self.arena.append(entry, op);
            op
        }

        fn temp(&mut self) -> OperandId {
            self.arena.new_temporary(None)
        }

        fn constant(&mut self, name: &str) -> OperandId {
            let name = self.arena.new_string(name);
            let result = self.temp();
            self.place(OpKind::ConstFetch { name, result });
            result
        }

        fn call(&mut self, name: &str, args: Vec<OperandId>) -> OpId {
            let name = self.arena.new_string(name);
            let result = self.temp();
            self.place(OpKind::FunctionCall { name, args, result })
        }

        fn method(&mut self, name: &str, args: Vec<OperandId>) -> OpId {
            let var = self.temp();
            let name = self.arena.new_string(name);
            let result = self.temp();
            self.place(OpKind::MethodCall {
                var,
                name,
                args,
                nullsafe: false,
                result,
            })
        }
    }

    fn classify(ir: &Ir, op: OpId) -> OpRole {
        Taxonomy::new(false).classify(&ir.arena, op)
    }

    // ========================================================================
    // Sources
    // ========================================================================

    #[test]
    fn test_superglobal_fetch_is_source() {
        let mut ir = Ir::new();
        let get = ir.arena.new_operand(OperandKind::Symbolic {
            tag: "getsymbolic".into(),
        });
        let dim = ir.arena.new_string("q");
        let result = ir.temp();
        let fetch = ir.place(OpKind::ArrayDimFetch {
            var: get,
            dim: Some(dim),
            result,
        });
        assert_eq!(classify(&ir, fetch), OpRole::Source);
    }

    #[test]
    fn test_filter_input_numeric_filter_is_not_source() {
        let mut ir = Ir::new();
        let kind = ir.constant("INPUT_GET");
        let key = ir.arena.new_string("id");
        let plain = ir.call("filter_input", vec![kind, key]);
        let numeric = ir.constant("FILTER_SANITIZE_NUMBER_INT");
        let filtered = ir.call("filter_input", vec![kind, key, numeric]);
        let email = ir.constant("FILTER_SANITIZE_EMAIL");
        let other = ir.call("\\filter_input", vec![kind, key, email]);

        assert_eq!(classify(&ir, plain), OpRole::Source);
        assert_ne!(classify(&ir, filtered), OpRole::Source);
        assert_eq!(classify(&ir, other), OpRole::Source, "namespaced builtin matched by leaf");
    }

    #[test]
    fn test_laravel_route_source_only_in_laravel_mode() {
        let mut ir = Ir::new();
        let class = ir.arena.new_string("Route");
        let name = ir.arena.new_string("get");
        let result = ir.temp();
        let op = ir.place(OpKind::StaticCall {
            class,
            name,
            args: vec![],
            result,
        });
        assert_ne!(Taxonomy::new(false).classify(&ir.arena, op), OpRole::Source);
        assert_eq!(Taxonomy::new(true).classify(&ir.arena, op), OpRole::Source);
    }

    // ========================================================================
    // Sanitizers
    // ========================================================================

    #[test]
    fn test_sanitizer_functions() {
        let mut ir = Ir::new();
        let x = ir.temp();
        let intval = ir.call("intval", vec![x]);
        let escape = ir.call("mysqli_real_escape_string", vec![x, x]);
        let md5 = ir.call("MD5", vec![x]);
        let trim = ir.call("trim", vec![x]);

        assert_eq!(classify(&ir, intval), OpRole::Sanitizer);
        assert_eq!(classify(&ir, escape), OpRole::Sanitizer);
        assert_eq!(classify(&ir, md5), OpRole::Sanitizer, "function names are case-insensitive");
        assert_eq!(classify(&ir, trim), OpRole::Propagate);
    }

    #[test]
    fn test_sha1_raw_flag_propagates() {
        let mut ir = Ir::new();
        let x = ir.temp();
        let raw = ir.arena.new_operand(OperandKind::Bool(true));
        let hex = ir.call("sha1", vec![x]);
        let binary = ir.call("sha1", vec![x, raw]);
        assert_eq!(classify(&ir, hex), OpRole::Sanitizer);
        assert_eq!(classify(&ir, binary), OpRole::Propagate);
    }

    #[test]
    fn test_preg_match_only_exact_digit_pattern() {
        let mut ir = Ir::new();
        let x = ir.temp();
        let digits = ir.arena.new_string("/^[0-9]*$/");
        let loose = ir.arena.new_string("/^[a-z0-9]*$/");
        let exact = ir.call("preg_match", vec![digits, x]);
        let other = ir.call("preg_match", vec![loose, x]);
        assert_eq!(classify(&ir, exact), OpRole::Sanitizer);
        assert_eq!(classify(&ir, other), OpRole::Propagate);
    }

    #[test]
    fn test_str_word_count_and_filter_var() {
        let mut ir = Ir::new();
        let x = ir.temp();
        let words = ir.arena.new_operand(OperandKind::Number(1.0));
        let counted = ir.call("str_word_count", vec![x]);
        let listed = ir.call("str_word_count", vec![x, words]);
        let validate = ir.constant("FILTER_VALIDATE_INT");
        let checked = ir.call("filter_var", vec![x, validate]);

        assert_eq!(classify(&ir, counted), OpRole::Sanitizer);
        assert_eq!(classify(&ir, listed), OpRole::Propagate);
        assert_eq!(classify(&ir, checked), OpRole::Sanitizer);
    }

    #[test]
    fn test_casts() {
        let mut ir = Ir::new();
        let x = ir.temp();
        let to_int = ir.temp();
        let to_string = ir.temp();
        let int_cast = ir.place(OpKind::Cast {
            kind: CastKind::Int,
            expr: x,
            result: to_int,
        });
        let string_cast = ir.place(OpKind::Cast {
            kind: CastKind::String,
            expr: x,
            result: to_string,
        });
        assert_eq!(classify(&ir, int_cast), OpRole::Sanitizer);
        assert_eq!(classify(&ir, string_cast), OpRole::Propagate);
    }

    // ========================================================================
    // Sinks
    // ========================================================================

    #[test]
    fn test_sink_functions_and_methods() {
        let mut ir = Ir::new();
        let conn = ir.temp();
        let sql = ir.temp();
        let query = ir.call("mysql_query", vec![sql]);
        let params = ir.call("pg_query_params", vec![conn, sql]);
        let method = ir.method("Query", vec![sql]);
        let suffixed = ir.method("runRawQuery", vec![sql]);
        let where_raw = ir.method("whereRaw", vec![sql]);
        let where_clause = ir.method("where", vec![sql]);
        let fetch = ir.method("fetch_assoc", vec![]);

        assert_eq!(classify(&ir, query), OpRole::Sink(SinkArgs::All));
        assert_eq!(classify(&ir, params), OpRole::Sink(SinkArgs::Only(1)));
        assert_eq!(classify(&ir, method), OpRole::Sink(SinkArgs::All));
        assert_eq!(classify(&ir, suffixed), OpRole::Sink(SinkArgs::All));
        assert_eq!(classify(&ir, where_raw), OpRole::Sink(SinkArgs::All));
        assert_eq!(classify(&ir, where_clause), OpRole::Sink(SinkArgs::Only(0)));
        assert_eq!(classify(&ir, fetch), OpRole::Propagate);
    }

    #[test]
    fn test_escape_method_is_sanitizer() {
        let mut ir = Ir::new();
        let x = ir.temp();
        let escape = ir.method("real_escape_string", vec![x]);
        let quote = ir.method("quote", vec![x]);
        assert_eq!(classify(&ir, escape), OpRole::Sanitizer);
        assert_eq!(classify(&ir, quote), OpRole::Sanitizer);
    }

    // ========================================================================
    // Inert ops
    // ========================================================================

    #[test]
    fn test_arithmetic_is_inert_concat_propagates() {
        let mut ir = Ir::new();
        let a = ir.temp();
        let b = ir.temp();
        let sum = ir.temp();
        let joined = ir.temp();
        let plus = ir.place(OpKind::Binary {
            op: BinaryOp::Plus,
            left: a,
            right: b,
            result: sum,
        });
        let concat = ir.place(OpKind::Binary {
            op: BinaryOp::Concat,
            left: a,
            right: b,
            result: joined,
        });
        assert_eq!(classify(&ir, plus), OpRole::Inert);
        assert_eq!(classify(&ir, concat), OpRole::Propagate);
    }

    #[test]
    fn test_leaf_name() {
        assert_eq!(leaf_name("\\App\\Db\\Query"), "query");
        assert_eq!(leaf_name("mysql_query"), "mysql_query");
        assert!(QUERY_METHOD.matches("fetchQuery"));
        assert!(!QUERY_METHOD.matches("queryBuilder"));
    }
}
