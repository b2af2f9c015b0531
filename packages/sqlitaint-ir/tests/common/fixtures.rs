//! PHP fixtures
//!
//! Small programs with a known number of SQL injection findings.

/// `$x = $_GET["q"]; mysql_query($x);`
pub const DIRECT_FLOW: &str = "<?php\n$x = $_GET[\"q\"];\nmysql_query($x);\n";

/// Escaped through `intval` before the sink
pub const SANITIZED_FLOW: &str = "<?php\n$x = $_POST[\"q\"];\n$y = intval($x);\nmysql_query($y);\n";

/// Tainted only on the `if` branch
pub const CONDITIONAL_FLOW: &str =
    "<?php\n$x = \"safe\";\nif ($cond) { $x = $_GET[\"q\"]; }\nmysql_query($x);\n";

/// Branch the solver proves dead
pub const INFEASIBLE_FLOW: &str =
    "<?php\nif (1 == 2) { $x = $_GET[\"q\"]; mysql_query($x); }\n";

/// Tainted argument reaches a sink inside a user function
pub const CROSS_CALL_FLOW: &str =
    "<?php\nfunction f($a) { mysql_query($a); }\nf($_GET[\"q\"]);\n";

/// `__CLASS__` inside a method
pub const MAGIC_CLASS: &str = "<?php\nclass C {\n  function m() { echo __CLASS__; }\n}\n";

/// Source read but never queried
pub const SOURCE_ONLY: &str = "<?php\n$x = $_GET[\"q\"];\necho strlen($x);\n";

/// Two inputs concatenated into one query
pub const TWO_SOURCES: &str =
    "<?php\n$a = $_GET[\"a\"];\n$b = $_COOKIE[\"b\"];\nmysql_query(\"SELECT \" . $a . $b);\n";

/// A loop body that taints on one branch
pub const LOOP_CONDITIONAL: &str = "<?php\n$x = \"safe\";\nforeach ($rows as $row) {\n  if ($row) { $x = $_GET[\"q\"]; }\n}\nmysql_query($x);\n";

/// Case 1 taints and falls into case 2's query
pub const SWITCH_FALLTHROUGH: &str = "<?php\nswitch ($a) {\n  case 1:\n    $x = $_GET[\"q\"];\n  case 2:\n    mysql_query($x);\n    break;\n}\n";

/// Same cases separated by `break`
pub const SWITCH_WITH_BREAK: &str = "<?php\nswitch ($a) {\n  case 1:\n    $x = $_GET[\"q\"];\n    break;\n  case 2:\n    mysql_query($x);\n    break;\n}\n";

/// Method sink on a mysqli handle
pub const METHOD_SINK: &str =
    "<?php\n$db = new mysqli();\n$db->query(\"SELECT * FROM t WHERE id = \" . $_GET[\"id\"]);\n";

/// PDO quoting before the query
pub const QUOTED_METHOD_SINK: &str = "<?php\n$pdo = new PDO(\"sqlite::memory:\");\n$id = $pdo->quote($_GET[\"id\"]);\n$pdo->query(\"SELECT * FROM t WHERE id = \" . $id);\n";

/// Laravel route input into a raw query
pub const LARAVEL_ROUTE: &str =
    "<?php\n$id = Route::get(\"id\");\nDB::select(\"SELECT * FROM users WHERE id = \" . $id);\n";

/// Included library with the sink
pub const LIB_WITH_SINK: &str =
    "<?php\nfunction find_user($id) {\n  return mysql_query(\"SELECT * FROM users WHERE id = \" . $id);\n}\n";

/// Entry point including `lib.php`
pub const INDEX_INCLUDING_LIB: &str = "<?php\nrequire_once 'lib.php';\nfind_user($_REQUEST[\"id\"]);\n";

/// Source with the given superglobal
pub fn source_into_sink(superglobal: &str, sink: &str) -> String {
    format!("<?php\n$v = {}[\"k\"];\n{}($v);\n", superglobal, sink)
}

/// `n` independent flows in one file, one per line pair
pub fn n_flows(n: usize) -> String {
    let mut out = String::from("<?php\n");
    for i in 0..n {
        out.push_str(&format!("$v{i} = $_GET[\"k{i}\"];\nmysql_query($v{i});\n"));
    }
    out
}
