//! Tree-sitter based parser implementation

mod php_parser;

pub use php_parser::{PhpParser, MAX_EXPR_DEPTH};
