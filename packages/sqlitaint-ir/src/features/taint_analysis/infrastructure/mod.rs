mod taint_pass;
mod taxonomy;

pub use taint_pass::{NodeRole, TaintGraph, TaintNode, TaintPass, DEFAULT_MAX_TRACES};
pub use taxonomy::{callee_name, is_inert, leaf_name, NamePattern, Taxonomy};
