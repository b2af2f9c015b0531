//! AST pre-passes run before lowering, in order:
//! namespace resolution, loop resolution, magic constants.

pub mod loop_resolver;
pub mod magic_constant_resolver;
pub mod namespace_resolver;
pub mod traverser;

pub use loop_resolver::LoopResolver;
pub use magic_constant_resolver::MagicConstantResolver;
pub use namespace_resolver::NamespaceResolver;
pub use traverser::{traverse, AstVisitor, Traverser};

use crate::errors::Result;
use crate::features::parsing::ast::SourceFile;
use crate::shared::LabelGenerator;

/// Run all pre-passes over a file; returns the label generator so lowering
/// continues the same per-file numbering
pub fn run_prepasses(file: &mut SourceFile) -> Result<LabelGenerator> {
    traverse(&mut file.stmts, &mut NamespaceResolver::new())?;
    let mut loops = LoopResolver::new(&file.path);
    traverse(&mut file.stmts, &mut loops)?;
    traverse(&mut file.stmts, &mut MagicConstantResolver::new(&file.path))?;
    Ok(loops.into_labels())
}
