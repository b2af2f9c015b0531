//! Source → sink flow found on one path

use crate::features::ir::domain::{IrArena, OpId, OpKind};

/// One dataflow from a source op into a sink op
///
/// `trace` runs from the source (first) to the sink (last); every adjacent
/// pair is connected in the provenance graph of the path it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaintFinding {
    pub source: OpId,
    pub sink: OpId,
    pub trace: Vec<OpId>,
}

impl TaintFinding {
    pub fn new(trace: Vec<OpId>) -> Option<Self> {
        let source = *trace.first()?;
        let sink = *trace.last()?;
        Some(Self {
            source,
            sink,
            trace,
        })
    }

    /// Ops between source and sink worth showing: assignments, calls and the
    /// parameter/return hops across call boundaries
    pub fn intermediates<'a>(&'a self, arena: &'a IrArena) -> impl Iterator<Item = OpId> + 'a {
        let inner = if self.trace.len() > 2 {
            &self.trace[1..self.trace.len() - 1]
        } else {
            &[][..]
        };
        inner.iter().copied().filter(move |op| {
            let op = arena.op(*op);
            !op.position.is_synthetic()
                && matches!(
                    op.kind,
                    OpKind::Assign { .. }
                        | OpKind::AssignRef { .. }
                        | OpKind::FunctionCall { .. }
                        | OpKind::MethodCall { .. }
                        | OpKind::StaticCall { .. }
                        | OpKind::Param { .. }
                        | OpKind::Return { .. }
                )
        })
    }
}
