//! Build report use case
//!
//! Turns deduplicated findings into report results: source and sink nodes
//! with their code, the assignments and calls in between, sorted by
//! location.

use tracing::debug;

use crate::features::ir::domain::{IrArena, OpId};
use crate::features::report::domain::{Node, Report, ReportResult};
use crate::features::report::infrastructure::SourceFiles;
use crate::features::taint_analysis::TaintFinding;

pub struct BuildReportUseCase<'a> {
    arena: &'a IrArena,
    files: SourceFiles,
}

impl<'a> BuildReportUseCase<'a> {
    pub fn new(arena: &'a IrArena, files: SourceFiles) -> Self {
        Self { arena, files }
    }

    pub fn execute(mut self, scanned: Vec<String>, findings: &[TaintFinding]) -> Report {
        let mut report = Report::new(scanned);
        for finding in findings {
            let source = self.node(finding.source);
            let sink = self.node(finding.sink);
            let intermediates: Vec<Node> = finding
                .intermediates(self.arena)
                .collect::<Vec<OpId>>()
                .into_iter()
                .map(|op| self.node(op))
                .collect();
            report.add_result(ReportResult::new(source, sink, intermediates));
        }
        report.sort();
        debug!(results = report.results.len(), "report built");
        report
    }

    fn node(&mut self, op: OpId) -> Node {
        let arena = self.arena;
        let op = arena.op(op);
        let path = op.file_path.as_deref().unwrap_or_default();
        let content = self.files.snippet(path, &op.position);
        Node::new(content, path, &op.position)
    }
}
