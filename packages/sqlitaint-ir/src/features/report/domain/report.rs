//! Scan report
//!
//! JSON shape consumed by downstream tooling; field names are part of the
//! format.

use serde::{Deserialize, Serialize};

use crate::shared::models::Position;

pub const SQLI_MESSAGE: &str = "SQLi vulnerability";

/// Line (1-based) and byte offset into the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Loc {
    pub line: u32,
    pub offset: usize,
}

impl Loc {
    pub fn new(line: u32, offset: usize) -> Self {
        Self { line, offset }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start: Loc,
    pub end: Loc,
    pub path: String,
}

/// A piece of source code on the trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub content: String,
    pub location: Location,
}

impl Node {
    pub fn new(content: impl Into<String>, path: impl Into<String>, position: &Position) -> Self {
        Self {
            content: content.into(),
            location: Location {
                start: Loc::new(position.start_line, position.start_pos),
                end: Loc::new(position.end_line, position.end_pos),
                path: path.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataflowTrace {
    pub intermediate_vars: Vec<Node>,
    pub taint_source: Node,
    pub taint_sink: Node,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extra {
    pub dataflow_trace: DataflowTrace,
    pub message: String,
}

/// One finding, located at its sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResult {
    pub start: Loc,
    pub end: Loc,
    pub path: String,
    pub extra: Extra,
}

impl ReportResult {
    /// Result located at `sink`; source and sink open and close the
    /// intermediate list
    pub fn new(source: Node, sink: Node, intermediates: Vec<Node>) -> Self {
        let mut intermediate_vars = Vec::with_capacity(intermediates.len() + 2);
        intermediate_vars.push(source.clone());
        intermediate_vars.extend(intermediates);
        intermediate_vars.push(sink.clone());
        Self {
            start: sink.location.start,
            end: sink.location.end,
            path: sink.location.path.clone(),
            extra: Extra {
                dataflow_trace: DataflowTrace {
                    intermediate_vars,
                    taint_source: source,
                    taint_sink: sink,
                },
                message: SQLI_MESSAGE.to_string(),
            },
        }
    }

    pub fn source(&self) -> &Node {
        &self.extra.dataflow_trace.taint_source
    }

    pub fn sink(&self) -> &Node {
        &self.extra.dataflow_trace.taint_sink
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedPaths {
    pub scanned: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub paths: ScannedPaths,
    pub results: Vec<ReportResult>,
}

impl Report {
    pub fn new(scanned: Vec<String>) -> Self {
        Self {
            paths: ScannedPaths { scanned },
            results: Vec::new(),
        }
    }

    pub fn add_path(&mut self, path: impl Into<String>) {
        self.paths.scanned.push(path.into());
    }

    pub fn add_result(&mut self, result: ReportResult) {
        self.results.push(result);
    }

    /// Stable order: file, sink start, then source start
    pub fn sort(&mut self) {
        self.results.sort_by(|a, b| {
            (a.path.as_str(), a.start, a.end, &a.source().location.path, a.source().location.start)
                .cmp(&(
                    b.path.as_str(),
                    b.start,
                    b.end,
                    &b.source().location.path,
                    b.source().location.start,
                ))
        });
    }
}
