//! Report assertions

use sqlitaint_ir::{Report, ReportResult, ScanOutcome};

pub fn assert_no_file_errors(outcome: &ScanOutcome) {
    assert!(
        outcome.errors.is_empty(),
        "Expected no file errors, got: {:?}",
        outcome.errors
    );
}

pub fn assert_result_count(report: &Report, expected: usize) {
    assert_eq!(
        report.results.len(),
        expected,
        "Expected {expected} results, got {}. Sinks: {:?}",
        report.results.len(),
        report
            .results
            .iter()
            .map(|r| &r.sink().content)
            .collect::<Vec<_>>()
    );
}

pub fn assert_no_results(report: &Report) {
    assert_result_count(report, 0);
}

/// Source and sink code contain the given fragments
pub fn assert_flow(result: &ReportResult, source: &str, sink: &str) {
    assert!(
        result.source().content.contains(source),
        "taint_source '{}' should contain '{source}'",
        result.source().content
    );
    assert!(
        result.sink().content.contains(sink),
        "taint_sink '{}' should contain '{sink}'",
        result.sink().content
    );
}

/// Some intermediate node contains `fragment`
pub fn assert_passes_through(result: &ReportResult, fragment: &str) {
    let contents: Vec<&str> = result
        .extra
        .dataflow_trace
        .intermediate_vars
        .iter()
        .map(|n| n.content.as_str())
        .collect();
    assert!(
        contents.iter().any(|c| c.contains(fragment)),
        "intermediate_vars should contain '{fragment}', got {contents:?}"
    );
}

/// Result is located at its sink, in the sink's file
pub fn assert_located_at_sink(result: &ReportResult) {
    let sink = &result.sink().location;
    assert_eq!(result.start, sink.start);
    assert_eq!(result.end, sink.end);
    assert_eq!(result.path, sink.path);
}
