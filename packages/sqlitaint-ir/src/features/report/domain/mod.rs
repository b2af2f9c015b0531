mod report;

pub use report::{
    DataflowTrace, Extra, Loc, Location, Node, Report, ReportResult, ScannedPaths, SQLI_MESSAGE,
};
