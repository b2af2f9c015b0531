//! Pipeline orchestration

pub mod scanner;

pub use scanner::{discover_php_files, FileError, ScanOutcome, ScanStats, Scanner};
