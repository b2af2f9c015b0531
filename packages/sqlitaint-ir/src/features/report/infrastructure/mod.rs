mod json;
mod source_files;

pub use json::JsonReporter;
pub use source_files::SourceFiles;
