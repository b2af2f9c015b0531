//! Source text lookup for report snippets

use std::fs;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::warn;

use crate::shared::models::Position;

/// Raw file bytes by path; primed by the scanner, read from disk otherwise.
/// Snippets are decoded lossily, so legacy encodings still produce content.
#[derive(Debug, Default)]
pub struct SourceFiles {
    files: AHashMap<Arc<str>, Option<Vec<u8>>>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<Arc<str>>, source: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), Some(source.into()));
    }

    /// Text of `position` in `path`; empty when the file is unreadable
    pub fn snippet(&mut self, path: &str, position: &Position) -> String {
        if !self.files.contains_key(path) {
            let loaded = match fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(path, error = %err, "cannot read source for report");
                    None
                }
            };
            self.files.insert(Arc::from(path), loaded);
        }
        self.files
            .get(path)
            .and_then(|f| f.as_deref())
            .map(|bytes| String::from_utf8_lossy(position.slice_bytes(bytes)).into_owned())
            .unwrap_or_default()
    }
}
