//! Scan builders
//!
//! `ScanBuilder` scans in-memory sources; `ProjectBuilder` lays files out in a
//! temporary directory so the filesystem path (walkdir, composer.json) runs too.

use std::path::Path;

use sqlitaint_ir::config::AnalysisConfig;
use sqlitaint_ir::{ScanOutcome, Scanner};
use tempfile::TempDir;

/// In-memory scan of `(path, source)` pairs
#[derive(Debug, Clone)]
pub struct ScanBuilder {
    sources: Vec<(String, String)>,
    config: AnalysisConfig,
}

impl Default for ScanBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            config: AnalysisConfig::default().verify_ir(true),
        }
    }
}

impl ScanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, source: &str) -> Self {
        self.sources.push((path.to_string(), source.to_string()));
        self
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn laravel(mut self) -> Self {
        self.config = self.config.laravel(true);
        self
    }

    pub fn scan(self) -> ScanOutcome {
        Scanner::new(self.config)
            .scan_sources(self.sources)
            .expect("scan should not abort")
    }
}

/// Scan a single file at `/app/index.php`
pub fn scan_one(source: &str) -> ScanOutcome {
    ScanBuilder::new().file("/app/index.php", source).scan()
}

/// Project directory on disk
pub struct ProjectBuilder {
    dir: TempDir,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn file(self, relative: &str, content: &str) -> Self {
        self.file_bytes(relative, content.as_bytes())
    }

    /// File with raw, possibly non-UTF-8 content
    pub fn file_bytes(self, relative: &str, content: &[u8]) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(&path, content).expect("write file");
        self
    }

    pub fn composer_psr4(self, prefix: &str, dir: &str) -> Self {
        let mut psr4 = serde_json::Map::new();
        psr4.insert(prefix.to_string(), serde_json::Value::from(dir));
        let json = serde_json::json!({ "autoload": { "psr-4": psr4 } });
        self.file("composer.json", &json.to_string())
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn scan(&self, config: AnalysisConfig) -> ScanOutcome {
        Scanner::new(config)
            .scan_dir(self.dir.path())
            .expect("scan should not abort")
    }
}
