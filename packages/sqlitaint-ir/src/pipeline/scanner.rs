//! Whole-program scanner
//!
//! ```text
//! read files ─▶ parse + pre-pass (rayon) ─▶ lower (sequential, shared arena)
//!   ─▶ PSR-4 includes ─▶ optimize ─▶ simplify ─▶ [verify]
//!   ─▶ enumerate paths ─▶ taint pass ─▶ report
//! ```
//!
//! Everything after lowering sees the combined program. Per-file failures
//! (unreadable file, parse error, bad break depth) skip the file and are
//! collected in `ScanOutcome::errors`; only a broken IR invariant aborts.
//!
//! Files are read as bytes and every stage runs inside one rayon pool with
//! a large thread stack, so deeply nested expressions fail per file instead
//! of taking the process down.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ahash::AHashSet;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{AnalysisConfig, AutoloadConfig};
use crate::errors::{AnalyzerError, Result};
use crate::features::ir::domain::{IrArena, OpKind, Script};
use crate::features::ir::{print_scripts, verify_program};
use crate::features::lowering::{LowerFileUseCase, PreparedFile};
use crate::features::optimizer::OptimizeUseCase;
use crate::features::parsing::{PhpParser, MAX_EXPR_DEPTH};
use crate::features::path_enumeration::EnumeratePathsUseCase;
use crate::features::report::{BuildReportUseCase, Report, SourceFiles};
use crate::features::ssa::SimplifyUseCase;
use crate::features::taint_analysis::AnalyzeTaintUseCase;
use crate::shared::decode_preserving_offsets;
use crate::shared::utils::path::normalize;

/// Pre-passes and lowering recurse once per nesting level, up to
/// `MAX_EXPR_DEPTH`; every stage runs on pool threads with this stack
const ANALYSIS_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Directories never scanned by `discover_php_files`
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules"];

/// A file excluded from the scan
#[derive(Debug)]
pub struct FileError {
    pub path: String,
    pub error: AnalyzerError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub skipped: usize,
    pub functions: usize,
    pub autoload_includes: usize,
    pub paths: usize,
    pub pruned: usize,
    pub truncated: bool,
    pub findings: usize,
    pub duration_ms: u128,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub report: Report,
    pub errors: Vec<FileError>,
    /// Printed IR of every scanned file, when requested
    pub ir_dump: Option<String>,
    pub stats: ScanStats,
}

pub struct Scanner {
    config: AnalysisConfig,
    dump_ir: bool,
}

impl Scanner {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            dump_ir: false,
        }
    }

    /// Keep the printed IR in `ScanOutcome::ir_dump`
    pub fn with_ir_dump(mut self, dump_ir: bool) -> Self {
        self.dump_ir = dump_ir;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Scan every PHP file under `root`
    pub fn scan_dir(&self, root: &Path) -> Result<ScanOutcome> {
        let files = discover_php_files(root)?;
        self.scan(root, &files)
    }

    /// Scan `files` (absolute, or relative to `root`) as one program
    pub fn scan(&self, root: &Path, files: &[PathBuf]) -> Result<ScanOutcome> {
        let autoload = match AutoloadConfig::load(root) {
            Ok(autoload) => autoload,
            Err(error) => {
                warn!(root = %root.display(), %error, "composer.json ignored");
                AutoloadConfig::default()
            }
        };

        let mut errors = Vec::new();
        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            let full = if file.is_absolute() {
                file.clone()
            } else {
                root.join(file)
            };
            let path = normalize(&full).to_string_lossy().into_owned();
            match std::fs::read(&full) {
                Ok(source) => sources.push((path, source)),
                Err(error) => {
                    warn!(file = %path, %error, "file skipped");
                    errors.push(FileError {
                        path,
                        error: error.into(),
                    });
                }
            }
        }

        self.analyze(sources, &autoload, errors)
    }

    /// Scan in-memory `(path, source)` pairs; no autoload map
    pub fn scan_sources(&self, sources: Vec<(String, String)>) -> Result<ScanOutcome> {
        let sources = sources
            .into_iter()
            .map(|(path, source)| (path, source.into_bytes()))
            .collect();
        self.analyze(sources, &AutoloadConfig::default(), Vec::new())
    }

    fn analyze(
        &self,
        sources: Vec<(String, Vec<u8>)>,
        autoload: &AutoloadConfig,
        errors: Vec<FileError>,
    ) -> Result<ScanOutcome> {
        let threads = if self.parallel() {
            num_cpus::get().min(sources.len()).max(1)
        } else {
            1
        };
        match ThreadPoolBuilder::new()
            .num_threads(threads)
            .stack_size(ANALYSIS_STACK_SIZE)
            .thread_name(|i| format!("sqlitaint-worker-{}", i))
            .build()
        {
            Ok(pool) => {
                debug!(threads, max_depth = MAX_EXPR_DEPTH, "analysis pool ready");
                pool.install(|| self.analyze_in_pool(sources, autoload, errors))
            }
            Err(error) => {
                warn!(%error, "thread pool unavailable, analyzing on the calling thread");
                self.analyze_in_pool(sources, autoload, errors)
            }
        }
    }

    fn parallel(&self) -> bool {
        self.config.parallel && cfg!(feature = "parallel")
    }

    fn analyze_in_pool(
        &self,
        sources: Vec<(String, Vec<u8>)>,
        autoload: &AutoloadConfig,
        mut errors: Vec<FileError>,
    ) -> Result<ScanOutcome> {
        let started = Instant::now();
        let mut stats = ScanStats {
            files: sources.len() + errors.len(),
            ..ScanStats::default()
        };
        let lower = LowerFileUseCase::new(PhpParser::new());

        // 1. Parse + pre-passes
        let prepared = self.prepare_all(&lower, &sources);

        // 2. Lower into the shared arena
        let mut arena = IrArena::new();
        let mut scripts: Vec<Script> = Vec::with_capacity(sources.len());
        let mut scanned = Vec::with_capacity(sources.len());
        for ((path, _), prepared) in sources.iter().zip(prepared) {
            match prepared.and_then(|file| lower.lower(&mut arena, file)) {
                Ok(script) => {
                    scanned.push(path.clone());
                    scripts.push(script);
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(file = %path, %error, "file skipped");
                    errors.push(FileError {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }
        stats.skipped = errors.len();
        info!(
            lowered = scripts.len(),
            skipped = stats.skipped,
            "lowering done"
        );

        // 3. Classes autoloaded through PSR-4 behave like includes
        if !autoload.is_empty() {
            stats.autoload_includes = add_autoload_includes(&arena, &mut scripts, autoload);
        }

        // 4. Optimize, simplify, verify
        let funcs: Vec<_> = scripts
            .iter()
            .flat_map(|s| s.ordered_functions.iter().copied())
            .collect();
        stats.functions = funcs.len();
        OptimizeUseCase::new().execute_all(&mut arena, funcs.iter().copied());
        SimplifyUseCase::new().execute_all(&mut arena, funcs.iter().copied());
        if self.config.verify_ir {
            verify_program(&arena, &scripts)?;
            debug!(functions = funcs.len(), "IR verified");
        }
        let ir_dump = self.dump_ir.then(|| print_scripts(&arena, &scripts));

        // 5. Paths
        let taint = AnalyzeTaintUseCase::new(&self.config);
        let enumeration = EnumeratePathsUseCase::new(self.config.clone())
            .execute_with(&mut arena, &scripts, |arena, func| {
                taint.taxonomy().reads_input(arena, func)
            });
        stats.paths = enumeration.paths.len();
        stats.pruned = enumeration.feasibility.pruned;
        stats.truncated = enumeration.stats.truncated;

        // 6. Taint
        let outcome = taint.execute(&arena, &enumeration.paths);
        stats.findings = outcome.findings.len();

        // 7. Report
        let mut files = SourceFiles::new();
        for (path, source) in sources {
            files.insert(path, source);
        }
        let report = BuildReportUseCase::new(&arena, files).execute(scanned, &outcome.findings);

        stats.duration_ms = started.elapsed().as_millis();
        info!(
            files = stats.files,
            skipped = stats.skipped,
            paths = stats.paths,
            findings = stats.findings,
            duration_ms = stats.duration_ms as u64,
            "scan done"
        );

        Ok(ScanOutcome {
            report,
            errors,
            ir_dump,
            stats,
        })
    }

    /// Runs on the analysis pool, so `par_iter` fans out over its threads
    fn prepare_all(
        &self,
        lower: &LowerFileUseCase<PhpParser>,
        sources: &[(String, Vec<u8>)],
    ) -> Vec<Result<PreparedFile>> {
        let prepare = |(path, bytes): &(String, Vec<u8>)| {
            lower.prepare(&decode_preserving_offsets(bytes), path)
        };
        if !self.parallel() || sources.len() < 2 {
            return sources.iter().map(prepare).collect();
        }
        debug!(files = sources.len(), "parsing in parallel");
        sources.par_iter().map(prepare).collect()
    }
}

/// Add the file of every `new C` / `C::m()` class found through the PSR-4 map
/// to the script's includes; returns the number of includes added
fn add_autoload_includes(
    arena: &IrArena,
    scripts: &mut [Script],
    autoload: &AutoloadConfig,
) -> usize {
    let known: AHashSet<String> = scripts.iter().map(|s| s.file_path.to_string()).collect();
    let mut added = 0;
    for script in scripts.iter_mut() {
        let mut classes: Vec<&str> = Vec::new();
        for func in &script.ordered_functions {
            for block in &arena.func(*func).blocks {
                for op in &arena.block(*block).instructions {
                    let class = match &arena.op(*op).kind {
                        OpKind::New { class, .. } | OpKind::StaticCall { class, .. } => *class,
                        _ => continue,
                    };
                    if let Some(name) = arena.string_of(class) {
                        if !classes.contains(&name) {
                            classes.push(name);
                        }
                    }
                }
            }
        }
        for class in classes {
            let Some(file) = autoload.resolve_class(class) else {
                continue;
            };
            let file = normalize(&file).to_string_lossy().into_owned();
            if file.as_str() == script.file_path.as_ref() || !known.contains(&file) {
                continue;
            }
            if !script.included_files.contains(&file) {
                debug!(file = %script.file_path, class, target = %file, "autoload include");
                script.add_include(file);
                added += 1;
            }
        }
    }
    added
}

/// `.php` files under `root`, sorted, skipping dependency and hidden directories
pub fn discover_php_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            AnalyzerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("walk error: {}", e),
            ))
        })?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("php"))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(root = %root.display(), files = files.len(), "discovered");
    Ok(files)
}
