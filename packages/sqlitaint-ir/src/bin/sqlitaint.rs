/*
 * sqlitaint CLI
 *
 * Usage:
 *   sqlitaint ./project
 *   sqlitaint ./project --preset thorough --output report.json
 *   sqlitaint ./project --config sqlitaint.yaml --laravel -v
 *
 * The JSON report goes to stdout (or --output); logs go to stderr.
 * Exit status: 0 when the scan completed, 1 on a configuration error or an
 * aborted analysis.
 */

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sqlitaint_ir::config::{AnalysisConfig, Preset, SolverKind, Validatable};
use sqlitaint_ir::features::report::JsonReporter;
use sqlitaint_ir::{AnalyzerError, Scanner};

#[derive(Debug, Parser)]
#[command(name = "sqlitaint", version, about = "SQL injection taint analysis for PHP projects")]
struct Cli {
    /// Project root to scan
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// YAML configuration file (v1)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preset used when no config file is given: fast, balanced, thorough, custom
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Solver backend: lightweight or z3
    #[arg(long, value_name = "NAME")]
    solver: Option<String>,

    /// Treat Laravel routes as input sources
    #[arg(long)]
    laravel: bool,

    /// Print the simplified IR of every file to stderr
    #[arg(long)]
    dump_ir: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig, AnalyzerError> {
    let mut config = match (&cli.config, &cli.preset) {
        (Some(path), _) => AnalysisConfig::from_yaml(&path.to_string_lossy())?,
        (None, Some(name)) => {
            let preset = Preset::from_str(name)
                .map_err(|_| sqlitaint_ir::config::ConfigError::UnknownPreset(name.clone()))?;
            AnalysisConfig::preset(preset)
        }
        (None, None) => AnalysisConfig::default(),
    };
    if cli.config.is_some() && cli.preset.is_some() {
        warn!("--preset ignored, the config file names its own preset");
    }
    if let Some(solver) = &cli.solver {
        config = config.solver(SolverKind::from_str(solver)?);
    }
    if cli.laravel {
        config = config.laravel(true);
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), AnalyzerError> {
    let config = load_config(cli)?;
    info!(
        dir = %cli.dir.display(),
        max_depth = config.max_depth,
        max_paths = config.max_paths,
        solver = config.solver.as_str(),
        laravel = config.laravel,
        "scanning"
    );

    let outcome = Scanner::new(config)
        .with_ir_dump(cli.dump_ir)
        .scan_dir(&cli.dir)?;

    if let Some(dump) = &outcome.ir_dump {
        eprintln!("{}", dump);
    }
    for failed in &outcome.errors {
        warn!(file = %failed.path, error = %failed.error, "not analyzed");
    }

    match &cli.output {
        Some(path) => {
            JsonReporter::save(&outcome.report, path)?;
            info!(output = %path.display(), results = outcome.report.results.len(), "report written");
        }
        None => println!("{}", JsonReporter::to_string(&outcome.report)?),
    }
    Ok(())
}
