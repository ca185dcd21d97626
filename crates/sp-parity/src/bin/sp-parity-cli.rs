#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sp_parity::{
    EngineConfig, ParityEngine, RunMetadata, write_csv_report, write_json_report,
};
use sp_types::Verdict;

/// Compare the outputs of two pipeline runs over the same session.
#[derive(Debug, Parser)]
#[command(name = "sp-parity-cli", version)]
struct Cli {
    /// Output tree of the run under test.
    #[arg(long = "new", value_name = "DIR")]
    new_root: PathBuf,

    /// Output tree of the reference run.
    #[arg(long = "old", value_name = "DIR")]
    old_root: PathBuf,

    /// YAML file overriding the default configuration.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum absolute deviation; overrides the configuration.
    #[arg(long)]
    tolerance: Option<f64>,

    #[arg(long, value_name = "FILE")]
    json_out: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    csv_out: Option<PathBuf>,

    /// Exit non-zero when any entry is FAIL or ERROR.
    #[arg(long)]
    require_green: bool,

    /// Log every comparison (still overridable with SP_PARITY_LOG).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("sp-parity-cli error: {error}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("SP_PARITY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("sp-parity-cli: tracing disabled: {error}");
    }
}

/// `Ok(false)` when the report is not green and `--require-green` was given.
fn run(cli: &Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_path(path)?,
        None => EngineConfig::default(),
    };
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }

    let engine = ParityEngine::new(&config)?;
    let report = engine.run(&cli.new_root, &cli.old_root)?;

    for verdict in [Verdict::Error, Verdict::Fail, Verdict::Warn, Verdict::Skip] {
        for entry in report.entries_with(verdict) {
            println!(
                "{:<5} {} [{}] {}",
                verdict,
                entry.relative_path(),
                entry.file_type(),
                entry.detail()
            );
        }
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    println!("{}", report.summary.render_plain());

    if let Some(path) = &cli.csv_out {
        write_csv_report(path, &report)?;
        println!("wrote csv={}", path.display());
    }
    let green = report.is_green();
    if let Some(path) = &cli.json_out {
        let metadata = RunMetadata::capture(&cli.new_root, &cli.old_root, config.tolerance);
        write_json_report(path, &report.with_metadata(metadata))?;
        println!("wrote json={}", path.display());
    }

    Ok(green || !cli.require_green)
}
