//! # Traverso - command-line front end
//!
//! Loads flute documents and a fingering chart, runs the acoustic engine
//! from `traverso-core` and prints a text table or a JSON report.
//!
//! ## Commands
//! - `traverso analyze` - admittance, resonances, inharmonicity and descriptors per note
//! - `traverso optimize` - embouchure chimney height that tunes each note
//! - `traverso reflect` - time-domain reflection function of one fingering
//! - `traverso import-legacy` - convert a per-joint measurement directory
//! - `traverso default-config` - write the default configuration
//!
//! Logging goes to stderr; set `RUST_LOG=debug` for per-iteration details.

mod report;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use report::Format;
use session::{Overrides, Session};

#[derive(Parser)]
#[command(name = "traverso")]
#[command(about = "Acoustic analysis and chimney tuning for baroque flutes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every note of a chart on one or more flutes
    Analyze(AnalyzeArgs),

    /// Solve the embouchure chimney height for each note
    Optimize(OptimizeArgs),

    /// Reflection function of one fingering
    Reflect(ReflectArgs),

    /// Convert a legacy per-joint directory into a flute document
    ImportLegacy(ImportArgs),

    /// Write the default configuration as JSON
    DefaultConfig(DefaultConfigArgs),
}

/// Where and how the report is written
#[derive(Args)]
struct OutputArgs {
    /// Report format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct DefaultConfigArgs {
    /// Write the configuration to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Flute documents (JSON, millimetres)
    #[arg(required = true)]
    flutes: Vec<PathBuf>,

    /// Fingering chart
    #[arg(short, long)]
    chart: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct OptimizeArgs {
    /// Flute document (JSON, millimetres)
    flute: PathBuf,

    /// Fingering chart
    #[arg(short, long)]
    chart: PathBuf,

    /// Only optimize these notes
    #[arg(short, long)]
    note: Vec<String>,

    /// Save each tuned flute as `<dir>/<flute>-<note>.json`
    #[arg(long)]
    save_dir: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ReflectArgs {
    /// Flute document (JSON, millimetres)
    flute: PathBuf,

    /// Fingering chart
    #[arg(short, long)]
    chart: PathBuf,

    /// Note to play
    #[arg(short, long)]
    note: String,

    /// Frequency step of the sampled spectrum in Hz
    #[arg(long, default_value_t = 10.0)]
    df: f64,

    /// Number of time samples (even)
    #[arg(long, default_value_t = 1024)]
    samples: usize,

    #[command(flatten)]
    overrides: Overrides,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ImportArgs {
    /// Directory holding headjoint.json, left.json, right.json and foot.json
    dir: PathBuf,

    /// Flute document to write
    #[arg(short, long)]
    output: PathBuf,

    /// Continuity tolerance in metres
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Analyze(args) => analyze(args),
        Commands::Optimize(args) => optimize(args),
        Commands::Reflect(args) => reflect(args),
        Commands::ImportLegacy(args) => import_legacy(args),
        Commands::DefaultConfig(args) => default_config(args),
    }
}

fn analyze(args: AnalyzeArgs) -> Result<ExitCode> {
    let session = Session::load(&args.flutes, &args.chart, &args.overrides)?;
    let results = session.analyze();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    let rendered = report::analysis(&results, args.output.format)?;
    report::emit(&rendered, args.output.output.as_deref())?;

    if failed > 0 {
        tracing::warn!("{} of {} flutes could not be analyzed", failed, results.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn optimize(args: OptimizeArgs) -> Result<ExitCode> {
    let session = Session::load(std::slice::from_ref(&args.flute), &args.chart, &args.overrides)?
        .with_notes(&args.note)?;
    let results = session.optimize()?;

    if let Some(dir) = &args.save_dir {
        session::save_solutions(&results, dir)?;
    }

    let rendered = report::optimization(&results, args.output.format)?;
    report::emit(&rendered, args.output.output.as_deref())?;

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        tracing::warn!("{} of {} notes could not be tuned", failed, results.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn reflect(args: ReflectArgs) -> Result<ExitCode> {
    let session = Session::load(std::slice::from_ref(&args.flute), &args.chart, &args.overrides)?;
    let reflection = session.reflect(&args.note, args.df, args.samples)?;
    let rendered = report::reflection(&args.note, &reflection, args.output.format)?;
    report::emit(&rendered, args.output.output.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

fn import_legacy(args: ImportArgs) -> Result<ExitCode> {
    let flute = traverso_core::legacy::import_legacy(&args.dir, args.tolerance)
        .with_context(|| format!("Failed to import {}", args.dir.display()))?;
    traverso_core::document::save_flute(&flute, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Wrote '{}' to {}", flute.name, args.output.display());
    Ok(ExitCode::SUCCESS)
}

fn default_config(args: DefaultConfigArgs) -> Result<ExitCode> {
    let config = traverso_core::AnalysisConfig::default();
    match &args.output {
        Some(path) => config.save(path)?,
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(ExitCode::SUCCESS)
}
