//! Balerion CLI: collect, update, check and validate 1-minute bar datasets.
//!
//! Commands:
//! - `collect`: backfill the full available history for every symbol
//! - `update`: merge the most recent days into existing datasets
//! - `check`: read-only report on every dataset file
//! - `validate`: run the quality rules, failing on any violation

use anyhow::{Context, Result};
use balerion_core::data::BridgeTerminal;
use balerion_core::{CollectorConfig, StopFlag};
use balerion_runner::{
    check_all, collect_all, update_all, validate_all, BatchSummary, RunError, StdoutProgress,
    UpdateOptions, DEFAULT_UPDATE_DAYS, MAX_UPDATE_DAYS,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "balerion.toml";

#[derive(Parser)]
#[command(
    name = "balerion",
    about = "Balerion: 1-minute FX and index bar collector"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./balerion.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Terminal bridge URL, overriding the config file.
    #[arg(long, global = true)]
    bridge_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the maximum available history for every configured symbol.
    Collect,
    /// Fetch recent bars and merge them into existing datasets.
    Update {
        /// Number of days of recent data to fetch (1 to 3650).
        #[arg(
            long,
            default_value_t = DEFAULT_UPDATE_DAYS,
            value_parser = clap::value_parser!(i64).range(1..=MAX_UPDATE_DAYS)
        )]
        days: i64,

        /// Update even when a dataset is fresh.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Report row counts, spans, gaps and sizes of every dataset.
    Check,
    /// Run the data quality rules over every dataset.
    Validate {
        /// Validate only this symbol.
        #[arg(long)]
        symbol: Option<String>,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.bridge_url {
        config.bridge.url = url;
    }

    match cli.command {
        Commands::Collect => run_collect(&config),
        Commands::Update { days, force } => run_update(&config, days, force),
        Commands::Check => Ok(run_check(&config)),
        Commands::Validate { symbol } => run_validate(&config, symbol.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<CollectorConfig> {
    let config = match path {
        Some(path) => CollectorConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            CollectorConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => CollectorConfig::default(),
    };
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        symbols = config.symbols.len(),
        "config loaded"
    );
    Ok(config)
}

/// Stop flag raised by Ctrl-C. A second Ctrl-C exits without waiting for
/// the in-flight request.
fn install_interrupt_handler() -> Result<StopFlag> {
    let stop = StopFlag::new();
    let handle = stop.clone();
    ctrlc::set_handler(move || {
        if interrupt(&handle) {
            tracing::warn!("second interrupt, exiting now");
            std::process::exit(1);
        }
        tracing::warn!("interrupt received, stopping after the current request");
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(stop)
}

/// Raise the stop flag; true when it was already raised.
fn interrupt(stop: &StopFlag) -> bool {
    stop.request()
}

fn connect(config: &CollectorConfig) -> Result<BridgeTerminal> {
    BridgeTerminal::new(&config.bridge)
        .with_context(|| format!("cannot reach terminal bridge at {}", config.bridge.url))
}

fn batch_exit(result: Result<BatchSummary, RunError>) -> Result<ExitCode> {
    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(RunError::Interrupted) => Ok(ExitCode::FAILURE),
        Err(e) => Err(e.into()),
    }
}

fn run_collect(config: &CollectorConfig) -> Result<ExitCode> {
    let stop = install_interrupt_handler()?;
    let mut terminal = connect(config)?;
    batch_exit(collect_all(&mut terminal, config, &stop, &StdoutProgress))
}

fn run_update(config: &CollectorConfig, days: i64, force: bool) -> Result<ExitCode> {
    let stop = install_interrupt_handler()?;
    let mut terminal = connect(config)?;
    let options = UpdateOptions::new(days, force);
    batch_exit(update_all(&mut terminal, config, &options, &stop, &StdoutProgress))
}

fn run_check(config: &CollectorConfig) -> ExitCode {
    if check_all(config, &StdoutProgress).all_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_validate(config: &CollectorConfig, symbol: Option<&str>) -> Result<ExitCode> {
    let summary = validate_all(config, symbol, Utc::now(), &StdoutProgress)?;
    Ok(if summary.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
