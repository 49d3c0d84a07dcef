//! windfetch - marine weather telemetry fetcher
//!
//! Reference caller for the fetch pipeline: loads the source registry,
//! runs fetch cycles and prints the readings as JSON.
//!
//! # Usage
//!
//! ```bash
//! # One source
//! windfetch fetch brambles
//!
//! # Every configured source, concurrently
//! windfetch fetch-all
//!
//! # Validate a config file
//! windfetch check-config ./windfetch.toml
//! ```
//!
//! # Environment Variables
//!
//! - `WINDFETCH_CONFIG`: Path to the TOML config (default: ./windfetch.toml, then built-ins)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use windfetch::config::{self, WindfetchConfig, CONFIG_ENV_VAR, LOCAL_CONFIG_FILE};
use windfetch::{FetchError, FetchOrchestrator, WeatherReading};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "windfetch")]
#[command(about = "Fetch and normalize marine weather telemetry")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides WINDFETCH_CONFIG and ./windfetch.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Fetch one or more sources by id
    Fetch {
        #[arg(required = true, value_name = "SOURCE")]
        sources: Vec<String>,
    },

    /// Fetch every configured source concurrently
    FetchAll,

    /// List configured sources
    Sources,

    /// Validate a config file and report unknown keys
    CheckConfig {
        /// File to check (default: the normal search order)
        path: Option<PathBuf>,
    },
}

// ============================================================================
// Output
// ============================================================================

#[derive(serde::Serialize)]
struct FetchOutcome<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reading: Option<&'a WeatherReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print results as pretty JSON. Returns the number of failures.
fn print_results(results: &[(String, Result<WeatherReading, FetchError>)]) -> Result<usize> {
    let outcomes: Vec<FetchOutcome<'_>> = results
        .iter()
        .map(|(id, r)| FetchOutcome {
            source: id,
            reading: r.as_ref().ok(),
            error: r.as_ref().err().map(|e| e.to_string()),
        })
        .collect();
    let json = if outcomes.len() == 1 {
        serde_json::to_string_pretty(&outcomes[0])
    } else {
        serde_json::to_string_pretty(&outcomes)
    }
    .context("Failed to serialize readings")?;
    println!("{json}");
    Ok(results.iter().filter(|(_, r)| r.is_err()).count())
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&PathBuf>) -> Result<WindfetchConfig> {
    match path {
        Some(p) => WindfetchConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(WindfetchConfig::load()),
    }
}

fn run_check_config(path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
    let (config, warnings) = WindfetchConfig::load_from_file_with_warnings(&path)
        .with_context(|| format!("{} is not a valid config", path.display()))?;
    for w in &warnings {
        println!("warning: {w}");
    }
    println!(
        "{}: OK ({} sources, {} warnings)",
        path.display(),
        config.registry().len(),
        warnings.len()
    );
    Ok(())
}

fn run_sources(config: &WindfetchConfig) {
    for source in config.registry().iter() {
        let fallback = source
            .fallback
            .as_ref()
            .map(|f| format!(" -> fallback {}", f.parser.tag()))
            .unwrap_or_default();
        println!(
            "{:<16} {:<12} {}{}  {}",
            source.id,
            source.primary.parser.tag(),
            source.primary.url.split('?').next().unwrap_or_default(),
            fallback,
            source.name
        );
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    if let SubCommand::CheckConfig { path } = &args.command {
        return run_check_config(path.clone().or_else(|| args.config.clone()));
    }

    config::init(load_config(args.config.as_ref())?);
    let cfg = config::get();
    let registry = cfg.registry();

    if let SubCommand::Sources = args.command {
        run_sources(cfg);
        return Ok(());
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, cancelling fetches...");
        shutdown_token.cancel();
    });

    let orchestrator =
        FetchOrchestrator::from_config(&cfg.http).context("Failed to build HTTP transport")?;

    let results = match args.command {
        SubCommand::Fetch { sources } => {
            let mut selected = Vec::with_capacity(sources.len());
            let mut results = Vec::new();
            for id in &sources {
                match registry.get(id) {
                    Some(s) => selected.push(s),
                    None => {
                        warn!(source = %id, known = ?registry.ids(), "Unknown source");
                        results.push((id.clone(), Err(FetchError::UnknownSource(id.clone()))));
                    }
                }
            }
            results.extend(orchestrator.fetch_all(selected, &cancel_token).await);
            results
        }
        SubCommand::FetchAll => orchestrator.fetch_all(registry.iter(), &cancel_token).await,
        SubCommand::Sources | SubCommand::CheckConfig { .. } => Vec::new(),
    };

    let failures = print_results(&results)?;
    if failures > 0 {
        anyhow::bail!("{failures} of {} sources failed", results.len());
    }
    Ok(())
}
