//! Pipeline Service - Renders the COVID-19 charts from the OWID dataset
//!
//! Responsibilities:
//! - Load the dataset from the OWID URL or a local collector snapshot
//! - Split country rows from continent rollups
//! - Derive latest snapshot, continent means, comparison and monthly tables
//! - Write the four PNG charts (placeholders when a chart has no data)
//! - Optionally export the country rows as CSV
//!
//! Usage:
//!   # Straight from OWID:
//!   cargo run --bin pipeline
//!
//!   # From a stored snapshot, custom chart config:
//!   cargo run --bin pipeline -- --input data/raw/<uuid>.csv --config charts.json

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pipeline::config::{RenderConfig, Settings};
use pipeline::export::write_csv;
use pipeline::fetch::{load_file_or_empty, Fetcher};
use pipeline::{render_all, Stages, Summary};

#[derive(Parser, Debug)]
#[command(name = "pipeline", about = "Renders COVID-19 charts from the OWID dataset")]
struct Args {
    /// CSV URL (overrides DATA_URL)
    #[arg(long)]
    url: Option<String>,

    /// Local CSV file instead of the URL (overrides DATA_FILE)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Chart output directory (overrides OUTPUT_DIR and the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Render config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch timeout in seconds (overrides FETCH_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Also write the country rows to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

fn render_config(args: &Args, settings: &Settings) -> Result<RenderConfig> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig {
            output_dir: settings.output_dir.clone(),
            ..RenderConfig::default()
        },
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    let settings = Settings::from_env();
    let config = render_config(&args, &settings)?;

    println!("=== OWID COVID-19 Pipeline ===");
    println!("Output: {}", config.output_dir.display());

    // =========================================================================
    // Load
    // =========================================================================

    let data_file = args.input.clone().or_else(|| settings.data_file.clone());
    let raw = match &data_file {
        Some(path) => {
            println!("Source: {}", path.display());
            load_file_or_empty(path)
        }
        None => {
            let url = args.url.as_deref().unwrap_or(&settings.data_url);
            let timeout = args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(settings.fetch_timeout);
            println!("Source: {}", url);
            Fetcher::new(timeout)?.fetch_or_empty(url).await
        }
    };

    if raw.is_empty() {
        println!("Could not load data. Check the URL or your network connection.");
        anyhow::bail!("no data loaded");
    }
    println!("Loaded {} rows", raw.len());

    // =========================================================================
    // Stages
    // =========================================================================

    let stages = Stages::prepare(&raw, &config).context("Failed to prepare dataset")?;
    match Summary::from_latest(&stages.latest) {
        Ok(summary) => println!(
            "Countries: {}, cases: {:.0}, deaths: {:.0}, fatality rate: {:.2}%",
            summary.countries, summary.total_cases, summary.total_deaths, summary.fatality_rate_pct
        ),
        Err(e) => warn!(error = %e, "summary unavailable"),
    }

    if let Some(path) = &args.export {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&stages.partition.entity_rows, BufWriter::new(file))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported {} rows to {}", stages.partition.entity_rows.len(), path.display());
    }

    // =========================================================================
    // Charts
    // =========================================================================

    println!("\nRendering charts...");
    let mut rendered = 0;
    let mut failed = 0;
    for (kind, result) in render_all(&stages, &config) {
        match result {
            Ok(outcome) => {
                let note = if outcome.is_placeholder() { " (no data)" } else { "" };
                println!("  ✓ {}{}: {}", kind.title(), note, outcome.path().display());
                rendered += 1;
            }
            Err(e) => {
                warn!(chart = ?kind, error = %e, "chart skipped");
                eprintln!("  ✗ {}: {}", kind.title(), e);
                failed += 1;
            }
        }
    }

    println!("\n=== Pipeline Summary ===");
    println!("Charts written: {}", rendered);
    println!("Charts failed: {}", failed);

    if failed > 0 {
        anyhow::bail!("{} chart(s) failed", failed);
    }
    Ok(())
}
