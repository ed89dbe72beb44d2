//! Bluechip CLI — extract daily prices for a blue chip ticker list, then
//! finalize the table.
//!
//! Steps:
//! - load `.env`, initialize logging
//! - read the `SYMBOL<TAB>NAME` ticker list
//! - fetch up to `symbol_cap` symbols from Alpha Vantage into the CSV table
//! - filter by year, then rewrite the CSV or write Parquet shards

use anyhow::{bail, Context, Result};
use bluechip_core::{
    select_finalizer, AlphaVantageProvider, ApiKey, Catalog, ExtractionEngine, ExtractionSummary,
    FinalizeReport, LogProgress, PipelineConfig, YearRange,
};
use clap::{ArgAction, Parser};
use log::{debug, info};
use std::path::PathBuf;

const API_KEY_ENV: &str = "ALPHA_VANTAGE_KEY";

#[derive(Parser)]
#[command(
    name = "bluechip",
    about = "Extract US blue chip daily prices from Alpha Vantage"
)]
struct Cli {
    /// Tab-separated ticker list, one `SYMBOL<TAB>NAME` per line.
    #[arg(long)]
    blue_chips_lst: PathBuf,

    /// Alpha Vantage key. The ALPHA_VANTAGE_KEY environment variable wins if set.
    #[arg(long)]
    api_key: Option<String>,

    /// Write Parquet shards (true) or rewrite the CSV in place (false).
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    repartition: bool,

    /// First year kept, inclusive.
    #[arg(long, default_value_t = 2000)]
    start_year: i32,

    /// Last year kept, inclusive.
    #[arg(long, default_value_t = 2024)]
    end_year: i32,

    /// Optional TOML pipeline config (output paths, cap, shard count).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if !cli.blue_chips_lst.exists() {
        bail!(
            "Missing blue chips list text file: {}",
            cli.blue_chips_lst.display()
        );
    }

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    debug!("pipeline config: {config:?}");

    let api_key = resolve_api_key(cli.api_key.as_deref())?;

    let catalog = Catalog::from_file(&cli.blue_chips_lst)?;
    info!(
        "Loaded {} tickers from {}",
        catalog.len(),
        cli.blue_chips_lst.display()
    );

    let provider = AlphaVantageProvider::new(&config.base_url, api_key)?;
    let engine = ExtractionEngine::new(&provider, config.symbol_cap);
    let summary = engine.run(&catalog, &config.output_csv, &LogProgress)?;

    println!("CSV file containing US Blue Chips stocks generated");
    print_skipped(&summary);

    let finalizer = select_finalizer(cli.repartition, &config);
    let range = YearRange::new(cli.start_year, cli.end_year);
    let report = finalizer
        .finalize(&summary.table, range)
        .with_context(|| format!("finalizing with {}", finalizer.name()))?;
    print_report(&report);

    println!("Extraction completed");
    Ok(())
}

/// Environment first, then the flag.
fn resolve_api_key(flag: Option<&str>) -> Result<ApiKey> {
    let from_env = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty());

    match from_env.or_else(|| flag.map(String::from)) {
        Some(key) => Ok(ApiKey::new(key)),
        None => bail!("no API key: set {API_KEY_ENV} or pass --api-key"),
    }
}

fn print_skipped(summary: &ExtractionSummary) {
    if summary.all_succeeded() {
        println!(
            "All {} attempted symbols extracted ({} rows)",
            summary.attempted.len(),
            summary.total_rows()
        );
        return;
    }

    println!(
        "Skipped {} of {} symbols:",
        summary.skipped.len(),
        summary.attempted.len()
    );
    for (symbol, err) in &summary.skipped {
        println!("  {symbol}: {err}");
    }
}

fn print_report(report: &FinalizeReport) {
    println!(
        "{}: kept {} of {} rows",
        report.finalizer, report.rows_kept, report.rows_in
    );
    if report.location.is_dir() {
        println!(
            "Data repartitioned into {} parquet files. Located at {}",
            report.shard_rows.len(),
            report.location.display()
        );
    } else {
        println!("Filtered table written to {}", report.location.display());
    }
}
