//! Extraction engine: walks the catalog, fetches each symbol once, and
//! appends the normalized rows to the output table.
//!
//! Fetch failures are isolated per symbol: the symbol is recorded as skipped
//! and the run continues. Normalization and table failures abort the run.

use crate::catalog::Catalog;
use crate::data::normalize::{normalize_series, NormalizeError};
use crate::data::provider::{DataError, TimeSeriesProvider};
use crate::table::{OutputTable, TableError};
use log::{info, warn};
use std::path::Path;
use thiserror::Error;

/// Default number of symbols appended per run.
pub const DEFAULT_SYMBOL_CAP: usize = 25;

/// Fatal extraction errors.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
}

/// Progress callback for the per-symbol loop.
pub trait ExtractProgress {
    /// Called before fetching a symbol. `index` counts attempts so far.
    fn on_start(&self, symbol: &str, index: usize);

    /// Called after a symbol is either appended (`Ok(rows)`) or skipped.
    fn on_complete(&self, symbol: &str, result: Result<usize, &DataError>);

    /// Called once the loop ends.
    fn on_batch_complete(&self, appended: usize, skipped: usize, attempted: usize);
}

/// Progress reporter that writes through the `log` facade.
pub struct LogProgress;

impl ExtractProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize) {
        info!("[{}] Fetching {symbol}...", index + 1);
    }

    fn on_complete(&self, symbol: &str, result: Result<usize, &DataError>) {
        match result {
            Ok(rows) => info!("Appended {symbol} data to table ({rows} rows)"),
            Err(e) => warn!("Response error for {symbol}, skipped: {e}"),
        }
    }

    fn on_batch_complete(&self, appended: usize, skipped: usize, attempted: usize) {
        info!("Extraction complete: {appended}/{attempted} appended, {skipped} skipped");
    }
}

/// Outcome of an extraction run.
#[derive(Debug)]
pub struct ExtractionSummary {
    pub table: OutputTable,
    /// Every symbol a fetch was issued for, in order.
    pub attempted: Vec<String>,
    /// Appended symbols and their row counts, in order.
    pub appended: Vec<(String, usize)>,
    /// Skipped symbols and why.
    pub skipped: Vec<(String, DataError)>,
}

impl ExtractionSummary {
    pub fn skipped_symbols(&self) -> Vec<&str> {
        self.skipped.iter().map(|(s, _)| s.as_str()).collect()
    }

    pub fn total_rows(&self) -> usize {
        self.appended.iter().map(|(_, rows)| rows).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Sequential, single-attempt extraction driver.
pub struct ExtractionEngine<'a> {
    provider: &'a dyn TimeSeriesProvider,
    symbol_cap: usize,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(provider: &'a dyn TimeSeriesProvider, symbol_cap: usize) -> Self {
        Self {
            provider,
            symbol_cap,
        }
    }

    /// Extract the catalog into a fresh table at `table_path`.
    ///
    /// The table is created (header only) before the first request. The cap
    /// counts appended symbols; skipped ones do not use it up, and symbols
    /// past the cap are never attempted.
    pub fn run(
        &self,
        catalog: &Catalog,
        table_path: &Path,
        progress: &dyn ExtractProgress,
    ) -> Result<ExtractionSummary, ExtractError> {
        let table = OutputTable::create(table_path)?;
        info!(
            "Extracting up to {} of {} symbols from {} into {}",
            self.symbol_cap,
            catalog.len(),
            self.provider.name(),
            table_path.display()
        );

        let mut attempted: Vec<String> = Vec::new();
        let mut appended: Vec<(String, usize)> = Vec::new();
        let mut skipped: Vec<(String, DataError)> = Vec::new();

        for entry in catalog.iter() {
            if appended.len() >= self.symbol_cap {
                break;
            }

            let symbol = entry.symbol.as_str();
            progress.on_start(symbol, attempted.len());
            attempted.push(symbol.to_string());

            let series = match self.provider.fetch_daily(symbol) {
                Ok(series) => series,
                Err(e) => {
                    progress.on_complete(symbol, Err(&e));
                    skipped.push((symbol.to_string(), e));
                    continue;
                }
            };
            info!("Extracted data for {symbol} ({})", entry.name);

            let records = normalize_series(symbol, &series)?;
            let rows = table.append(&records)?;
            progress.on_complete(symbol, Ok(rows));
            appended.push((symbol.to_string(), rows));
        }

        progress.on_batch_complete(appended.len(), skipped.len(), attempted.len());

        Ok(ExtractionSummary {
            table,
            attempted,
            appended,
            skipped,
        })
    }
}
