//! Bluechip Core — daily price extraction for a catalog of blue chip tickers.
//!
//! Pipeline, in order:
//! - Ticker catalog loading (`SYMBOL<TAB>NAME` text file)
//! - Extraction: one Alpha Vantage `TIME_SERIES_DAILY` request per symbol,
//!   normalized into a fixed `Date,Symbol,Open,High,Low,Close,Volume` CSV
//! - Finalization: inclusive year-range filter, then either an in-place CSV
//!   rewrite or round-robin Parquet shards

pub mod catalog;
pub mod config;
pub mod data;
pub mod extract;
pub mod finalize;
pub mod table;

pub use catalog::{Catalog, CatalogError, TickerEntry};
pub use config::{ConfigError, PipelineConfig};
pub use data::{
    normalize_series, AlphaVantageProvider, ApiKey, DailySeries, DataError, NormalizeError,
    PriceRecord, TimeSeriesProvider,
};
pub use extract::{
    ExtractError, ExtractProgress, ExtractionEngine, ExtractionSummary, LogProgress,
};
pub use finalize::{
    load_manifest, load_shards, select_finalizer, FilterRewrite, FinalizeError, FinalizeReport,
    Finalizer, PartitionedParquet, ShardManifest, YearRange,
};
pub use table::{OutputTable, TableError};
