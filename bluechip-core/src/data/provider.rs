//! Time-series provider trait and per-symbol fetch errors.
//!
//! The TimeSeriesProvider trait abstracts over the market-data source so the
//! extraction engine can be driven by Alpha Vantage in production and by an
//! in-memory mock in tests.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Raw `"Time Series (Daily)"` object: date string → per-day field object,
/// in the order the provider returned it.
pub type DailySeries = Map<String, Value>;

/// Errors from a single fetch attempt.
///
/// Every variant is recoverable at the symbol level: the engine records the
/// symbol as skipped and moves on.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} with unreadable body")]
    HttpStatus { status: u16 },

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("response has no \"Time Series (Daily)\" object for {symbol}")]
    MissingTimeSeries { symbol: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },
}

/// Provider credential, sent as the `apikey` query parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Source of daily price history.
pub trait TimeSeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the complete daily history for a symbol. One attempt, no retry.
    fn fetch_daily(&self, symbol: &str) -> Result<DailySeries, DataError>;
}
