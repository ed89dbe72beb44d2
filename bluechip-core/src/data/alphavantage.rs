//! Alpha Vantage data provider.
//!
//! Fetches the full daily OHLCV history from the `TIME_SERIES_DAILY` endpoint
//! with `outputsize=full`. One blocking request per symbol; failures are
//! classified into [`DataError`] and never retried.
//!
//! Alpha Vantage answers most failures with HTTP 200 and a JSON body that
//! lacks the time-series key, carrying an `"Error Message"`, `"Note"` or
//! `"Information"` field instead.

use super::provider::{ApiKey, DailySeries, DataError, TimeSeriesProvider};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// TIME_SERIES_DAILY response envelope.
#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<Value>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Alpha Vantage data provider.
pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: ApiKey,
}

impl AlphaVantageProvider {
    /// Build a provider against `base_url` (scheme + host, no trailing path).
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build the daily time-series URL for a symbol.
    fn daily_url(base_url: &str, symbol: &str, api_key: &ApiKey) -> String {
        format!(
            "{base_url}/query?function=TIME_SERIES_DAILY&symbol={symbol}\
             &outputsize=full&apikey={}",
            api_key.as_str()
        )
    }
}

/// Parse a TIME_SERIES_DAILY body into the raw daily series.
pub fn parse_time_series(symbol: &str, body: &str) -> Result<DailySeries, DataError> {
    let resp: DailyResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
    })?;

    // An empty series still counts as a response; normalization rejects it.
    if let Some(Value::Object(series)) = resp.time_series {
        return Ok(series);
    }

    if let Some(msg) = resp.error_message {
        return Err(DataError::ProviderError(msg));
    }
    if let Some(msg) = resp.note.or(resp.information) {
        return Err(DataError::RateLimited(msg));
    }

    Err(DataError::MissingTimeSeries {
        symbol: symbol.to_string(),
    })
}

impl TimeSeriesProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch_daily(&self, symbol: &str) -> Result<DailySeries, DataError> {
        let url = Self::daily_url(&self.base_url, symbol, &self.api_key);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(format!("read body for {symbol}: {e}")))?;

        match parse_time_series(symbol, &body) {
            Err(DataError::ResponseFormatChanged(_)) if !status.is_success() => {
                Err(DataError::HttpStatus {
                    status: status.as_u16(),
                })
            }
            other => other,
        }
    }
}
