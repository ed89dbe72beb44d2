//! Flatten a raw daily series into typed [`PriceRecord`] rows.
//!
//! Per-day objects are read positionally as Open, High, Low, Close, Volume;
//! the provider's own field names are dropped. Any coercion failure rejects
//! the whole batch for the symbol.

use super::provider::DailySeries;
use super::schema::PriceRecord;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

const VALUE_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Normalization failures. These are not per-symbol recoverable: they abort
/// the extraction run.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("{symbol}: time series has no entries")]
    EmptySeries { symbol: String },

    #[error("{symbol} {date}: expected {expected} fields per day, found {found}")]
    FieldCount {
        symbol: String,
        date: String,
        expected: usize,
        found: usize,
    },

    #[error("{symbol}: invalid date {date:?}")]
    InvalidDate { symbol: String, date: String },

    #[error("{symbol} {date}: cannot coerce {column} value {value} to {target}")]
    Coercion {
        symbol: String,
        date: String,
        column: &'static str,
        value: String,
        target: &'static str,
    },
}

/// Normalize a daily series for `symbol` into rows, in source order.
pub fn normalize_series(
    symbol: &str,
    series: &DailySeries,
) -> Result<Vec<PriceRecord>, NormalizeError> {
    if series.is_empty() {
        return Err(NormalizeError::EmptySeries {
            symbol: symbol.to_string(),
        });
    }

    let mut records = Vec::with_capacity(series.len());

    for (date_str, day) in series {
        let values: Vec<&Value> = match day {
            Value::Object(fields) => fields.values().collect(),
            _ => Vec::new(),
        };
        if values.len() != VALUE_COLUMNS.len() {
            return Err(NormalizeError::FieldCount {
                symbol: symbol.to_string(),
                date: date_str.clone(),
                expected: VALUE_COLUMNS.len(),
                found: values.len(),
            });
        }

        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|_| {
            NormalizeError::InvalidDate {
                symbol: symbol.to_string(),
                date: date_str.clone(),
            }
        })?;

        let coerce_f64 = |idx: usize| {
            as_f64(values[idx])
                .ok_or_else(|| coercion_error(symbol, date_str, idx, values[idx], "float64"))
        };

        records.push(PriceRecord {
            date,
            symbol: symbol.to_string(),
            open: coerce_f64(0)?,
            high: coerce_f64(1)?,
            low: coerce_f64(2)?,
            close: coerce_f64(3)?,
            volume: as_i64(values[4])
                .ok_or_else(|| coercion_error(symbol, date_str, 4, values[4], "int64"))?,
        });
    }

    Ok(records)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn coercion_error(
    symbol: &str,
    date: &str,
    idx: usize,
    value: &Value,
    target: &'static str,
) -> NormalizeError {
    NormalizeError::Coercion {
        symbol: symbol.to_string(),
        date: date.to_string(),
        column: VALUE_COLUMNS[idx],
        value: value.to_string(),
        target,
    }
}
