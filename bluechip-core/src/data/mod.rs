//! Market data: provider trait, Alpha Vantage client, normalization and schema

pub mod alphavantage;
pub mod normalize;
pub mod provider;
pub mod schema;

pub use alphavantage::{parse_time_series, AlphaVantageProvider, DEFAULT_BASE_URL};
pub use normalize::{normalize_series, NormalizeError};
pub use provider::{ApiKey, DailySeries, DataError, TimeSeriesProvider};
pub use schema::{PriceRecord, SchemaError, TableSchema, COLUMNS};
