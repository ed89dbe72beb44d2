//! Fixed tabular schema shared by the CSV table and the Parquet shards.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column order of the output table.
pub const COLUMNS: [&str; 7] = ["Date", "Symbol", "Open", "High", "Low", "Close", "Volume"];

/// One normalized daily OHLCV row for a symbol.
///
/// `low <= open, close <= high` is not checked; values pass through as the
/// provider reported them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: i64,
}

/// Expected schema for shard data
pub struct TableSchema;

impl TableSchema {
    /// Polars schema of a Parquet shard
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("Date".into(), DataType::Date),
            Field::new("Symbol".into(), DataType::String),
            Field::new("Open".into(), DataType::Float64),
            Field::new("High".into(), DataType::Float64),
            Field::new("Low".into(), DataType::Float64),
            Field::new("Close".into(), DataType::Float64),
            Field::new("Volume".into(), DataType::Int64),
        ])
    }

    /// True if a CSV header matches the fixed column order exactly.
    pub fn header_matches<'a>(header: impl IntoIterator<Item = &'a str>) -> bool {
        header.into_iter().eq(COLUMNS.iter().copied())
    }

    /// Check that every shard column is present with its expected dtype.
    /// Extra columns are allowed.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();

        for field in Self::schema().iter_fields() {
            let name = field.name().to_string();
            match actual.get(field.name()) {
                None => return Err(SchemaError::MissingColumn(name)),
                Some(dtype) if dtype != field.dtype() => {
                    return Err(SchemaError::TypeMismatch {
                        column: name,
                        expected: field.dtype().clone(),
                        actual: dtype.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("column {column} is {actual:?}, expected {expected:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_all_columns_in_order() {
        let schema = TableSchema::schema();
        let names: Vec<String> = schema.iter_fields().map(|f| f.name().to_string()).collect();
        assert_eq!(names, COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn header_match_is_order_sensitive() {
        assert!(TableSchema::header_matches(COLUMNS));
        assert!(!TableSchema::header_matches([
            "Symbol", "Date", "Open", "High", "Low", "Close", "Volume"
        ]));
        assert!(!TableSchema::header_matches(["Date", "Symbol"]));
    }

    #[test]
    fn validate_rejects_missing_column() {
        let df = DataFrame::new(vec![Column::new("Symbol".into(), vec!["AAPL"])]).unwrap();
        let err = TableSchema::validate(&df).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn(c) if c == "Date"));
    }

    #[test]
    fn validate_rejects_wrong_volume_type() {
        let df = DataFrame::new(vec![
            Column::new("Date".into(), vec![19724i32])
                .cast(&DataType::Date)
                .unwrap(),
            Column::new("Symbol".into(), vec!["AAPL"]),
            Column::new("Open".into(), vec![1.0f64]),
            Column::new("High".into(), vec![1.0f64]),
            Column::new("Low".into(), vec![1.0f64]),
            Column::new("Close".into(), vec![1.0f64]),
            Column::new("Volume".into(), vec![1.0f64]),
        ])
        .unwrap();
        let err = TableSchema::validate(&df).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { column, .. } if column == "Volume"));
    }
}
