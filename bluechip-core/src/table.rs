//! Output table: the flat CSV file holding every extracted row.
//!
//! Layout: header `Date,Symbol,Open,High,Low,Close,Volume`, then one row per
//! (symbol, date). During extraction the file only grows: it is created with
//! the header alone and each symbol's batch is appended without a header.
//! Rewrites go through a `.tmp` file renamed into place.

use crate::data::schema::{PriceRecord, TableSchema, COLUMNS};
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TABLE_PATH: &str = "us_blue_chips.csv";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("table {path} has header {found:?}, expected {expected:?}")]
    SchemaMismatch {
        path: String,
        found: Vec<String>,
        expected: [&'static str; 7],
    },
}

/// Handle to the CSV output table.
#[derive(Debug, Clone)]
pub struct OutputTable {
    path: PathBuf,
}

impl OutputTable {
    /// Create (or truncate) the table with the header row only.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, TableError> {
        let table = Self { path: path.into() };

        if let Some(parent) = table.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| table.io_err(e))?;
        }

        table.write_file(&table.path, &[])?;
        debug!("created table {}", table.path.display());
        Ok(table)
    }

    /// Handle to an existing table. Nothing is read until `read_all`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows without a header. Returns the number of rows written.
    pub fn append(&self, records: &[PriceRecord]) -> Result<usize, TableError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for record in records {
            wtr.serialize(record).map_err(|e| self.csv_err(e))?;
        }
        wtr.flush().map_err(|e| self.io_err(e))?;

        debug!("appended {} rows to {}", records.len(), self.path.display());
        Ok(records.len())
    }

    /// Read every row, checking the header against the fixed column order.
    pub fn read_all(&self) -> Result<Vec<PriceRecord>, TableError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| self.csv_err(e))?;

        let headers = rdr.headers().map_err(|e| self.csv_err(e))?.clone();
        if !TableSchema::header_matches(headers.iter()) {
            return Err(TableError::SchemaMismatch {
                path: self.path.display().to_string(),
                found: headers.iter().map(String::from).collect(),
                expected: COLUMNS,
            });
        }

        rdr.deserialize()
            .collect::<Result<Vec<PriceRecord>, _>>()
            .map_err(|e| self.csv_err(e))
    }

    /// Replace the whole table (header + rows) atomically.
    pub fn overwrite(&self, records: &[PriceRecord]) -> Result<(), TableError> {
        let tmp_path = self.path.with_extension("csv.tmp");
        self.write_file(&tmp_path, records)?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            self.io_err(e)
        })?;

        debug!("rewrote {} with {} rows", self.path.display(), records.len());
        Ok(())
    }

    fn write_file(&self, path: &Path, records: &[PriceRecord]) -> Result<(), TableError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| self.csv_err(e))?;

        wtr.write_record(COLUMNS).map_err(|e| self.csv_err(e))?;
        for record in records {
            wtr.serialize(record).map_err(|e| self.csv_err(e))?;
        }

        let mut file = wtr
            .into_inner()
            .map_err(|e| self.io_err(e.into_error()))?;
        file.flush().map_err(|e| self.io_err(e))?;
        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> TableError {
        TableError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> TableError {
        TableError::Csv {
            path: self.path.display().to_string(),
            source,
        }
    }
}
