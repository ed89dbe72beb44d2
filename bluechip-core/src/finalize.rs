//! Finalization: year-range filter plus one of two physical layouts.
//!
//! - [`FilterRewrite`]: keep rows whose year falls in the range and rewrite
//!   the CSV table in place (the unfiltered table is gone afterwards).
//! - [`PartitionedParquet`]: same filter, then spread the rows round-robin
//!   over a fixed number of Parquet shards:
//!   `{output_dir}/part-00000.parquet` … plus a `_manifest.json` sidecar.
//!   The output directory is replaced on every run.
//!
//! Both produce the same logical row set for the same input.

use crate::config::PipelineConfig;
use crate::data::schema::{PriceRecord, SchemaError, TableSchema};
use crate::table::{OutputTable, TableError};
use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_OUTPUT_DIR: &str = "stocks/data_raw";
pub const DEFAULT_PARTITIONS: usize = 4;

const MANIFEST_FILE: &str = "_manifest.json";

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("shard {path} does not match the table schema: {source}")]
    Schema {
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error("manifest error: {0}")]
    Manifest(String),
}

/// Inclusive calendar-year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date.year())
    }
}

/// What a finalizer did.
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub finalizer: String,
    pub rows_in: usize,
    pub rows_kept: usize,
    /// Row count per shard; a single entry for the CSV rewrite.
    pub shard_rows: Vec<usize>,
    /// Rewritten table path or shard directory.
    pub location: PathBuf,
}

/// Turns the accumulated table into its final, year-filtered form.
pub trait Finalizer {
    fn name(&self) -> &str;

    fn finalize(
        &self,
        table: &OutputTable,
        range: YearRange,
    ) -> Result<FinalizeReport, FinalizeError>;
}

/// Pick the finalizer for the repartition flag.
pub fn select_finalizer(repartition: bool, config: &PipelineConfig) -> Box<dyn Finalizer> {
    if repartition {
        Box::new(PartitionedParquet::new(
            config.output_dir.clone(),
            config.partitions,
        ))
    } else {
        Box::new(FilterRewrite)
    }
}

/// Load the table and keep the rows inside `range`, in table order.
fn load_filtered(
    table: &OutputTable,
    range: YearRange,
) -> Result<(usize, Vec<PriceRecord>), FinalizeError> {
    if range.start > range.end {
        warn!(
            "start year {} is after end year {}; no rows will be kept",
            range.start, range.end
        );
    }

    let rows = table.read_all()?;
    let rows_in = rows.len();
    let kept: Vec<PriceRecord> = rows.into_iter().filter(|r| range.contains(r.date)).collect();
    debug!(
        "kept {} of {rows_in} rows within {}..={}",
        kept.len(),
        range.start,
        range.end
    );
    Ok((rows_in, kept))
}

// ── CSV rewrite ─────────────────────────────────────────────────────

/// Filter the CSV table and rewrite it in place.
pub struct FilterRewrite;

impl Finalizer for FilterRewrite {
    fn name(&self) -> &str {
        "filter_rewrite"
    }

    fn finalize(
        &self,
        table: &OutputTable,
        range: YearRange,
    ) -> Result<FinalizeReport, FinalizeError> {
        let (rows_in, kept) = load_filtered(table, range)?;
        table.overwrite(&kept)?;
        info!(
            "Filtered {} to {}..={}: {} of {rows_in} rows kept",
            table.path().display(),
            range.start,
            range.end,
            kept.len()
        );

        Ok(FinalizeReport {
            finalizer: self.name().to_string(),
            rows_in,
            rows_kept: kept.len(),
            shard_rows: vec![kept.len()],
            location: table.path().to_path_buf(),
        })
    }
}

// ── Parquet shards ──────────────────────────────────────────────────

/// Sidecar describing a shard directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardManifest {
    pub range: YearRange,
    pub shards: Vec<ShardEntry>,
    pub total_rows: usize,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardEntry {
    pub file: String,
    pub rows: usize,
}

/// Filter the table and write it as round-robin Parquet shards.
pub struct PartitionedParquet {
    output_dir: PathBuf,
    partitions: usize,
}

impl PartitionedParquet {
    /// `partitions` below 1 is treated as 1.
    pub fn new(output_dir: impl Into<PathBuf>, partitions: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            partitions: partitions.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn shard_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("part-{index:05}.parquet"))
    }

    /// Remove any previous output and recreate the directory.
    fn reset_output_dir(&self) -> Result<(), FinalizeError> {
        let io_err = |source| FinalizeError::Io {
            path: self.output_dir.display().to_string(),
            source,
        };
        if self.output_dir.exists() {
            fs::remove_dir_all(&self.output_dir).map_err(io_err)?;
        }
        fs::create_dir_all(&self.output_dir).map_err(io_err)
    }

    fn write_manifest(&self, manifest: &ShardManifest) -> Result<(), FinalizeError> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| FinalizeError::Manifest(format!("serialize: {e}")))?;
        let path = self.output_dir.join(MANIFEST_FILE);
        fs::write(&path, json).map_err(|source| FinalizeError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Finalizer for PartitionedParquet {
    fn name(&self) -> &str {
        "partitioned_parquet"
    }

    fn finalize(
        &self,
        table: &OutputTable,
        range: YearRange,
    ) -> Result<FinalizeReport, FinalizeError> {
        let (rows_in, kept) = load_filtered(table, range)?;

        // Round-robin: row i lands in shard i % n.
        let mut shards: Vec<Vec<&PriceRecord>> = vec![Vec::new(); self.partitions];
        for (i, record) in kept.iter().enumerate() {
            shards[i % self.partitions].push(record);
        }

        self.reset_output_dir()?;

        let mut entries = Vec::with_capacity(self.partitions);
        for (index, shard) in shards.iter().enumerate() {
            let df = records_to_dataframe(shard)?;
            let path = self.shard_path(index);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|source| {
                let _ = fs::remove_file(&tmp_path);
                FinalizeError::Io {
                    path: path.display().to_string(),
                    source,
                }
            })?;

            debug!("wrote {} rows to {}", shard.len(), path.display());
            entries.push(ShardEntry {
                file: format!("part-{index:05}.parquet"),
                rows: shard.len(),
            });
        }

        let manifest = ShardManifest {
            range,
            shards: entries,
            total_rows: kept.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(&kept)
                    .map_err(|e| FinalizeError::Manifest(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        self.write_manifest(&manifest)?;

        info!(
            "Data repartitioned into {} parquet files. Located at {}",
            self.partitions,
            self.output_dir.display()
        );

        Ok(FinalizeReport {
            finalizer: self.name().to_string(),
            rows_in,
            rows_kept: kept.len(),
            shard_rows: manifest.shards.iter().map(|s| s.rows).collect(),
            location: self.output_dir.clone(),
        })
    }
}

/// Read the manifest sidecar of a shard directory.
pub fn load_manifest(dir: &Path) -> Result<ShardManifest, FinalizeError> {
    let path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path).map_err(|source| FinalizeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| FinalizeError::Manifest(format!("parse: {e}")))
}

/// Load every shard in `dir`, in file-name order.
///
/// Non-Parquet files (the manifest, leftovers) are skipped. Each shard is
/// checked against [`TableSchema`].
pub fn load_shards(dir: &Path) -> Result<Vec<PriceRecord>, FinalizeError> {
    let io_err = |source| FinalizeError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::new();
    for path in &paths {
        let df = read_parquet(path)?;
        TableSchema::validate(&df).map_err(|source| FinalizeError::Schema {
            path: path.display().to_string(),
            source,
        })?;
        records.extend(dataframe_to_records(&df)?);
    }
    Ok(records)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Convert records to a Polars DataFrame with the shard schema.
fn records_to_dataframe(records: &[&PriceRecord]) -> Result<DataFrame, FinalizeError> {
    let epoch = NaiveDate::default();
    let dates: Vec<i32> = records
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let opens: Vec<f64> = records.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = records.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = records.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let volumes: Vec<i64> = records.iter().map(|r| r.volume).collect();

    DataFrame::new(vec![
        Column::new("Date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| FinalizeError::Parquet(format!("date cast: {e}")))?,
        Column::new("Symbol".into(), symbols),
        Column::new("Open".into(), opens),
        Column::new("High".into(), highs),
        Column::new("Low".into(), lows),
        Column::new("Close".into(), closes),
        Column::new("Volume".into(), volumes),
    ])
    .map_err(|e| FinalizeError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), FinalizeError> {
    let file = fs::File::create(path)
        .map_err(|e| FinalizeError::Parquet(format!("create {}: {e}", path.display())))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| FinalizeError::Parquet(format!("write {}: {e}", path.display())))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, FinalizeError> {
    let file = fs::File::open(path)
        .map_err(|e| FinalizeError::Parquet(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| FinalizeError::Parquet(format!("read {}: {e}", path.display())))
}

/// Convert a validated shard DataFrame back to records.
fn dataframe_to_records(df: &DataFrame) -> Result<Vec<PriceRecord>, FinalizeError> {
    let col_err = |e: PolarsError| FinalizeError::Parquet(format!("column read: {e}"));

    let date_ca = df.column("Date").map_err(col_err)?.date().map_err(col_err)?;
    let symbol_ca = df.column("Symbol").map_err(col_err)?.str().map_err(col_err)?;
    let open_ca = df.column("Open").map_err(col_err)?.f64().map_err(col_err)?;
    let high_ca = df.column("High").map_err(col_err)?.f64().map_err(col_err)?;
    let low_ca = df.column("Low").map_err(col_err)?.f64().map_err(col_err)?;
    let close_ca = df.column("Close").map_err(col_err)?.f64().map_err(col_err)?;
    let volume_ca = df.column("Volume").map_err(col_err)?.i64().map_err(col_err)?;

    let epoch = NaiveDate::default();
    let null_at = |column: &str, row: usize| {
        FinalizeError::Parquet(format!("null {column} at row {row}"))
    };

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca.get(i).ok_or_else(|| null_at("Date", i))?;
        records.push(PriceRecord {
            date: epoch + chrono::Duration::days(days as i64),
            symbol: symbol_ca
                .get(i)
                .ok_or_else(|| null_at("Symbol", i))?
                .to_string(),
            open: open_ca.get(i).ok_or_else(|| null_at("Open", i))?,
            high: high_ca.get(i).ok_or_else(|| null_at("High", i))?,
            low: low_ca.get(i).ok_or_else(|| null_at("Low", i))?,
            close: close_ca.get(i).ok_or_else(|| null_at("Close", i))?,
            volume: volume_ca.get(i).ok_or_else(|| null_at("Volume", i))?,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, year: i32, close: f64) -> PriceRecord {
        PriceRecord {
            date: NaiveDate::from_ymd_opt(year, 6, 14).unwrap(),
            symbol: symbol.to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 500,
        }
    }

    fn table_with(dir: &Path, rows: &[PriceRecord]) -> OutputTable {
        let table = OutputTable::create(dir.join("t.csv")).unwrap();
        table.append(rows).unwrap();
        table
    }

    #[test]
    fn year_range_is_inclusive() {
        let range = YearRange::new(2010, 2015);
        assert!(range.contains(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2015, 12, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2009, 12, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2016, 1, 1).unwrap()));
    }

    #[test]
    fn inverted_range_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let table = table_with(dir.path(), &[record("A", 2012, 1.0)]);
        let report = FilterRewrite
            .finalize(&table, YearRange::new(2015, 2010))
            .unwrap();
        assert_eq!(report.rows_kept, 0);
        assert!(table.read_all().unwrap().is_empty());
    }

    #[test]
    fn select_finalizer_follows_flag() {
        let config = PipelineConfig::default();
        assert_eq!(select_finalizer(true, &config).name(), "partitioned_parquet");
        assert_eq!(select_finalizer(false, &config).name(), "filter_rewrite");
    }

    #[test]
    fn dataframe_roundtrip_keeps_values() {
        let rows = [record("AAPL", 2012, 10.5), record("MSFT", 2013, 20.25)];
        let refs: Vec<&PriceRecord> = rows.iter().collect();
        let df = records_to_dataframe(&refs).unwrap();
        TableSchema::validate(&df).unwrap();
        assert_eq!(dataframe_to_records(&df).unwrap(), rows.to_vec());
    }

    #[test]
    fn shards_round_robin_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<PriceRecord> = (0..10).map(|i| record("A", 2012, i as f64)).collect();
        let table = table_with(dir.path(), &rows);

        let out = dir.path().join("shards");
        let report = PartitionedParquet::new(&out, 4)
            .finalize(&table, YearRange::new(2000, 2024))
            .unwrap();

        assert_eq!(report.shard_rows, vec![3, 3, 2, 2]);
        assert_eq!(report.rows_kept, 10);
        for i in 0..4 {
            assert!(out.join(format!("part-{i:05}.parquet")).exists());
        }

        let manifest = load_manifest(&out).unwrap();
        assert_eq!(manifest.total_rows, 10);
        assert_eq!(manifest.shards.len(), 4);
        assert_eq!(manifest.range, YearRange::new(2000, 2024));

        // the CSV is left as it was
        assert_eq!(table.read_all().unwrap().len(), 10);
    }

    #[test]
    fn empty_shards_are_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let table = table_with(dir.path(), &[record("A", 2012, 1.0)]);

        let out = dir.path().join("shards");
        let report = PartitionedParquet::new(&out, 4)
            .finalize(&table, YearRange::new(2000, 2024))
            .unwrap();

        assert_eq!(report.shard_rows, vec![1, 0, 0, 0]);
        assert_eq!(load_shards(&out).unwrap().len(), 1);
    }

    #[test]
    fn rerun_replaces_previous_shards() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shards");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("part-00009.parquet"), b"stale").unwrap();

        let table = table_with(dir.path(), &[record("A", 2012, 1.0)]);
        PartitionedParquet::new(&out, 2)
            .finalize(&table, YearRange::new(2000, 2024))
            .unwrap();

        assert!(!out.join("part-00009.parquet").exists());
        assert_eq!(load_shards(&out).unwrap().len(), 1);
    }

    #[test]
    fn foreign_shard_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut df = DataFrame::new(vec![Column::new("Symbol".into(), vec!["AAPL"])]).unwrap();
        ParquetWriter::new(fs::File::create(dir.path().join("part-00000.parquet")).unwrap())
            .finish(&mut df)
            .unwrap();

        match load_shards(dir.path()).unwrap_err() {
            FinalizeError::Schema { path, source } => {
                assert!(path.ends_with("part-00000.parquet"));
                assert!(matches!(source, SchemaError::MissingColumn(c) if c == "Date"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
