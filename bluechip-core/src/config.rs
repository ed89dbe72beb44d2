//! Pipeline configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all) gives
//! the stock behavior: Alpha Vantage, `us_blue_chips.csv`, 25 symbols, 4
//! shards under `stocks/data_raw`. The API key is deliberately not part of
//! this struct; callers pass it to the provider directly.

use crate::data::alphavantage::DEFAULT_BASE_URL;
use crate::extract::DEFAULT_SYMBOL_CAP;
use crate::finalize::{DEFAULT_OUTPUT_DIR, DEFAULT_PARTITIONS};
use crate::table::DEFAULT_TABLE_PATH;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Provider scheme + host, e.g. `https://www.alphavantage.co`.
    pub base_url: String,

    /// CSV output table.
    pub output_csv: PathBuf,

    /// Directory holding the Parquet shards in repartition mode.
    pub output_dir: PathBuf,

    /// Maximum number of symbols appended per run.
    pub symbol_cap: usize,

    /// Number of Parquet shards.
    pub partitions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_csv: PathBuf::from(DEFAULT_TABLE_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            symbol_cap: DEFAULT_SYMBOL_CAP,
            partitions: DEFAULT_PARTITIONS,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.symbol_cap == 0 {
            return Err(ConfigError::Invalid("symbol_cap must be at least 1".into()));
        }
        if self.partitions == 0 {
            return Err(ConfigError::Invalid("partitions must be at least 1".into()));
        }
        // The shard directory is deleted on every repartition run.
        if lexical(&self.output_csv).starts_with(&lexical(&self.output_dir)) {
            return Err(ConfigError::Invalid(format!(
                "output_dir {} must not contain output_csv {}",
                self.output_dir.display(),
                self.output_csv.display()
            )));
        }
        Ok(())
    }
}

/// Path components without `.` segments, so `./a` and `a` compare equal.
fn lexical(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
