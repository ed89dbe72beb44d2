//! Ticker catalog: the ordered symbol → company name list driving extraction.
//!
//! The catalog is a plain text file with one `SYMBOL<TAB>COMPANY NAME` entry
//! per line. Lines are split on the first tab only; everything after it is
//! the company name, verbatim.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerEntry {
    pub symbol: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog line {line_number}: expected SYMBOL<TAB>NAME, got {content:?}")]
    MalformedLine { line_number: usize, content: String },
}

/// Ordered symbol → name mapping, in file order.
///
/// A symbol that appears twice keeps the position of its first occurrence
/// and the name of its last one.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<TickerEntry>,
    symbol_index: HashMap<String, usize>,
}

impl Catalog {
    /// Load a catalog from a UTF-8 text file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse catalog text. Any line without a tab fails the whole load.
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for (i, raw) in content.lines().enumerate() {
            let line = raw.trim_end();
            let (symbol, name) = line
                .split_once('\t')
                .ok_or_else(|| CatalogError::MalformedLine {
                    line_number: i + 1,
                    content: line.to_string(),
                })?;
            catalog.insert(symbol, name);
        }

        Ok(catalog)
    }

    fn insert(&mut self, symbol: &str, name: &str) {
        match self.symbol_index.get(symbol) {
            Some(&idx) => self.entries[idx].name = name.to_string(),
            None => {
                self.symbol_index.insert(symbol.to_string(), self.entries.len());
                self.entries.push(TickerEntry {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Company name for a symbol.
    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.symbol_index
            .get(symbol)
            .map(|&idx| self.entries[idx].name.as_str())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TickerEntry> {
        self.entries.iter()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.symbol.as_str()).collect()
    }
}
