//! # Tag Vocabularies
//!
//! Bidirectional mapping between symbolic tags (POS tags, dependency relation
//! names) and dense integer indices.
//!
//! The on-disk format is a plain text table with one `SYMBOL ID` pair per
//! line. Blank lines and lines starting with `#` are ignored.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{RelexError, Result};

/// Two-way mapping `symbol <-> index` with ids `0..len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    symbol_to_index: HashMap<String, usize>,
    index_to_symbol: Vec<String>,
}

impl LabelMap {
    /// Load a label map from a `SYMBOL ID` table.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let map = Self::parse(&content)
            .map_err(|e| RelexError::config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded {} labels from {}", map.len(), path.display());
        Ok(map)
    }

    /// Parse the textual table format.
    pub fn parse(content: &str) -> Result<Self> {
        let mut symbol_to_index = HashMap::new();
        let mut index_to_symbol = HashMap::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(symbol), Some(id), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(RelexError::config(format!(
                    "line {}: expected `SYMBOL ID`, got {:?}",
                    line_no + 1,
                    line
                )));
            };
            let id: usize = id.parse().map_err(|_| {
                RelexError::config(format!("line {}: invalid id {:?}", line_no + 1, id))
            })?;

            if symbol_to_index.insert(symbol.to_string(), id).is_some() {
                return Err(RelexError::config(format!(
                    "line {}: duplicate symbol {:?}",
                    line_no + 1,
                    symbol
                )));
            }
            if index_to_symbol.insert(id, symbol.to_string()).is_some() {
                return Err(RelexError::config(format!(
                    "line {}: duplicate id {}",
                    line_no + 1,
                    id
                )));
            }
        }

        Self::from_parts(symbol_to_index, index_to_symbol)
    }

    /// Build a label map assigning ids `0..n` in iteration order.
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut symbol_to_index = HashMap::new();
        let mut index_to_symbol = Vec::new();
        for symbol in symbols {
            let symbol = symbol.into();
            if symbol_to_index.contains_key(&symbol) {
                return Err(RelexError::config(format!("duplicate symbol {:?}", symbol)));
            }
            symbol_to_index.insert(symbol.clone(), index_to_symbol.len());
            index_to_symbol.push(symbol);
        }
        Ok(Self {
            symbol_to_index,
            index_to_symbol,
        })
    }

    /// Assemble a label map from its two directions.
    ///
    /// Fails when the directions differ in size (an odd two-way size), are not
    /// inverses of each other, or the ids are not exactly `0..n`.
    pub fn from_parts(
        symbol_to_index: HashMap<String, usize>,
        index_to_symbol: HashMap<usize, String>,
    ) -> Result<Self> {
        let two_way_len = symbol_to_index.len() + index_to_symbol.len();
        if two_way_len % 2 != 0 {
            return Err(RelexError::config(format!(
                "two-way label map has odd size {}",
                two_way_len
            )));
        }
        if symbol_to_index.len() != index_to_symbol.len() {
            return Err(RelexError::config(format!(
                "label map directions disagree: {} symbols, {} ids",
                symbol_to_index.len(),
                index_to_symbol.len()
            )));
        }

        let n = index_to_symbol.len();
        let mut ordered = Vec::with_capacity(n);
        for id in 0..n {
            let symbol = index_to_symbol.get(&id).ok_or_else(|| {
                RelexError::config(format!("label ids are not contiguous: missing id {}", id))
            })?;
            if symbol_to_index.get(symbol) != Some(&id) {
                return Err(RelexError::config(format!(
                    "label map directions disagree on {:?}",
                    symbol
                )));
            }
            ordered.push(symbol.clone());
        }

        Ok(Self {
            symbol_to_index,
            index_to_symbol: ordered,
        })
    }

    /// Index of `symbol`, if present.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbol_to_index.get(symbol).copied()
    }

    /// Symbol at `index`, if present.
    pub fn symbol_of(&self, index: usize) -> Option<&str> {
        self.index_to_symbol.get(index).map(String::as_str)
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.index_to_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_symbol.is_empty()
    }

    /// Total entry count across both directions.
    pub fn two_way_len(&self) -> usize {
        self.symbol_to_index.len() + self.index_to_symbol.len()
    }

    /// Iterate `(index, symbol)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.index_to_symbol
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.as_str()))
    }
}
