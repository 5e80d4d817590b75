use std::collections::HashMap;

use candle_core::{Device, Tensor};

use crate::error::{RelexError, Result};
use crate::table::EmbeddingTable;
use crate::vectors::WordVectors;

/// Case-insensitive word embedding seeded from pretrained vectors.
#[derive(Debug)]
pub struct WordEmbedder {
    table: EmbeddingTable,
    index: HashMap<String, usize>,
}

impl WordEmbedder {
    pub fn new(vectors: &WordVectors, freeze: bool, device: &Device) -> Result<Self> {
        let (table, index) = EmbeddingTable::from_pretrained(vectors.iter(), freeze, device)?;
        Ok(Self {
            table: table.with_name("word"),
            index,
        })
    }

    /// Whether `word` (in any case) has a vector.
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(&word.to_lowercase())
    }

    /// Row of `word` in the table.
    pub fn index_of(&self, word: &str) -> Result<usize> {
        let key = word.to_lowercase();
        self.index
            .get(&key)
            .copied()
            .ok_or(RelexError::FeatureNotFound {
                table: "word",
                key,
            })
    }

    /// Embedding of `word`. Unknown words are an error; check
    /// [`contains`](Self::contains) first and substitute a fallback.
    pub fn embed(&self, word: &str) -> Result<Tensor> {
        self.table.embed(self.index_of(word)?)
    }

    pub fn dim(&self) -> usize {
        self.table.dim()
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }
}
