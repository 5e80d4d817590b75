//! # Pretrained Word Vectors
//!
//! Reads the word2vec text format: an optional `COUNT DIM` header followed by
//! one `word v1 v2 .. vd` line per entry. Keys are lower-cased on load so
//! lookups can be case-insensitive. Entry order is preserved, which fixes the
//! index assignment of the word table.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{RelexError, Result};

/// Ordered mapping from lower-case word to its pretrained vector.
#[derive(Debug, Clone, Default)]
pub struct WordVectors {
    words: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
}

impl WordVectors {
    /// Load vectors from a word2vec text file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading word vectors from {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        let vectors = Self::from_reader(reader)
            .map_err(|e| RelexError::config(format!("{}: {}", path.display(), e)))?;
        tracing::info!(
            "Loaded {} word vectors of dimension {}",
            vectors.len(),
            vectors.dim()
        );
        Ok(vectors)
    }

    /// Parse the text format from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut out = Self::default();
        let mut seen = HashSet::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else {
                continue;
            };
            let values: Vec<&str> = parts.collect();

            // `COUNT DIM` header on the first line.
            if line_no == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                if let Ok(dim) = values[0].parse::<usize>() {
                    out.dim = dim;
                    continue;
                }
            }

            let vector = values
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    RelexError::config(format!("line {}: bad component: {}", line_no + 1, e))
                })?;
            out.insert(word, vector, &mut seen)
                .map_err(|e| RelexError::config(format!("line {}: {}", line_no + 1, e)))?;
        }

        if out.is_empty() {
            return Err(RelexError::config("no word vectors found"));
        }
        Ok(out)
    }

    /// Build from in-memory pairs, keeping iteration order.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        let mut seen = HashSet::new();
        for (word, vector) in pairs {
            out.insert(word.as_ref(), vector, &mut seen)?;
        }
        Ok(out)
    }

    fn insert(&mut self, word: &str, vector: Vec<f32>, seen: &mut HashSet<String>) -> Result<()> {
        if vector.is_empty() {
            return Err(RelexError::config(format!("word {:?} has no components", word)));
        }
        if self.dim == 0 {
            self.dim = vector.len();
        } else if vector.len() != self.dim {
            return Err(RelexError::config(format!(
                "word {:?} has dimension {}, expected {}",
                word,
                vector.len(),
                self.dim
            )));
        }

        let key = word.to_lowercase();
        if !seen.insert(key.clone()) {
            return Err(RelexError::config(format!("duplicate word {:?}", key)));
        }
        self.words.push(key);
        self.vectors.push(vector);
        Ok(())
    }

    /// Iterate `(word, vector)` in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.words
            .iter()
            .map(String::as_str)
            .zip(self.vectors.iter().map(Vec::as_slice))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_header() {
        let text = "2 3\nThe 0.1 0.2 0.3\ncat 1 2 3\n";
        let vectors = WordVectors::from_reader(text.as_bytes()).unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.dim(), 3);
        let words: Vec<&str> = vectors.iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec!["the", "cat"]);
    }

    #[test]
    fn parses_without_header() {
        let text = "dog 0.5 0.5\n\ncat 1 2\n";
        let vectors = WordVectors::from_reader(text.as_bytes()).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.dim(), 2);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let text = "dog 0.5 0.5\ncat 1\n";
        let err = WordVectors::from_reader(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn rejects_case_folded_duplicates() {
        let text = "Dog 0.5\ndog 1\n";
        assert!(WordVectors::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(WordVectors::from_reader("".as_bytes()).is_err());
    }
}
