//! Embeddings for symbolic tags resolved through a [`LabelMap`].

use candle_core::{Device, Tensor};

use crate::error::{RelexError, Result};
use crate::label_map::LabelMap;
use crate::table::EmbeddingTable;

/// Dependency label of the edge into the syntactic root.
pub const DEFAULT_ROOT_LABEL: &str = "ROOT";

/// Part-of-speech embedding, initialised one-hot.
#[derive(Debug)]
pub struct PartOfSpeechEmbedder {
    labels: LabelMap,
    table: EmbeddingTable,
}

impl PartOfSpeechEmbedder {
    pub fn new(labels: LabelMap, freeze: bool, device: &Device) -> Result<Self> {
        let table = EmbeddingTable::from_label_map(&labels, freeze, device)?.with_name("pos");
        Ok(Self { labels, table })
    }

    pub fn index_of(&self, tag: &str) -> Result<usize> {
        self.labels
            .index_of(tag)
            .ok_or_else(|| RelexError::FeatureNotFound {
                table: "pos",
                key: tag.to_string(),
            })
    }

    pub fn embed(&self, tag: &str) -> Result<Tensor> {
        self.table.embed(self.index_of(tag)?)
    }

    pub fn dim(&self) -> usize {
        self.table.dim()
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }
}

/// Dependency-relation embedding, initialised one-hot.
///
/// Edges into the root never get a dependency embedding; they must be
/// filtered out before vectorization.
#[derive(Debug)]
pub struct DependencyEmbedder {
    labels: LabelMap,
    table: EmbeddingTable,
    root_label: String,
}

impl DependencyEmbedder {
    pub fn new(labels: LabelMap, freeze: bool, device: &Device) -> Result<Self> {
        let table =
            EmbeddingTable::from_label_map(&labels, freeze, device)?.with_name("dependency");
        Ok(Self {
            labels,
            table,
            root_label: DEFAULT_ROOT_LABEL.to_string(),
        })
    }

    /// Override the root marker.
    pub fn with_root_label(mut self, root_label: impl Into<String>) -> Self {
        self.root_label = root_label.into();
        self
    }

    pub fn root_label(&self) -> &str {
        &self.root_label
    }

    pub fn index_of(&self, label: &str) -> Result<usize> {
        if label == self.root_label {
            return Err(RelexError::Precondition(format!(
                "dependency label {:?} marks the root and has no embedding",
                label
            )));
        }
        self.labels
            .index_of(label)
            .ok_or_else(|| RelexError::FeatureNotFound {
                table: "dependency",
                key: label.to_string(),
            })
    }

    pub fn embed(&self, label: &str) -> Result<Tensor> {
        self.table.embed(self.index_of(label)?)
    }

    pub fn dim(&self) -> usize {
        self.table.dim()
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_embedding_is_one_hot() {
        let labels = LabelMap::from_symbols(["NN", "VB", "JJ"]).unwrap();
        let emb = PartOfSpeechEmbedder::new(labels, false, &Device::Cpu).unwrap();

        assert_eq!(emb.dim(), 3);
        let v = emb.embed("VB").unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(v, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn unknown_pos_is_feature_not_found() {
        let labels = LabelMap::from_symbols(["NN"]).unwrap();
        let emb = PartOfSpeechEmbedder::new(labels, false, &Device::Cpu).unwrap();
        assert!(matches!(
            emb.embed("XX").unwrap_err(),
            RelexError::FeatureNotFound { table: "pos", .. }
        ));
    }

    #[test]
    fn root_marker_is_rejected() {
        // Even when the vocabulary lists it, the root marker is not embeddable.
        let labels = LabelMap::from_symbols(["nsubj", "ROOT"]).unwrap();
        let emb = DependencyEmbedder::new(labels, false, &Device::Cpu).unwrap();

        assert!(matches!(
            emb.embed("ROOT").unwrap_err(),
            RelexError::Precondition(_)
        ));
        assert!(emb.embed("nsubj").is_ok());
    }

    #[test]
    fn custom_root_marker() {
        let labels = LabelMap::from_symbols(["nsubj", "root"]).unwrap();
        let emb = DependencyEmbedder::new(labels, false, &Device::Cpu)
            .unwrap()
            .with_root_label("root");

        assert!(matches!(
            emb.embed("root").unwrap_err(),
            RelexError::Precondition(_)
        ));
    }
}
