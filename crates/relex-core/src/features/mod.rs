//! # Feature Embedders
//!
//! One embedder per discrete feature type. Each owns a private
//! [`EmbeddingTable`](crate::table::EmbeddingTable) and knows how to turn a raw
//! feature value into a table row.
//!
//! [`FeatureEmbedder`] is the closed set of variants, dispatched explicitly
//! through [`FeatureEmbedder::embed`].

pub mod edge;
pub mod position;
pub mod tags;
pub mod word;

use std::fmt;

use candle_core::{Tensor, Var};

pub use edge::{EDGE_DIRECTION_DIM, EdgeDirectionEmbedder, LEARNED_MAX_NORM};
pub use position::PositionEmbedder;
pub use tags::{DEFAULT_ROOT_LABEL, DependencyEmbedder, PartOfSpeechEmbedder};
pub use word::WordEmbedder;

use crate::error::{RelexError, Result};
use crate::example::{EdgeDirection, PathStep};
use crate::table::EmbeddingTable;

/// The five feature types, in vectorization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Word,
    PartOfSpeech,
    Dependency,
    EdgeDirection,
    Position,
}

impl FeatureKind {
    /// Concatenation order of one path step.
    pub const ORDER: [FeatureKind; 5] = [
        FeatureKind::Word,
        FeatureKind::PartOfSpeech,
        FeatureKind::Dependency,
        FeatureKind::EdgeDirection,
        FeatureKind::Position,
    ];

    /// Stable name, used for parameter keys.
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::Word => "word",
            FeatureKind::PartOfSpeech => "pos",
            FeatureKind::Dependency => "dependency",
            FeatureKind::EdgeDirection => "edge_direction",
            FeatureKind::Position => "position",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw feature value awaiting embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureValue<'a> {
    Word(&'a str),
    PartOfSpeech(&'a str),
    Dependency(&'a str),
    EdgeDirection(EdgeDirection),
    Position(i64),
}

impl<'a> FeatureValue<'a> {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Word(_) => FeatureKind::Word,
            FeatureValue::PartOfSpeech(_) => FeatureKind::PartOfSpeech,
            FeatureValue::Dependency(_) => FeatureKind::Dependency,
            FeatureValue::EdgeDirection(_) => FeatureKind::EdgeDirection,
            FeatureValue::Position(_) => FeatureKind::Position,
        }
    }

    /// The five values of a path step in [`FeatureKind::ORDER`].
    pub fn of_step(step: &'a PathStep) -> [FeatureValue<'a>; 5] {
        [
            FeatureValue::Word(&step.word),
            FeatureValue::PartOfSpeech(&step.pos),
            FeatureValue::Dependency(&step.dependency),
            FeatureValue::EdgeDirection(step.direction),
            FeatureValue::Position(step.offset),
        ]
    }
}

/// One embedder of each feature type.
#[derive(Debug)]
pub enum FeatureEmbedder {
    Word(WordEmbedder),
    PartOfSpeech(PartOfSpeechEmbedder),
    Dependency(DependencyEmbedder),
    EdgeDirection(EdgeDirectionEmbedder),
    Position(PositionEmbedder),
}

impl FeatureEmbedder {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureEmbedder::Word(_) => FeatureKind::Word,
            FeatureEmbedder::PartOfSpeech(_) => FeatureKind::PartOfSpeech,
            FeatureEmbedder::Dependency(_) => FeatureKind::Dependency,
            FeatureEmbedder::EdgeDirection(_) => FeatureKind::EdgeDirection,
            FeatureEmbedder::Position(_) => FeatureKind::Position,
        }
    }

    /// Table row of `value`, which must be of this embedder's kind.
    pub fn index_of(&self, value: FeatureValue<'_>) -> Result<usize> {
        match (self, value) {
            (FeatureEmbedder::Word(e), FeatureValue::Word(w)) => e.index_of(w),
            (FeatureEmbedder::PartOfSpeech(e), FeatureValue::PartOfSpeech(t)) => e.index_of(t),
            (FeatureEmbedder::Dependency(e), FeatureValue::Dependency(d)) => e.index_of(d),
            (FeatureEmbedder::EdgeDirection(_), FeatureValue::EdgeDirection(d)) => Ok(d.index()),
            (FeatureEmbedder::Position(e), FeatureValue::Position(x)) => e.index_of(x),
            (emb, value) => Err(RelexError::Precondition(format!(
                "{} embedder cannot embed a {} value",
                emb.kind(),
                value.kind()
            ))),
        }
    }

    /// Embed `value`, which must be of this embedder's kind.
    pub fn embed(&self, value: FeatureValue<'_>) -> Result<Tensor> {
        self.table().embed(self.index_of(value)?)
    }

    /// Embed `values` with one lookup into the table, shape `[values.len(), dim]`.
    pub fn embed_many(&self, values: &[FeatureValue<'_>]) -> Result<Tensor> {
        let indices = values
            .iter()
            .map(|&v| self.index_of(v))
            .collect::<Result<Vec<_>>>()?;
        self.table().embed_many(&indices)
    }

    /// Output width.
    pub fn dim(&self) -> usize {
        self.table().dim()
    }

    pub fn table(&self) -> &EmbeddingTable {
        match self {
            FeatureEmbedder::Word(e) => e.table(),
            FeatureEmbedder::PartOfSpeech(e) => e.table(),
            FeatureEmbedder::Dependency(e) => e.table(),
            FeatureEmbedder::EdgeDirection(e) => e.table(),
            FeatureEmbedder::Position(e) => e.table(),
        }
    }

    /// Trainable table variable, if the table is not frozen.
    pub fn var(&self) -> Option<&Var> {
        self.table().var()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_map::LabelMap;
    use candle_core::Device;

    #[test]
    fn dispatch_matches_kind() {
        let labels = LabelMap::from_symbols(["NN", "VB"]).unwrap();
        let emb = FeatureEmbedder::PartOfSpeech(
            PartOfSpeechEmbedder::new(labels, false, &Device::Cpu).unwrap(),
        );

        assert_eq!(emb.kind(), FeatureKind::PartOfSpeech);
        assert_eq!(emb.dim(), 2);
        assert!(emb.embed(FeatureValue::PartOfSpeech("NN")).is_ok());
    }

    #[test]
    fn mismatched_value_is_precondition_error() {
        let labels = LabelMap::from_symbols(["NN", "VB"]).unwrap();
        let emb = FeatureEmbedder::PartOfSpeech(
            PartOfSpeechEmbedder::new(labels, false, &Device::Cpu).unwrap(),
        );

        let err = emb.embed(FeatureValue::Position(0)).unwrap_err();
        assert!(err.to_string().contains("pos embedder cannot embed a position value"));
    }

    #[test]
    fn embed_many_matches_single_values() {
        let labels = LabelMap::from_symbols(["NN", "VB", "JJ"]).unwrap();
        let emb = FeatureEmbedder::PartOfSpeech(
            PartOfSpeechEmbedder::new(labels, false, &Device::Cpu).unwrap(),
        );

        let values = [
            FeatureValue::PartOfSpeech("JJ"),
            FeatureValue::PartOfSpeech("NN"),
            FeatureValue::PartOfSpeech("JJ"),
        ];
        let rows = emb.embed_many(&values).unwrap();
        assert_eq!(rows.dims(), &[3, 3]);
        for (i, value) in values.iter().enumerate() {
            assert_eq!(
                rows.get(i).unwrap().to_vec1::<f32>().unwrap(),
                emb.embed(*value).unwrap().to_vec1::<f32>().unwrap()
            );
        }
        assert!(emb.embed_many(&[FeatureValue::Position(1)]).is_err());
    }

    #[test]
    fn step_values_follow_order() {
        let step = PathStep::new("went", "VBD", "nsubj", EdgeDirection::Forward, -1);
        let kinds: Vec<FeatureKind> = FeatureValue::of_step(&step)
            .iter()
            .map(FeatureValue::kind)
            .collect();
        assert_eq!(kinds, FeatureKind::ORDER.to_vec());
    }
}
