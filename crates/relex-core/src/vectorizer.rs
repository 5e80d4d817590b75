//! # Example Vectorizer
//!
//! Turns an [`Example`] into one flat, fixed-width feature vector.
//!
//! Layout: for each step of the dependency path, the five embeddings are
//! concatenated in [`FeatureKind::ORDER`]:
//!
//! ```text
//! [ word | pos | dependency | edge direction | position ] x max_path_len
//! ```
//!
//! Paths shorter than `max_path_len` are padded with zeros. Words missing from
//! the pretrained vocabulary contribute a zero vector.

use candle_core::{DType, Device, Tensor, Var};
use rand::Rng;

use crate::error::{RelexError, Result};
use crate::example::Example;
use crate::features::{
    DEFAULT_ROOT_LABEL, DependencyEmbedder, EdgeDirectionEmbedder, FeatureEmbedder, FeatureKind,
    FeatureValue, PartOfSpeechEmbedder, PositionEmbedder, WordEmbedder,
};
use crate::label_map::LabelMap;
use crate::vectors::WordVectors;

/// Shape parameters of the feature layer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorizerConfig {
    /// Longest dependency path an example may have.
    pub max_path_len: usize,
    /// Bound of the relative token offset.
    pub max_abs_offset: usize,
    /// Width of the position embedding.
    pub position_dim: usize,
    /// Dependency label that marks the root edge.
    pub root_label: String,
    /// Keep pretrained word vectors fixed during training.
    pub freeze_word_vectors: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_path_len: 8,
            max_abs_offset: 30,
            position_dim: 10,
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            freeze_word_vectors: false,
        }
    }
}

/// Composes the five feature embedders.
#[derive(Debug)]
pub struct ExampleVectorizer {
    embedders: Vec<FeatureEmbedder>,
    max_path_len: usize,
    step_width: usize,
    device: Device,
}

impl ExampleVectorizer {
    /// Build fresh embedders for one model instance.
    ///
    /// The learned edge-direction and position tables draw from `rng`, in
    /// that order.
    pub fn build<R: Rng + ?Sized>(
        config: &VectorizerConfig,
        word_vectors: &WordVectors,
        pos_labels: LabelMap,
        dep_labels: LabelMap,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let embedders = vec![
            FeatureEmbedder::Word(WordEmbedder::new(
                word_vectors,
                config.freeze_word_vectors,
                device,
            )?),
            FeatureEmbedder::PartOfSpeech(PartOfSpeechEmbedder::new(pos_labels, false, device)?),
            FeatureEmbedder::Dependency(
                DependencyEmbedder::new(dep_labels, false, device)?
                    .with_root_label(config.root_label.clone()),
            ),
            FeatureEmbedder::EdgeDirection(EdgeDirectionEmbedder::new(rng, device)?),
            FeatureEmbedder::Position(PositionEmbedder::new(
                config.max_abs_offset,
                config.position_dim,
                rng,
                device,
            )?),
        ];
        Self::from_embedders(embedders, config.max_path_len, device)
    }

    /// Assemble from embedders given in [`FeatureKind::ORDER`].
    pub fn from_embedders(
        embedders: Vec<FeatureEmbedder>,
        max_path_len: usize,
        device: &Device,
    ) -> Result<Self> {
        let kinds: Vec<FeatureKind> = embedders.iter().map(FeatureEmbedder::kind).collect();
        if kinds != FeatureKind::ORDER {
            return Err(RelexError::config(format!(
                "embedders must be ordered {:?}, got {:?}",
                FeatureKind::ORDER,
                kinds
            )));
        }
        if max_path_len == 0 {
            return Err(RelexError::config("max_path_len must be at least 1"));
        }

        let step_width = embedders.iter().map(FeatureEmbedder::dim).sum();

        Ok(Self {
            embedders,
            max_path_len,
            step_width,
            device: device.clone(),
        })
    }

    /// Feature vector of `example`, shape `[width]`.
    pub fn vectorize(&self, example: &Example) -> Result<Tensor> {
        Ok(self
            .vectorize_batch(std::slice::from_ref(example))?
            .squeeze(0)?)
    }

    /// Feature matrix of `examples`, shape `[examples.len(), width]`.
    ///
    /// Each table is read with one gather for the whole batch. Path steps
    /// are embedded into a `[steps, step_width]` matrix; a trailing zero row
    /// backs every padding slot.
    pub fn vectorize_batch(&self, examples: &[Example]) -> Result<Tensor> {
        if examples.is_empty() {
            return Err(RelexError::Precondition("cannot vectorize an empty batch".into()));
        }
        if let Some(long) = examples.iter().find(|e| e.path.len() > self.max_path_len) {
            return Err(RelexError::Precondition(format!(
                "dependency path of length {} exceeds max_path_len {}",
                long.path.len(),
                self.max_path_len
            )));
        }

        let steps: Vec<[FeatureValue<'_>; 5]> = examples
            .iter()
            .flat_map(|e| e.path.iter().map(FeatureValue::of_step))
            .collect();
        if steps.is_empty() {
            return Ok(Tensor::zeros(
                (examples.len(), self.width()),
                DType::F32,
                &self.device,
            )?);
        }

        let mut columns = Vec::with_capacity(self.embedders.len());
        for (k, embedder) in self.embedders.iter().enumerate() {
            let values: Vec<FeatureValue<'_>> = steps.iter().map(|step| step[k]).collect();
            columns.push(self.embed_column(embedder, &values)?);
        }
        let step_rows = Tensor::cat(&columns, 1)?;
        let zero_row = Tensor::zeros((1, self.step_width), DType::F32, &self.device)?;
        let step_rows = Tensor::cat(&[&step_rows, &zero_row], 0)?;

        let padding = steps.len() as u32;
        let mut slots = Vec::with_capacity(examples.len() * self.max_path_len);
        let mut next = 0u32;
        for example in examples {
            for position in 0..self.max_path_len {
                if position < example.path.len() {
                    slots.push(next);
                    next += 1;
                } else {
                    slots.push(padding);
                }
            }
        }
        let slots = Tensor::new(slots.as_slice(), &self.device)?;
        Ok(step_rows
            .index_select(&slots, 0)?
            .reshape((examples.len(), self.width()))?)
    }

    /// Embeddings of one feature for all steps, shape `[values.len(), dim]`.
    /// Only known words are read from the table; unknown words get a zero row.
    fn embed_column(
        &self,
        embedder: &FeatureEmbedder,
        values: &[FeatureValue<'_>],
    ) -> Result<Tensor> {
        let FeatureEmbedder::Word(words) = embedder else {
            return embedder.embed_many(values);
        };

        let mut known = Vec::with_capacity(values.len());
        let mut slots = Vec::with_capacity(values.len());
        for value in values {
            let FeatureValue::Word(word) = *value else {
                return embedder.embed_many(values);
            };
            if words.contains(word) {
                slots.push(Some(known.len() as u32));
                known.push(words.index_of(word)?);
            } else {
                slots.push(None);
            }
        }
        if known.len() == values.len() {
            return words.table().embed_many(&known);
        }

        let zero_row = Tensor::zeros((1, words.table().dim()), DType::F32, &self.device)?;
        if known.is_empty() {
            return Ok(zero_row.repeat((values.len(), 1))?);
        }
        let zero_slot = known.len() as u32;
        let slots: Vec<u32> = slots
            .into_iter()
            .map(|s| s.unwrap_or(zero_slot))
            .collect();
        let rows = Tensor::cat(&[&words.table().embed_many(&known)?, &zero_row], 0)?;
        let slots = Tensor::new(slots.as_slice(), &self.device)?;
        Ok(rows.index_select(&slots, 0)?)
    }

    /// Trainable table variables keyed `embedding.<feature>`.
    pub fn named_vars(&self) -> Vec<(String, Var)> {
        self.embedders
            .iter()
            .filter_map(|e| {
                e.var()
                    .map(|var| (format!("embedding.{}", e.kind().name()), var.clone()))
            })
            .collect()
    }

    pub fn embedders(&self) -> &[FeatureEmbedder] {
        &self.embedders
    }

    /// Width of one path step.
    pub fn step_width(&self) -> usize {
        self.step_width
    }

    /// Width of the full feature vector.
    pub fn width(&self) -> usize {
        self.step_width * self.max_path_len
    }

    pub fn max_path_len(&self) -> usize {
        self.max_path_len
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
