//! # Embedding Tables
//!
//! A learned lookup table from integer index to a fixed-width vector,
//! backed by a candle [`Var`] so gradients flow into it during training.
//!
//! Tables are built in one of three ways:
//! - from pretrained vectors (`from_pretrained`), indexed in input order
//! - as one-hot rows over a [`LabelMap`] (`from_label_map`)
//! - with standard-normal weights drawn from a seeded RNG (`random`)

use std::collections::HashMap;

use candle_core::{Device, Tensor, Var};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{RelexError, Result};
use crate::label_map::LabelMap;

/// Epsilon added to the row norm before rescaling, as torch does.
const MAX_NORM_EPS: f64 = 1e-7;

#[derive(Debug)]
enum Weights {
    Trainable(Var),
    Frozen(Tensor),
}

impl Weights {
    fn tensor(&self) -> &Tensor {
        match self {
            Weights::Trainable(var) => var.as_tensor(),
            Weights::Frozen(tensor) => tensor,
        }
    }
}

/// Lookup table of shape `[rows, dim]`.
#[derive(Debug)]
pub struct EmbeddingTable {
    name: &'static str,
    weights: Weights,
    rows: usize,
    dim: usize,
    max_norm: Option<f64>,
}

impl EmbeddingTable {
    /// Wrap an existing `[rows, dim]` matrix.
    pub fn from_tensor(weights: Tensor, freeze: bool) -> Result<Self> {
        let (rows, dim) = weights.dims2()?;
        let weights = if freeze {
            Weights::Frozen(weights)
        } else {
            Weights::Trainable(Var::from_tensor(&weights)?)
        };
        Ok(Self {
            name: "embedding",
            weights,
            rows,
            dim,
            max_norm: None,
        })
    }

    /// Build a table from pretrained vectors.
    ///
    /// Keys receive indices `0..n` in iteration order. Returns the table and
    /// the key-to-index assignment.
    pub fn from_pretrained<I, K, V>(
        entries: I,
        freeze: bool,
        device: &Device,
    ) -> Result<(Self, HashMap<String, usize>)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<[f32]>,
    {
        let mut key_to_index = HashMap::new();
        let mut flat = Vec::new();
        let mut dim = None;

        for (index, (key, vector)) in entries.into_iter().enumerate() {
            let key = key.into();
            let vector = vector.as_ref();
            match dim {
                None => dim = Some(vector.len()),
                Some(d) if d != vector.len() => {
                    return Err(RelexError::config(format!(
                        "pretrained vector for {:?} has dimension {}, expected {}",
                        key,
                        vector.len(),
                        d
                    )));
                }
                Some(_) => {}
            }
            if key_to_index.insert(key.clone(), index).is_some() {
                return Err(RelexError::config(format!(
                    "duplicate pretrained key {:?}",
                    key
                )));
            }
            flat.extend_from_slice(vector);
        }

        let dim = match dim {
            Some(d) if d > 0 => d,
            _ => return Err(RelexError::config("no pretrained vectors to build a table from")),
        };
        let rows = key_to_index.len();
        let weights = Tensor::from_vec(flat, (rows, dim), device)?;
        Ok((Self::from_tensor(weights, freeze)?, key_to_index))
    }

    /// Build a table of one-hot rows, one per label index.
    ///
    /// Row `i` has a single `1.0` at column `i`; the width is half the label
    /// map's two-way size.
    pub fn from_label_map(label_map: &LabelMap, freeze: bool, device: &Device) -> Result<Self> {
        let two_way = label_map.two_way_len();
        if two_way % 2 != 0 {
            return Err(RelexError::config(format!(
                "cannot build one-hot table from two-way map of odd size {}",
                two_way
            )));
        }
        let width = two_way / 2;
        if width == 0 {
            return Err(RelexError::config("cannot build one-hot table from empty label map"));
        }

        let mut flat = vec![0f32; width * width];
        for (index, _) in label_map.iter() {
            flat[index * width + index] = 1.0;
        }
        let weights = Tensor::from_vec(flat, (width, width), device)?;
        Self::from_tensor(weights, freeze)
    }

    /// Build a trainable table with standard-normal weights.
    pub fn random<R: Rng + ?Sized>(
        rows: usize,
        dim: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        if rows == 0 || dim == 0 {
            return Err(RelexError::config(format!(
                "embedding table shape [{}, {}] is empty",
                rows, dim
            )));
        }
        let flat: Vec<f32> = (0..rows * dim).map(|_| rng.sample(StandardNormal)).collect();
        let weights = Tensor::from_vec(flat, (rows, dim), device)?;
        Self::from_tensor(weights, false)
    }

    /// Name used in lookup errors.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Bound the L2 norm of every row returned by [`embed`](Self::embed).
    pub fn with_max_norm(mut self, max_norm: f64) -> Self {
        self.max_norm = Some(max_norm);
        self
    }

    /// Look up row `index`, shape `[dim]`.
    pub fn embed(&self, index: usize) -> Result<Tensor> {
        Ok(self.embed_many(&[index])?.squeeze(0)?)
    }

    /// Look up rows `indices` with a single gather, shape `[indices.len(), dim]`.
    ///
    /// With a max-norm set, trainable rows among `indices` whose norm exceeds
    /// the bound are rescaled in place before they are read. Frozen tables
    /// only scale the returned rows.
    pub fn embed_many(&self, indices: &[usize]) -> Result<Tensor> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.rows) {
            return Err(RelexError::FeatureNotFound {
                table: self.name,
                key: index.to_string(),
            });
        }
        let weights = self.weights.tensor();
        let ids: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
        let ids = Tensor::new(ids.as_slice(), weights.device())?;

        let Some(max_norm) = self.max_norm else {
            return Ok(weights.index_select(&ids, 0)?);
        };

        match &self.weights {
            Weights::Trainable(var) => {
                let selected = var.as_tensor().index_select(&ids, 0)?;
                let scales = row_scales(&selected, max_norm)?;
                if scales.iter().any(|&s| s < 1.0) {
                    let mut table_scales = vec![1f32; self.rows];
                    for (&index, &scale) in indices.iter().zip(&scales) {
                        table_scales[index] = scale;
                    }
                    let table_scales =
                        Tensor::from_vec(table_scales, (self.rows, 1), weights.device())?;
                    var.set(&var.as_tensor().broadcast_mul(&table_scales)?)?;
                }
                Ok(var.as_tensor().index_select(&ids, 0)?)
            }
            Weights::Frozen(tensor) => {
                let selected = tensor.index_select(&ids, 0)?;
                let scales = row_scales(&selected, max_norm)?;
                if scales.iter().all(|&s| s == 1.0) {
                    return Ok(selected);
                }
                let scales = Tensor::from_vec(scales, (indices.len(), 1), tensor.device())?;
                Ok(selected.broadcast_mul(&scales)?)
            }
        }
    }

    /// The trainable variable, `None` when frozen.
    pub fn var(&self) -> Option<&Var> {
        match &self.weights {
            Weights::Trainable(var) => Some(var),
            Weights::Frozen(_) => None,
        }
    }

    /// Current weight matrix.
    pub fn weights(&self) -> &Tensor {
        self.weights.tensor()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.weights, Weights::Frozen(_))
    }

    pub fn max_norm(&self) -> Option<f64> {
        self.max_norm
    }
}

/// Per-row factor bringing each row of `rows` down to `max_norm`; 1 where it
/// already fits.
fn row_scales(rows: &Tensor, max_norm: f64) -> Result<Vec<f32>> {
    let norms = rows.sqr()?.sum(1)?.sqrt()?.to_vec1::<f32>()?;
    Ok(norms
        .into_iter()
        .map(|norm| {
            let norm = f64::from(norm);
            if norm > max_norm {
                (max_norm / (norm + MAX_NORM_EPS)) as f32
            } else {
                1.0
            }
        })
        .collect())
}
