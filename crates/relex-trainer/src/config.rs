//! Training configuration.
//!
//! Every key is optional in the JSON file; missing keys take the defaults
//! below. The configuration is validated once and then passed by reference,
//! never mutated during a run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use candle_core::Device;
use relex_core::{RelexError, VectorizerConfig};
use serde::{Deserialize, Serialize};

use crate::optimizer::ParamsAdadelta;

/// Which evaluation epochs overwrite the checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointPolicy {
    /// Every evaluation epoch writes; the last one wins.
    #[default]
    LastEvaluated,
    /// Write only when validation accuracy improves. Without a validation
    /// set this behaves like `LastEvaluated`.
    BestValidation,
}

/// Adadelta hyper-parameters other than the learning rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub rho: f64,
    pub eps: f64,
    pub weight_decay: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            rho: 0.9,
            eps: 1e-6,
            weight_decay: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub num_epoch: usize,
    /// Place tensors on the first CUDA device when available.
    pub cuda: bool,
    /// Train on the whole dataset instead of running k-fold cross-validation.
    pub no_val_set: bool,
    pub max_abs_offset: usize,
    pub position_dim: usize,
    pub train_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub word_vectors_path: PathBuf,
    pub pos_map_path: PathBuf,
    pub dep_map_path: PathBuf,
    pub num_classes: usize,
    pub max_path_len: usize,
    pub hidden_dim: usize,
    pub seed: u64,
    pub folds: usize,
    /// Evaluate (and checkpoint) every `eval_every` epochs, plus the last one.
    pub eval_every: usize,
    /// Fill the last batch by repeating the first shuffled examples.
    pub pad_batches: bool,
    /// Shrink the batch size to the dataset size when it is larger.
    pub clamp_batch_size: bool,
    pub checkpoint_policy: CheckpointPolicy,
    pub root_label: String,
    pub freeze_word_vectors: bool,
    pub optimizer: OptimizerConfig,
    /// Warm-start a single (non cross-validated) run from this checkpoint.
    pub resume_from: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            batch_size: 64,
            num_epoch: 30,
            cuda: false,
            no_val_set: false,
            max_abs_offset: 30,
            position_dim: 10,
            train_path: PathBuf::from("data/train.jsonl"),
            checkpoint_path: PathBuf::from("checkpoints/model.safetensors"),
            word_vectors_path: PathBuf::from("obj/word_vectors.txt"),
            pos_map_path: PathBuf::from("configs/pos_map.txt"),
            dep_map_path: PathBuf::from("configs/dep_map.txt"),
            num_classes: 19,
            max_path_len: 8,
            hidden_dim: 200,
            seed: 3,
            folds: 5,
            eval_every: 5,
            pad_batches: true,
            clamp_batch_size: true,
            checkpoint_policy: CheckpointPolicy::LastEvaluated,
            root_label: relex_core::features::DEFAULT_ROOT_LABEL.to_string(),
            freeze_word_vectors: false,
            optimizer: OptimizerConfig::default(),
            resume_from: None,
        }
    }
}

impl TrainConfig {
    /// Read a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Cannot parse config '{}'", path.display()))?;
        Ok(config)
    }

    /// Reject settings the trainer cannot run with.
    pub fn validate(&self) -> relex_core::Result<()> {
        let fail = |msg: String| Err(RelexError::Config(msg));

        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".into());
        }
        if self.num_epoch == 0 {
            return fail("num_epoch must be at least 1".into());
        }
        if self.eval_every == 0 {
            return fail("eval_every must be at least 1".into());
        }
        if self.folds < 2 {
            return fail(format!("folds must be at least 2, got {}", self.folds));
        }
        if self.max_abs_offset == 0 || self.position_dim == 0 {
            return fail("max_abs_offset and position_dim must be positive".into());
        }
        if self.max_path_len == 0 || self.hidden_dim == 0 {
            return fail("max_path_len and hidden_dim must be positive".into());
        }
        if self.num_classes < 2 {
            return fail(format!("num_classes must be at least 2, got {}", self.num_classes));
        }
        if !(0.0..1.0).contains(&self.optimizer.rho) || self.optimizer.eps <= 0.0 {
            return fail("optimizer.rho must be in [0, 1) and optimizer.eps positive".into());
        }
        if self.resume_from.is_some() && !self.no_val_set {
            return fail("resume_from is only supported together with no_val_set".into());
        }
        Ok(())
    }

    /// Shape parameters for the feature layer.
    pub fn vectorizer_config(&self) -> VectorizerConfig {
        VectorizerConfig {
            max_path_len: self.max_path_len,
            max_abs_offset: self.max_abs_offset,
            position_dim: self.position_dim,
            root_label: self.root_label.clone(),
            freeze_word_vectors: self.freeze_word_vectors,
        }
    }

    pub fn adadelta(&self) -> ParamsAdadelta {
        ParamsAdadelta {
            lr: self.learning_rate,
            rho: self.optimizer.rho,
            eps: self.optimizer.eps,
            weight_decay: self.optimizer.weight_decay,
        }
    }

    /// Device for all tensors of the run.
    pub fn device(&self) -> anyhow::Result<Device> {
        if !self.cuda {
            return Ok(Device::Cpu);
        }
        let device = Device::cuda_if_available(0)?;
        if device.is_cpu() {
            tracing::warn!("CUDA requested but not available, falling back to CPU");
        }
        Ok(device)
    }

    /// Whether accuracy is computed (and a checkpoint considered) after `epoch`.
    pub fn is_eval_epoch(&self, epoch: usize) -> bool {
        epoch % self.eval_every == 0 || epoch + 1 == self.num_epoch
    }

    /// Checkpoint location, suffixed `.fold<n>` (1-based) in cross-validation.
    pub fn checkpoint_path_for(&self, fold: Option<usize>) -> PathBuf {
        match fold {
            None => self.checkpoint_path.clone(),
            Some(fold) => {
                let mut name = OsString::from(self.checkpoint_path.as_os_str());
                name.push(format!(".fold{}", fold + 1));
                PathBuf::from(name)
            }
        }
    }
}
