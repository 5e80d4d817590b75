//! Mini-batch training loop.
//!
//! Per epoch: reshuffle, pad to a whole number of batches, step the optimizer
//! on each batch's cross-entropy loss, and on evaluation epochs report
//! accuracy and write a checkpoint.

use std::path::{Path, PathBuf};

use anyhow::bail;
use candle_core::Tensor;
use candle_nn::Optimizer;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use relex_core::Example;

use crate::batch::{BatchPlan, pad_to_batch_size, resolve_batch_size};
use crate::checkpoint::{CheckpointMeta, load_checkpoint, save_checkpoint};
use crate::config::{CheckpointPolicy, TrainConfig};
use crate::model::{RelationModel, RelationNet};
use crate::optimizer::Adadelta;

/// Outcome of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub avg_loss: f64,
    pub steps: usize,
    pub train_accuracy: Option<f64>,
    pub validation_accuracy: Option<f64>,
    pub checkpointed: bool,
}

/// Outcome of a full training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// Validation accuracy at the last evaluation epoch, 0 without a
    /// validation set.
    pub final_validation_accuracy: f64,
    pub best_validation_accuracy: Option<f64>,
    pub batch_plan: BatchPlan,
    pub epochs: Vec<EpochSummary>,
    pub checkpoint_path: PathBuf,
}

pub struct BatchTrainer<'a, N: RelationNet> {
    config: &'a TrainConfig,
    model: RelationModel<N>,
    optimizer: Adadelta,
    rng: ChaCha8Rng,
    checkpoint_path: PathBuf,
    start_epoch: usize,
}

impl<'a, N: RelationNet> BatchTrainer<'a, N> {
    pub fn new(
        config: &'a TrainConfig,
        model: RelationModel<N>,
        rng: ChaCha8Rng,
        checkpoint_path: PathBuf,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let optimizer = Adadelta::new_named(model.named_vars(), config.adadelta())?;
        Ok(Self {
            config,
            model,
            optimizer,
            rng,
            checkpoint_path,
            start_epoch: 0,
        })
    }

    /// Load parameters and optimizer state from `path`; training continues
    /// with the epoch after the saved one.
    pub fn resume(&mut self, path: &Path) -> anyhow::Result<usize> {
        let checkpoint = load_checkpoint(path, self.model.device())?;
        checkpoint.restore(&self.model.named_vars(), &mut self.optimizer)?;
        self.start_epoch = checkpoint.meta.epoch + 1;
        tracing::info!(
            path = %path.display(),
            epoch = checkpoint.meta.epoch,
            loss = checkpoint.meta.loss,
            "Resumed from checkpoint"
        );
        Ok(self.start_epoch)
    }

    /// Train on `train` for the configured number of epochs, evaluating on
    /// `validation` (which may be empty).
    pub fn train(
        &mut self,
        train: &[Example],
        validation: &[Example],
    ) -> anyhow::Result<TrainReport> {
        if train.is_empty() {
            bail!("cannot train on an empty dataset");
        }
        let plan = resolve_batch_size(
            self.config.batch_size,
            train.len(),
            self.config.clamp_batch_size,
        );
        tracing::info!(
            examples = train.len(),
            validation = validation.len(),
            batch_size = plan.batch_size,
            epochs = self.config.num_epoch,
            "Starting training"
        );

        let mut epochs = Vec::with_capacity(self.config.num_epoch);
        let mut final_validation_accuracy = 0.0;
        let mut best_validation_accuracy: Option<f64> = None;

        for epoch in self.start_epoch..self.config.num_epoch {
            let (avg_loss, last_loss, steps) = self.run_epoch(epoch, train, plan.batch_size)?;
            tracing::info!("Epoch {}, loss {:.4}", epoch + 1, avg_loss);

            let mut summary = EpochSummary {
                epoch,
                avg_loss,
                steps,
                train_accuracy: None,
                validation_accuracy: None,
                checkpointed: false,
            };

            if self.config.is_eval_epoch(epoch) {
                let train_acc = self.model.accuracy(train, plan.batch_size)?;
                tracing::info!("Train acc {:.3}", train_acc * 100.0);
                summary.train_accuracy = Some(train_acc);

                let mut improved = true;
                if !validation.is_empty() {
                    let val_acc = self.model.accuracy(validation, plan.batch_size)?;
                    tracing::info!("Val acc {:.3}", val_acc * 100.0);
                    summary.validation_accuracy = Some(val_acc);
                    final_validation_accuracy = val_acc;
                    improved = best_validation_accuracy.is_none_or(|best| val_acc > best);
                    if improved {
                        best_validation_accuracy = Some(val_acc);
                    }
                }

                let write = match self.config.checkpoint_policy {
                    CheckpointPolicy::LastEvaluated => true,
                    CheckpointPolicy::BestValidation => improved,
                };
                if write {
                    let meta = CheckpointMeta {
                        epoch,
                        loss: last_loss,
                        avg_loss,
                    };
                    save_checkpoint(
                        &self.checkpoint_path,
                        meta,
                        &self.model.named_vars(),
                        &self.optimizer,
                    )?;
                    summary.checkpointed = true;
                }
            }

            epochs.push(summary);
        }

        Ok(TrainReport {
            final_validation_accuracy,
            best_validation_accuracy,
            batch_plan: plan,
            epochs,
            checkpoint_path: self.checkpoint_path.clone(),
        })
    }

    /// One pass over a reshuffled, padded copy of `train`. Returns the average
    /// loss, the last batch loss and the number of steps.
    fn run_epoch(
        &mut self,
        epoch: usize,
        train: &[Example],
        batch_size: usize,
    ) -> anyhow::Result<(f64, f64, usize)> {
        let mut data = train.to_vec();
        data.shuffle(&mut self.rng);
        if self.config.pad_batches {
            pad_to_batch_size(&mut data, batch_size);
        }

        let device = self.model.device().clone();
        let mut total_loss = 0.0;
        let mut last_loss = 0.0;
        let mut steps = 0usize;

        for (i, batch) in data.chunks(batch_size).enumerate() {
            let labels: Vec<u32> = batch.iter().map(|e| e.label_id).collect();
            let targets = Tensor::new(labels.as_slice(), &device)?;
            let logits = self.model.forward(batch)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &targets)?;

            let value = f64::from(loss.to_scalar::<f32>()?);
            if !value.is_finite() {
                bail!("loss became {value} at epoch {}, batch {}", epoch + 1, i + 1);
            }

            self.optimizer.backward_step(&loss)?;
            total_loss += value;
            last_loss = value;
            steps += 1;
        }

        let avg_loss = if steps == 0 { 0.0 } else { total_loss / steps as f64 };
        Ok((avg_loss, last_loss, steps))
    }

    pub fn model(&self) -> &RelationModel<N> {
        &self.model
    }

    pub fn optimizer(&self) -> &Adadelta {
        &self.optimizer
    }

    pub fn into_model(self) -> RelationModel<N> {
        self.model
    }
}
