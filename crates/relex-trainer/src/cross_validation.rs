//! k-fold cross-validation and the single-run mode.
//!
//! The dataset is shuffled once with the configured seed. Fold `i` validates
//! on `data[i*t .. (i+1)*t]` with `t = len / folds` and trains on the rest.
//! Each fold gets a freshly built model and its own checkpoint file.

use anyhow::bail;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use relex_core::Example;

use crate::config::TrainConfig;
use crate::model::{RelationModel, RelationNet};
use crate::trainer::{BatchTrainer, TrainReport};

/// Train and validation halves of one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldSplit<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
}

/// Size of each validation slice.
pub fn fold_threshold(len: usize, folds: usize) -> usize {
    if folds == 0 { 0 } else { len / folds }
}

/// Split `data` for `fold`: the slice `[fold*thresh, (fold+1)*thresh)` is held
/// out, clipped to the data length.
pub fn fold_split<T: Clone>(data: &[T], fold: usize, thresh: usize) -> FoldSplit<T> {
    let start = (fold * thresh).min(data.len());
    let end = ((fold + 1) * thresh).min(data.len());
    let mut train = Vec::with_capacity(data.len() - (end - start));
    train.extend_from_slice(&data[..start]);
    train.extend_from_slice(&data[end..]);
    FoldSplit {
        train,
        validation: data[start..end].to_vec(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationReport {
    pub folds: Vec<TrainReport>,
    pub mean_accuracy: f64,
}

impl CrossValidationReport {
    pub fn fold_accuracies(&self) -> Vec<f64> {
        self.folds.iter().map(|f| f.final_validation_accuracy).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    CrossValidation(CrossValidationReport),
    Single(TrainReport),
}

/// Drives either k-fold cross-validation or one run over all the data,
/// depending on `no_val_set`.
pub struct CrossValidationOrchestrator<'a> {
    config: &'a TrainConfig,
}

impl<'a> CrossValidationOrchestrator<'a> {
    pub fn new(config: &'a TrainConfig) -> Self {
        Self { config }
    }

    /// Run with `build_model` producing a fresh model per fold. The factory
    /// draws its random initialisation from the given generator.
    pub fn run<N, F>(&self, data: Vec<Example>, build_model: F) -> anyhow::Result<RunReport>
    where
        N: RelationNet,
        F: FnMut(&mut ChaCha8Rng) -> anyhow::Result<RelationModel<N>>,
    {
        if self.config.no_val_set {
            self.run_single(data, build_model).map(RunReport::Single)
        } else {
            self.run_cross_validation(data, build_model)
                .map(RunReport::CrossValidation)
        }
    }

    pub fn run_cross_validation<N, F>(
        &self,
        mut data: Vec<Example>,
        mut build_model: F,
    ) -> anyhow::Result<CrossValidationReport>
    where
        N: RelationNet,
        F: FnMut(&mut ChaCha8Rng) -> anyhow::Result<RelationModel<N>>,
    {
        let folds = self.config.folds;
        let thresh = fold_threshold(data.len(), folds);
        if thresh == 0 {
            bail!(
                "{} examples are too few for {} folds",
                data.len(),
                folds
            );
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        data.shuffle(&mut rng);

        let mut reports = Vec::with_capacity(folds);
        for fold in 0..folds {
            let split = fold_split(&data, fold, thresh);
            tracing::info!(
                fold = fold + 1,
                folds,
                train = split.train.len(),
                validation = split.validation.len(),
                "Starting fold"
            );

            let model = build_model(&mut rng)?;
            let trainer_rng = ChaCha8Rng::seed_from_u64(rng.r#gen());
            let mut trainer = BatchTrainer::new(
                self.config,
                model,
                trainer_rng,
                self.config.checkpoint_path_for(Some(fold)),
            )?;
            let report = trainer.train(&split.train, &split.validation)?;
            tracing::info!(
                fold = fold + 1,
                "Fold accuracy {:.3}",
                report.final_validation_accuracy * 100.0
            );
            reports.push(report);
        }

        let mean_accuracy =
            reports.iter().map(|r| r.final_validation_accuracy).sum::<f64>() / folds as f64;
        tracing::info!("Mean accuracy over {} folds {:.3}", folds, mean_accuracy * 100.0);

        Ok(CrossValidationReport {
            folds: reports,
            mean_accuracy,
        })
    }

    /// Train once on all of `data` with no validation set. Warm-starts from
    /// `resume_from` when set.
    pub fn run_single<N, F>(
        &self,
        data: Vec<Example>,
        mut build_model: F,
    ) -> anyhow::Result<TrainReport>
    where
        N: RelationNet,
        F: FnMut(&mut ChaCha8Rng) -> anyhow::Result<RelationModel<N>>,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let model = build_model(&mut rng)?;
        let trainer_rng = ChaCha8Rng::seed_from_u64(rng.r#gen());
        let mut trainer = BatchTrainer::new(
            self.config,
            model,
            trainer_rng,
            self.config.checkpoint_path_for(None),
        )?;
        if let Some(path) = &self.config.resume_from {
            trainer.resume(path)?;
        }
        trainer.train(&data, &[])
    }
}
