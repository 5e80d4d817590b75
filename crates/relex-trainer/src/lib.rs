//! # relex Trainer
//!
//! Mini-batch training of the relation classifier with Adadelta and
//! cross-entropy loss, k-fold cross-validation, and safetensors checkpoints.

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod cross_validation;
pub mod data;
pub mod model;
pub mod optimizer;
pub mod trainer;

use relex_core::{ExampleVectorizer, LabelMap, WordVectors};

pub use batch::{BatchPlan, pad_to_batch_size, resolve_batch_size};
pub use checkpoint::{Checkpoint, CheckpointMeta, load_checkpoint, save_checkpoint};
pub use config::{CheckpointPolicy, OptimizerConfig, TrainConfig};
pub use cross_validation::{
    CrossValidationOrchestrator, CrossValidationReport, FoldSplit, RunReport, fold_split,
    fold_threshold,
};
pub use data::{DatasetStats, ExampleFilter, load_examples};
pub use model::{MlpNet, RelationModel, RelationNet};
pub use optimizer::{Adadelta, AdadeltaState, ParamsAdadelta};
pub use trainer::{BatchTrainer, EpochSummary, TrainReport};

/// Load every resource named in `config` and run training with the default
/// [`MlpNet`] classifier.
pub fn run_training(config: &TrainConfig) -> anyhow::Result<RunReport> {
    config.validate()?;
    let device = config.device()?;

    let word_vectors = WordVectors::load(&config.word_vectors_path)?;
    let pos_labels = LabelMap::load(&config.pos_map_path)?;
    let dep_labels = LabelMap::load(&config.dep_map_path)?;
    tracing::info!(
        words = word_vectors.len(),
        word_dim = word_vectors.dim(),
        pos_tags = pos_labels.len(),
        dependencies = dep_labels.len(),
        "Loaded feature resources"
    );

    let filter = ExampleFilter {
        num_classes: config.num_classes,
        max_path_len: config.max_path_len,
        root_label: config.root_label.clone(),
    };
    let data = load_examples(&config.train_path, &filter)?;

    let vectorizer_config = config.vectorizer_config();
    let build_model = |rng: &mut rand_chacha::ChaCha8Rng| -> anyhow::Result<RelationModel<MlpNet>> {
        let vectorizer = ExampleVectorizer::build(
            &vectorizer_config,
            &word_vectors,
            pos_labels.clone(),
            dep_labels.clone(),
            rng,
            &device,
        )?;
        let net = MlpNet::new(
            vectorizer.width(),
            config.hidden_dim,
            config.num_classes,
            rng,
            &device,
        )?;
        Ok(RelationModel::new(vectorizer, net))
    };

    CrossValidationOrchestrator::new(config).run(data, build_model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_resources(dir: &Path) -> TrainConfig {
        std::fs::write(
            dir.join("vectors.txt"),
            "3 2\nobama 0.5 -0.1\nborn 0.2 0.3\nhawaii -0.4 0.9\n",
        )
        .unwrap();
        std::fs::write(dir.join("pos.txt"), "NNP 0\nVBN 1\n").unwrap();
        std::fs::write(dir.join("dep.txt"), "nsubj 0\nprep 1\nROOT 2\n").unwrap();

        let born = r#"{"word": "born", "pos": "VBN", "dep": "prep", "dir": 0, "offset": 1}"#;
        let mut lines = String::new();
        for i in 0..20 {
            let (label, word) = if i % 2 == 0 { (0, "obama") } else { (1, "hawaii") };
            let off = i % 3;
            let subject = format!(
                r#"{{"word": "{word}", "pos": "NNP", "dep": "nsubj", "dir": 1, "offset": {off}}}"#
            );
            lines.push_str(&format!(r#"{{"label-id": {label}, "path": [{subject}, {born}]}}"#));
            lines.push('\n');
        }
        // Dropped by the root filter.
        let root = r#"{"word": "born", "pos": "VBN", "dep": "ROOT", "dir": 0, "offset": 0}"#;
        lines.push_str(&format!(r#"{{"label-id": 0, "path": [{root}]}}"#));
        std::fs::write(dir.join("train.jsonl"), lines).unwrap();

        TrainConfig {
            batch_size: 4,
            num_epoch: 2,
            num_classes: 2,
            max_path_len: 3,
            hidden_dim: 6,
            position_dim: 3,
            max_abs_offset: 5,
            folds: 4,
            train_path: dir.join("train.jsonl"),
            word_vectors_path: dir.join("vectors.txt"),
            pos_map_path: dir.join("pos.txt"),
            dep_map_path: dir.join("dep.txt"),
            checkpoint_path: dir.join("ckpt").join("model.safetensors"),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn trains_from_files_with_cross_validation() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_resources(dir.path());

        let RunReport::CrossValidation(report) = run_training(&cfg).unwrap() else {
            panic!("expected cross-validation");
        };
        assert_eq!(report.folds.len(), 4);
        assert!((0.0..=1.0).contains(&report.mean_accuracy));
        // 20 usable examples, 5 held out per fold
        assert!(report.folds.iter().all(|f| f.epochs[0].steps == 4));
        assert!(dir.path().join("ckpt/model.safetensors.fold4").exists());
    }

    #[test]
    fn single_run_can_resume() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            no_val_set: true,
            ..write_resources(dir.path())
        };
        let RunReport::Single(first) = run_training(&cfg).unwrap() else {
            panic!("expected a single run");
        };
        assert_eq!(first.epochs.len(), 2);

        let resumed = TrainConfig {
            num_epoch: 3,
            resume_from: Some(cfg.checkpoint_path.clone()),
            checkpoint_path: dir.path().join("resumed.safetensors"),
            ..cfg
        };
        let RunReport::Single(second) = run_training(&resumed).unwrap() else {
            panic!("expected a single run");
        };
        assert_eq!(second.epochs.len(), 1);
        assert_eq!(second.epochs[0].epoch, 2);
    }

    #[test]
    fn invalid_config_is_rejected_before_loading() {
        let cfg = TrainConfig {
            batch_size: 0,
            ..TrainConfig::default()
        };
        assert!(run_training(&cfg).is_err());
    }
}
