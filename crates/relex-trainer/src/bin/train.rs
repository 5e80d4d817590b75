//! CLI entry point for relation-extraction training.

use std::path::PathBuf;

use clap::Parser;
use relex_trainer::{RunReport, TrainConfig, run_training};

#[derive(Parser)]
#[command(name = "relex-train", about = "Train the relation classifier")]
struct Cli {
    /// JSON configuration file. Missing keys take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the training data path.
    #[arg(long)]
    train_path: Option<PathBuf>,

    /// Override the checkpoint path.
    #[arg(long)]
    checkpoint_path: Option<PathBuf>,

    /// Override the number of epochs.
    #[arg(long)]
    num_epoch: Option<usize>,

    /// Override the mini-batch size.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Train on all data without cross-validation.
    #[arg(long)]
    no_val_set: bool,

    /// Use the first CUDA device when available.
    #[arg(long)]
    cuda: bool,

    /// Warm-start from a checkpoint (single-run mode only).
    #[arg(long)]
    resume_from: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };
        if let Some(path) = self.train_path {
            config.train_path = path;
        }
        if let Some(path) = self.checkpoint_path {
            config.checkpoint_path = path;
        }
        if let Some(n) = self.num_epoch {
            config.num_epoch = n;
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if self.resume_from.is_some() {
            config.resume_from = self.resume_from;
        }
        config.no_val_set |= self.no_val_set;
        config.cuda |= self.cuda;
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("relex_core=info,relex_trainer=info")
            }),
        )
        .init();

    let result = Cli::parse().into_config().and_then(|config| run_training(&config));

    match result {
        Ok(RunReport::CrossValidation(report)) => {
            println!(
                "Mean accuracy over {} folds: {:.3}",
                report.folds.len(),
                report.mean_accuracy * 100.0
            );
        }
        Ok(RunReport::Single(report)) => {
            if let Some(last) = report.epochs.last() {
                println!("Final epoch {}: loss {:.4}", last.epoch + 1, last.avg_loss);
            }
        }
        Err(e) => {
            eprintln!("Training failed: {e:#}");
            std::process::exit(1);
        }
    }
}
