//! # relex
//!
//! Relation extraction over dependency paths. Re-exports the feature layer
//! ([`core`]) and the training pipeline ([`trainer`]).

pub use relex_core as core;
pub use relex_trainer as trainer;

pub use relex_core::{
    EdgeDirection, EmbeddingTable, Example, ExampleVectorizer, FeatureEmbedder, FeatureKind,
    LabelMap, PathStep, RelexError, VectorizerConfig, WordVectors,
};
pub use relex_trainer::{
    BatchTrainer, CrossValidationOrchestrator, MlpNet, RelationModel, RelationNet, RunReport,
    TrainConfig, run_training,
};
