//! # relex Core
//!
//! The feature-embedding layer of the relex relation extractor. Converts the
//! five discrete features of a dependency path (word, part-of-speech tag,
//! dependency label, edge direction, relative position) into one fixed-width
//! vector per example.
//!
//! ## Quick Start
//!
//! ```rust
//! use candle_core::Device;
//! use rand::SeedableRng;
//! use relex_core::{EdgeDirection, Example, ExampleVectorizer, LabelMap, PathStep,
//!     VectorizerConfig, WordVectors};
//!
//! let vectors = WordVectors::from_pairs([("founded", vec![0.1f32, 0.2])]).unwrap();
//! let pos = LabelMap::from_symbols(["NNP", "VBD"]).unwrap();
//! let dep = LabelMap::from_symbols(["nsubj", "dobj"]).unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(3);
//!
//! let vectorizer = ExampleVectorizer::build(
//!     &VectorizerConfig::default(), &vectors, pos, dep, &mut rng, &Device::Cpu,
//! ).unwrap();
//!
//! let example = Example::new(1, vec![
//!     PathStep::new("founded", "VBD", "dobj", EdgeDirection::Forward, 1),
//! ]);
//! let features = vectorizer.vectorize(&example).unwrap();
//! assert_eq!(features.dims(), &[vectorizer.width()]);
//! ```
pub mod error;
pub mod example;
pub mod features;
pub mod label_map;
pub mod table;
pub mod vectorizer;
pub mod vectors;

// Re-export primary API
pub use error::{RelexError, Result};
pub use example::{EdgeDirection, Example, PathStep};
pub use features::{
    DependencyEmbedder, EdgeDirectionEmbedder, FeatureEmbedder, FeatureKind, FeatureValue,
    PartOfSpeechEmbedder, PositionEmbedder, WordEmbedder,
};
pub use label_map::LabelMap;
pub use table::EmbeddingTable;
pub use vectorizer::{ExampleVectorizer, VectorizerConfig};
pub use vectors::WordVectors;
