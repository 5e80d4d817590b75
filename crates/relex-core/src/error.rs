use thiserror::Error;

/// Errors that can occur while building or querying feature embeddings.
#[derive(Debug, Error)]
pub enum RelexError {
    /// A vocabulary, label or vector file is malformed, or an internal
    /// invariant of a table was violated.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested key or index is not present in an embedding table.
    #[error("feature not found in {table} table: {key}")]
    FeatureNotFound {
        /// Which table was queried.
        table: &'static str,
        /// The key or index that was missing.
        key: String,
    },

    /// A relative token offset fell outside the configured bound.
    #[error("offset {offset} is outside [-{bound}, {bound})")]
    IndexOutOfRange {
        /// The offending offset.
        offset: i64,
        /// The configured `MAX_ABS_OFFSET`.
        bound: usize,
    },

    /// The caller passed a value the embedder refuses to handle.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Candle tensor operation failed.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Reading an input file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelexError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RelexError::Config(msg.into())
    }
}

/// Result type alias for relex operations.
pub type Result<T> = std::result::Result<T, RelexError>;
