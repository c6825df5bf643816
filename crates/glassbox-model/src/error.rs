//! Error types for the glassbox-model crate.

use thiserror::Error;

/// Top-level error type for model operations.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Weight loading error: {0}")]
    WeightLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cache capacity exceeded: {seq_len} > {max}")]
    CacheFull { seq_len: usize, max: usize },

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] glassbox_tokenizer::TokenizerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("Missing tensor: {0}")]
    MissingTensor(String),

    #[error("Unsupported dtype: {0}")]
    UnsupportedDtype(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    /// Shorthand for building a [`ModelError::ShapeMismatch`] from display values.
    pub(crate) fn shape(expected: impl ToString, got: impl ToString) -> Self {
        ModelError::ShapeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
