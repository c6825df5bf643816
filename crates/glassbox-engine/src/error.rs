//! Error types for the glassbox-engine crate.

use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A model resource failed to load.
    #[error("Model loading failed: {0}")]
    Load(String),

    /// The models are not loaded yet; the payload names the refused operation.
    #[error("Models not loaded: {0}")]
    NotReady(&'static str),

    /// Text generation or embedding failed after the models were available.
    #[error("Generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<glassbox_model::ModelError> for EngineError {
    fn from(e: glassbox_model::ModelError) -> Self {
        EngineError::Generation(e.to_string())
    }
}

impl From<glassbox_tokenizer::TokenizerError> for EngineError {
    fn from(e: glassbox_tokenizer::TokenizerError) -> Self {
        EngineError::Generation(e.to_string())
    }
}

impl From<glassbox_sampling::SamplingError> for EngineError {
    fn from(e: glassbox_sampling::SamplingError) -> Self {
        EngineError::Generation(e.to_string())
    }
}
