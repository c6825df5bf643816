//! Embeddings request/response types.

use serde::{Deserialize, Serialize};

/// Query parameters for the embeddings endpoint.
#[derive(Debug, Deserialize)]
pub struct EmbeddingsQuery {
    pub text: String,
}

/// Sentence embedding response.
#[derive(Debug, Serialize)]
pub struct EmbeddingsResponse {
    pub embeddings: Vec<f32>,
}
