//! Chat request/response types.

use glassbox_engine::VisualizationPayload;
use serde::{Deserialize, Serialize};

/// Chat request.
///
/// Temperature and token budget fall back to the service defaults when
/// omitted.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Chat response with the generated text and introspection payload.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub visualization_data: VisualizationPayload,
    /// Wall-clock seconds spent handling the request.
    pub processing_time: f64,
    pub model_status: String,
}
