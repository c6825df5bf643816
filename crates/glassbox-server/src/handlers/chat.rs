//! Chat handler.

use std::time::Instant;

use axum::{extract::State, Json};
use glassbox_engine::GenerationOptions;

use crate::{
    error::ServerError,
    handlers::health::status_label,
    models::{ChatRequest, ChatResponse},
    state::AppState,
};

/// Handle chat requests.
///
/// Generation loads the models first if they are not ready, so the first
/// request after startup pays the loading cost unless a background load
/// already ran.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    if req.message.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
    }

    let settings = state.service.settings();
    let options = GenerationOptions {
        temperature: req.temperature.unwrap_or(settings.default_temperature),
        max_tokens: req.max_tokens.unwrap_or(settings.default_max_tokens),
    };

    let started = Instant::now();
    let outcome = state.service.generate(req.message, options).await?;

    Ok(Json(ChatResponse {
        response: outcome.text,
        visualization_data: outcome.visualization,
        processing_time: started.elapsed().as_secs_f64(),
        model_status: status_label(state.service.is_ready()).to_string(),
    }))
}
