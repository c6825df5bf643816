//! Root and model info handlers.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Handle requests to the API root.
pub async fn handle_root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Glassbox LM API",
        "status": "running",
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "ready": state.service.is_ready(),
    }))
}

/// Handle model info requests.
pub async fn handle_model_info(State(state): State<AppState>) -> Json<Value> {
    let settings = state.service.settings();
    Json(json!({
        "model_name": state.service.model_name(),
        "parameters": {
            "max_length": settings.default_max_tokens,
            "temperature": settings.default_temperature,
            "top_p": settings.top_p,
            "top_k": settings.top_k,
            "repetition_penalty": settings.repetition_penalty,
        }
    }))
}
