//! Health check handler.

use axum::{extract::State, Json};

use crate::{models::HealthResponse, state::AppState};

/// Handle health check requests. Reports readiness and aggregate progress.
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let ready = state.service.is_ready();
    Json(HealthResponse {
        status: status_label(ready).to_string(),
        models_loaded: ready,
        loading_progress: state.service.loading_progress().overall(),
        device: state.service.device().name().to_string(),
    })
}

/// The two statuses the wire format knows: anything short of ready, including
/// a failed load awaiting retry, reports as initializing.
pub(crate) fn status_label(ready: bool) -> &'static str {
    if ready {
        "ready"
    } else {
        "initializing"
    }
}
