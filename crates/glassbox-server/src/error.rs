//! HTTP error handling and response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use glassbox_engine::EngineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ServerError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ServerError::Engine(e) => match e {
                EngineError::NotReady(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "not_ready", e.to_string())
                }
                EngineError::Load(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "load_failure", e.to_string())
                }
                EngineError::Generation(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "generation_failure",
                    e.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}
