//! Health check response type.

use serde::Serialize;

/// Health report: readiness, aggregate load progress, and device.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ready"` once every resource is loaded, `"initializing"` otherwise.
    pub status: String,
    pub models_loaded: bool,
    /// Aggregate loading percentage, 0.0 to 100.0.
    pub loading_progress: f32,
    pub device: String,
}
