//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use glassbox_engine::GlassboxService;

#[derive(Clone)]
pub struct AppState {
    /// Shared model service for generation and embeddings.
    pub service: Arc<GlassboxService>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<GlassboxService>) -> Self {
        AppState {
            service,
            started_at: Instant::now(),
        }
    }
}
