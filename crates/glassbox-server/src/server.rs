//! Server setup and routing.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{handlers, state::AppState};

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::info::handle_root))
        .route("/health", get(handlers::health::handle_health))
        .route("/chat", post(handlers::chat::handle_chat))
        .route("/embeddings", get(handlers::embeddings::handle_embeddings))
        .route("/model/info", get(handlers::info::handle_model_info))
        .layer(middleware::from_fn(track_process_time))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Stamp responses with the handling time in seconds.
async fn track_process_time(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.6}")) {
        response.headers_mut().insert("x-process-time", value);
    }
    response
}

/// Run the HTTP server.
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
