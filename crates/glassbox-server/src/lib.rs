//! # glassbox-server
//!
//! HTTP API for the glassbox generation engine.
//!
//! Exposes chat with introspection data, sentence embeddings, and health
//! reporting over REST. Model loading runs in the background; requests that
//! arrive before it finishes either wait (chat) or fail fast (embeddings).

pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;

pub use error::ServerError;
pub use server::{create_router, run_server};
pub use state::AppState;
