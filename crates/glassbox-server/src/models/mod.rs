//! Request/response types for the HTTP API.

pub mod chat;
pub mod embeddings;
pub mod health;

pub use chat::{ChatRequest, ChatResponse};
pub use embeddings::{EmbeddingsQuery, EmbeddingsResponse};
pub use health::HealthResponse;
