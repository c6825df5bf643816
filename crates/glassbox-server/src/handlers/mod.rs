//! HTTP request handlers for API endpoints.

pub mod chat;
pub mod embeddings;
pub mod health;
pub mod info;

pub use chat::handle_chat;
pub use embeddings::handle_embeddings;
pub use health::handle_health;
pub use info::{handle_model_info, handle_root};
