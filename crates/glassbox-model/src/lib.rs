//! # glassbox-model
//!
//! Pure-Rust GPT-2 family transformer built for introspection. A prefill
//! pass returns the per-layer hidden states, per-head attention weights, and
//! next-token logits in one traversal, and reports each block's feed-forward
//! output to an injected [`FfnObserver`]. Decode steps run against a KV cache
//! and return logits only.
//!
//! The crate also provides the sentence embedding model (bidirectional
//! encoder, mean pooling, L2 normalization) and safetensors weight loading
//! for both.

pub mod attention;
pub mod cache;
pub mod config;
pub mod embedder;
pub mod error;
mod init;
pub mod layers;
pub mod mat;
pub mod observe;
pub mod transformer;
pub mod weights;

pub use cache::LayerKvCache;
pub use config::ModelConfig;
pub use embedder::Embedder;
pub use error::{ModelError, Result};
pub use mat::Mat;
pub use observe::{FfnObserver, NoopObserver};
pub use transformer::{CausalLm, PrefillTrace};
pub use weights::{load_causal_lm, load_embedder};
