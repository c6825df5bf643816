//! Model lifecycle and generation engine.
//!
//! The [`ModelRegistry`] loads the tokenizer, causal LM, and sentence
//! embedder exactly once and tracks per-resource progress; the
//! [`GenerationPipeline`] turns prompts into replies plus introspection
//! payloads; [`GlassboxService`] is the facade servers talk to.

pub mod capture;
pub mod device;
pub mod error;
pub mod mock;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod registry;
pub mod service;

pub use capture::{ActivationChannel, ActivationTrace};
pub use device::Device;
pub use error::{EngineError, Result};
pub use mock::MockProvider;
pub use pipeline::{
    FirstTokenGeneration, GenerationOptions, GenerationOutcome, GenerationPipeline,
    GenerationSettings, VisualizationPayload,
};
pub use progress::{LoadingProgress, ProgressSnapshot, Resource};
pub use provider::{DiskProvider, ModelProvider};
pub use registry::{LoadState, ModelRegistry};
pub use service::GlassboxService;
