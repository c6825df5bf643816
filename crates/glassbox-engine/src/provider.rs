//! Sources for the tokenizer and model weights.

use std::path::PathBuf;

use tracing::debug;

use glassbox_model::{load_causal_lm, load_embedder, CausalLm, Embedder};
use glassbox_tokenizer::Tokenizer;

use crate::device::Device;
use crate::error::{EngineError, Result};

/// Supplies the three loadable resources.
///
/// Methods run on the blocking pool and may take seconds; the registry calls
/// each one exactly once per load attempt, in tokenizer, model, embedder
/// order.
pub trait ModelProvider: Send + Sync + 'static {
    fn load_tokenizer(&self) -> Result<Tokenizer>;
    fn load_model(&self, device: Device) -> Result<CausalLm>;
    fn load_embedder(&self) -> Result<Embedder>;

    /// Human-readable model identifier for logs and status endpoints.
    fn describe(&self) -> String;
}

/// Provider reading safetensors checkpoints from local directories.
///
/// The model directory holds `config.json`, `model.safetensors`, and
/// `tokenizer.json`; the embedder directory holds the same trio for the
/// sentence embedding model.
pub struct DiskProvider {
    model_dir: PathBuf,
    embedder_dir: PathBuf,
}

impl DiskProvider {
    pub fn new(model_dir: impl Into<PathBuf>, embedder_dir: impl Into<PathBuf>) -> Self {
        DiskProvider {
            model_dir: model_dir.into(),
            embedder_dir: embedder_dir.into(),
        }
    }
}

impl ModelProvider for DiskProvider {
    fn load_tokenizer(&self) -> Result<Tokenizer> {
        let path = self.model_dir.join("tokenizer.json");
        debug!(path = %path.display(), "loading tokenizer");
        Tokenizer::from_file(&path).map_err(|e| EngineError::Load(e.to_string()))
    }

    fn load_model(&self, device: Device) -> Result<CausalLm> {
        debug!(device = device.name(), dir = %self.model_dir.display(), "loading causal LM");
        load_causal_lm(&self.model_dir).map_err(|e| EngineError::Load(e.to_string()))
    }

    fn load_embedder(&self) -> Result<Embedder> {
        debug!(dir = %self.embedder_dir.display(), "loading embedder");
        load_embedder(&self.embedder_dir).map_err(|e| EngineError::Load(e.to_string()))
    }

    fn describe(&self) -> String {
        self.model_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model")
            .to_string()
    }
}
