//! GPT-2 family model configuration.
//!
//! Defines the hyperparameters for the conversational model and the sentence
//! embedding model, loaded from a `config.json` next to the weights. Field
//! aliases accept the upstream GPT-2 naming (`n_embd`, `n_layer`, ...)
//! so published checkpoints load without edits.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ModelError, Result};

/// Configuration for a GPT-2 family transformer.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Vocabulary size (e.g., 50257 for GPT-2).
    pub vocab_size: usize,

    /// Hidden dimension of the model (e.g., 768 for GPT-2 small).
    #[serde(alias = "n_embd")]
    pub hidden_size: usize,

    /// Number of transformer layers (e.g., 12 for GPT-2 small).
    #[serde(alias = "n_layer")]
    pub num_hidden_layers: usize,

    /// Number of attention heads (e.g., 12 for GPT-2 small).
    #[serde(alias = "n_head")]
    pub num_attention_heads: usize,

    /// Intermediate dimension of the feed-forward network.
    /// GPT-2 checkpoints publish this as `n_inner` and often leave it null,
    /// meaning four times the hidden size.
    #[serde(default, alias = "n_inner")]
    pub intermediate_size: Option<usize>,

    /// Dimension of each attention head.
    /// Computed as hidden_size / num_attention_heads.
    #[serde(default)]
    pub head_dim: usize,

    /// Maximum sequence length (context window).
    #[serde(default = "default_max_position_embeddings", alias = "n_positions")]
    pub max_position_embeddings: usize,

    /// LayerNorm epsilon (default 1e-5).
    #[serde(default = "default_layer_norm_eps", alias = "layer_norm_epsilon")]
    pub layer_norm_eps: f32,

    /// Model type identifier.
    #[serde(default = "default_model_type")]
    pub model_type: String,
}

fn default_max_position_embeddings() -> usize {
    1024
}
fn default_layer_norm_eps() -> f32 {
    1e-5
}
fn default_model_type() -> String {
    "gpt2".to_string()
}

impl ModelConfig {
    /// Compute derived values after deserialization.
    pub fn resolve(&mut self) {
        if self.head_dim == 0 && self.num_attention_heads > 0 {
            self.head_dim = self.hidden_size / self.num_attention_heads;
        }
        if self.intermediate_size.is_none() {
            self.intermediate_size = Some(4 * self.hidden_size);
        }
    }

    /// Load and resolve a configuration from a `config.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: ModelConfig = serde_json::from_str(&text)?;
        config.resolve();
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants before building a model from this config.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0
            || self.hidden_size == 0
            || self.num_hidden_layers == 0
            || self.num_attention_heads == 0
        {
            return Err(ModelError::InvalidInput(
                "config dimensions must be non-zero".to_string(),
            ));
        }
        if self.hidden_size % self.num_attention_heads != 0 {
            return Err(ModelError::shape(
                format!("hidden_size divisible by {} heads", self.num_attention_heads),
                self.hidden_size,
            ));
        }
        Ok(())
    }

    /// Feed-forward dimension, defaulting to four times the hidden size.
    pub fn feed_forward_dim(&self) -> usize {
        self.intermediate_size.unwrap_or(4 * self.hidden_size)
    }

    /// Rough estimate of total parameter count.
    pub fn estimated_params(&self) -> usize {
        let embed = self.vocab_size * self.hidden_size
            + self.max_position_embeddings * self.hidden_size;
        // Per-layer: fused QKV + output projection + FFN + two norms.
        let attn = self.hidden_size * 3 * self.hidden_size + self.hidden_size * self.hidden_size;
        let ffn = 2 * self.hidden_size * self.feed_forward_dim();
        let norms = 4 * self.hidden_size;
        let per_layer = attn + ffn + norms;
        // Final norm only; the LM head is tied to the token embedding.
        embed + self.num_hidden_layers * per_layer + 2 * self.hidden_size
    }

    /// Preset configuration for GPT-2 small (124M parameters).
    pub fn gpt2_small() -> Self {
        let mut cfg = ModelConfig {
            vocab_size: 50257,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: Some(3072),
            head_dim: 64,
            max_position_embeddings: 1024,
            layer_norm_eps: 1e-5,
            model_type: "gpt2".to_string(),
        };
        cfg.resolve();
        cfg
    }

    /// Preset for a small model used in tests and mock serving.
    pub fn tiny(vocab_size: usize) -> Self {
        let mut cfg = ModelConfig {
            vocab_size,
            hidden_size: 32,
            num_hidden_layers: 2,
            num_attention_heads: 4,
            intermediate_size: Some(64),
            head_dim: 0,
            max_position_embeddings: 64,
            layer_norm_eps: 1e-5,
            model_type: "gpt2".to_string(),
        };
        cfg.resolve();
        cfg
    }
}
