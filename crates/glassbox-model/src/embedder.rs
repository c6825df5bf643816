//! Sentence embedding model: a bidirectional transformer encoder with mean
//! pooling and L2 normalization over its own tokenizer.

use glassbox_tokenizer::Tokenizer;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::layers::LayerNorm;
use crate::mat::Mat;
use crate::transformer::{embed_token, seeded_stack, TransformerBlock};

pub struct Embedder {
    config: ModelConfig,
    tokenizer: Tokenizer,
    wte: Vec<f32>,
    wpe: Vec<f32>,
    blocks: Vec<TransformerBlock>,
    ln_f: LayerNorm,
}

impl Embedder {
    pub fn new(
        config: ModelConfig,
        tokenizer: Tokenizer,
        wte: Vec<f32>,
        wpe: Vec<f32>,
        blocks: Vec<TransformerBlock>,
        ln_f: LayerNorm,
    ) -> Result<Self> {
        config.validate()?;
        let d = config.hidden_size;
        if wte.len() != config.vocab_size * d {
            return Err(ModelError::shape(config.vocab_size * d, wte.len()));
        }
        if wpe.len() != config.max_position_embeddings * d {
            return Err(ModelError::shape(
                config.max_position_embeddings * d,
                wpe.len(),
            ));
        }
        if blocks.len() != config.num_hidden_layers {
            return Err(ModelError::shape(config.num_hidden_layers, blocks.len()));
        }
        Ok(Embedder {
            config,
            tokenizer,
            wte,
            wpe,
            blocks,
            ln_f,
        })
    }

    /// Build an embedder with deterministic random weights.
    pub fn seeded(config: ModelConfig, tokenizer: Tokenizer, seed: u64) -> Result<Self> {
        let (wte, wpe, blocks, ln_f) = seeded_stack(&config, seed)?;
        Embedder::new(config, tokenizer, wte, wpe, blocks, ln_f)
    }

    /// Dimensionality of the produced vectors.
    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    /// Encode a text into a single L2-normalized vector.
    ///
    /// Tokens attend bidirectionally; the final hidden states are mean-pooled
    /// across positions.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let ids = self
            .tokenizer
            .encode_truncated(text, self.config.max_position_embeddings);
        if ids.is_empty() {
            return Err(ModelError::InvalidInput(
                "embedding input produced no tokens".to_string(),
            ));
        }

        let d = self.config.hidden_size;
        let mut x = Mat::zeros(ids.len(), d);
        for (pos, &id) in ids.iter().enumerate() {
            let row = embed_token(&self.wte, &self.wpe, &self.config, id, pos)?;
            x.row_mut(pos).copy_from_slice(&row);
        }

        for block in &self.blocks {
            let (next, _weights, _ffn) = block.forward_full(&x, false, None)?;
            x = next;
        }
        let x = self.ln_f.forward(&x);

        let mut pooled = vec![0.0; d];
        for r in 0..x.rows() {
            for (p, v) in pooled.iter_mut().zip(x.row(r)) {
                *p += v;
            }
        }
        let n = x.rows() as f32;
        for p in pooled.iter_mut() {
            *p /= n;
        }

        let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for p in pooled.iter_mut() {
                *p /= norm;
            }
        }
        Ok(pooled)
    }
}
