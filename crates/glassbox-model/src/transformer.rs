//! Decoder-only transformer with full activation tracing.
//!
//! The prefill pass walks the whole prompt and captures everything the
//! introspection payload needs in a single forward pass: per-layer hidden
//! states, per-head attention weights, feed-forward activations through an
//! observer, and the logits for the next token. Decode steps reuse the KV
//! cache and produce logits only.

use crate::attention::MultiHeadAttention;
use crate::cache::LayerKvCache;
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::init::WeightRng;
use crate::layers::{gelu, LayerNorm, Linear};
use crate::mat::Mat;
use crate::observe::FfnObserver;

/// Position-wise feed-forward network.
#[derive(Debug, Clone)]
pub struct FeedForward {
    c_fc: Linear,
    c_proj: Linear,
}

impl FeedForward {
    pub fn new(c_fc: Linear, c_proj: Linear) -> Result<Self> {
        if c_fc.out_dim() != c_proj.in_dim() || c_proj.out_dim() != c_fc.in_dim() {
            return Err(ModelError::shape(
                format!("{}x{} -> {}x{}", c_fc.in_dim(), c_fc.out_dim(), c_fc.out_dim(), c_fc.in_dim()),
                format!("{}x{} -> {}x{}", c_fc.in_dim(), c_fc.out_dim(), c_proj.in_dim(), c_proj.out_dim()),
            ));
        }
        Ok(FeedForward { c_fc, c_proj })
    }

    pub fn forward(&self, x: &Mat) -> Mat {
        let mut out = Mat::zeros(x.rows(), self.c_proj.out_dim());
        for r in 0..x.rows() {
            let projected = self.forward_row(x.row(r));
            out.row_mut(r).copy_from_slice(&projected);
        }
        out
    }

    pub fn forward_row(&self, x: &[f32]) -> Vec<f32> {
        let mut hidden = self.c_fc.forward_row(x);
        for v in hidden.iter_mut() {
            *v = gelu(*v);
        }
        self.c_proj.forward_row(&hidden)
    }
}

/// One pre-norm transformer block.
#[derive(Debug, Clone)]
pub struct TransformerBlock {
    pub ln_1: LayerNorm,
    pub attn: MultiHeadAttention,
    pub ln_2: LayerNorm,
    pub mlp: FeedForward,
}

impl TransformerBlock {
    /// Full-sequence pass. Returns the block output, the per-head attention
    /// weights, and the feed-forward output before its residual is applied.
    pub fn forward_full(
        &self,
        x: &Mat,
        causal: bool,
        cache: Option<&mut LayerKvCache>,
    ) -> Result<(Mat, Vec<Mat>, Mat)> {
        let normed = self.ln_1.forward(x);
        let (attn_out, weights) = self.attn.forward_full(&normed, causal, cache)?;
        let mid = x.add(&attn_out);
        let ffn = self.mlp.forward(&self.ln_2.forward(&mid));
        Ok((mid.add(&ffn), weights, ffn))
    }

    /// Single-token cached pass, logits path only.
    pub fn forward_step(&self, x: &[f32], cache: &mut LayerKvCache) -> Result<Vec<f32>> {
        let attn_out = self.attn.forward_step(&self.ln_1.forward_row(x), cache)?;
        let mid = add_rows(x, &attn_out);
        let ffn = self.mlp.forward_row(&self.ln_2.forward_row(&mid));
        Ok(add_rows(&mid, &ffn))
    }
}

/// Everything captured by a prefill pass.
#[derive(Debug, Clone)]
pub struct PrefillTrace {
    /// Next-token logits at the final prompt position.
    pub logits: Vec<f32>,

    /// Hidden states per layer boundary: entry 0 is the embedding output,
    /// the final entry is the last block's output after the output norm.
    pub hidden_states: Vec<Mat>,

    /// Attention weights per layer, one `seq x seq` matrix per head.
    pub attentions: Vec<Vec<Mat>>,
}

/// Decoder-only causal language model with a tied LM head.
#[derive(Debug)]
pub struct CausalLm {
    config: ModelConfig,
    wte: Vec<f32>,
    wpe: Vec<f32>,
    blocks: Vec<TransformerBlock>,
    ln_f: LayerNorm,
}

impl CausalLm {
    pub fn new(
        config: ModelConfig,
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
        if ln_f.dim() != d {
            return Err(ModelError::shape(d, ln_f.dim()));
        }
        Ok(CausalLm {
            config,
            wte,
            wpe,
            blocks,
            ln_f,
        })
    }

    /// Build a model with deterministic random weights.
    pub fn seeded(config: ModelConfig, seed: u64) -> Result<Self> {
        let (wte, wpe, blocks, ln_f) = seeded_stack(&config, seed)?;
        CausalLm::new(config, wte, wpe, blocks, ln_f)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    pub fn max_positions(&self) -> usize {
        self.config.max_position_embeddings
    }

    /// Fresh, empty per-layer caches sized for the full context window.
    pub fn new_cache(&self) -> Vec<LayerKvCache> {
        let head_dim = self.config.hidden_size / self.config.num_attention_heads;
        (0..self.blocks.len())
            .map(|_| {
                LayerKvCache::new(
                    self.config.max_position_embeddings,
                    self.config.num_attention_heads,
                    head_dim,
                )
            })
            .collect()
    }

    /// Run the prompt through the model, filling `caches` and capturing the
    /// full activation trace. The caches must be empty.
    pub fn prefill(
        &self,
        token_ids: &[i32],
        caches: &mut [LayerKvCache],
        observer: &mut dyn FfnObserver,
    ) -> Result<PrefillTrace> {
        if token_ids.is_empty() {
            return Err(ModelError::InvalidInput(
                "prefill requires at least one token".to_string(),
            ));
        }
        if token_ids.len() > self.config.max_position_embeddings {
            return Err(ModelError::InvalidInput(format!(
                "sequence length {} exceeds maximum positions {}",
                token_ids.len(),
                self.config.max_position_embeddings
            )));
        }
        if caches.len() != self.blocks.len() {
            return Err(ModelError::shape(self.blocks.len(), caches.len()));
        }
        if caches.iter().any(|c| !c.is_empty()) {
            return Err(ModelError::InvalidInput(
                "prefill requires empty caches".to_string(),
            ));
        }

        let mut x = self.embed_tokens(token_ids)?;
        let mut hidden_states = Vec::with_capacity(self.blocks.len() + 1);
        let mut attentions = Vec::with_capacity(self.blocks.len());
        hidden_states.push(x.clone());

        for (layer, (block, cache)) in self.blocks.iter().zip(caches.iter_mut()).enumerate() {
            let (next, weights, ffn) = block.forward_full(&x, true, Some(cache))?;
            observer.on_ffn_output(layer, &ffn);
            attentions.push(weights);
            hidden_states.push(next.clone());
            x = next;
        }

        // The final entry is post-norm; intermediate entries are raw block outputs.
        let normed = self.ln_f.forward(&x);
        if let Some(last) = hidden_states.last_mut() {
            *last = normed.clone();
        }

        let logits = self.project_vocab(normed.row(token_ids.len() - 1));
        Ok(PrefillTrace {
            logits,
            hidden_states,
            attentions,
        })
    }

    /// Advance the cached sequence by one token and return the logits.
    pub fn decode_step(
        &self,
        token_id: i32,
        position: usize,
        caches: &mut [LayerKvCache],
    ) -> Result<Vec<f32>> {
        if caches.len() != self.blocks.len() {
            return Err(ModelError::shape(self.blocks.len(), caches.len()));
        }
        let mut x = embed_token(&self.wte, &self.wpe, &self.config, token_id, position)?;
        for (block, cache) in self.blocks.iter().zip(caches.iter_mut()) {
            x = block.forward_step(&x, cache)?;
        }
        Ok(self.project_vocab(&self.ln_f.forward_row(&x)))
    }

    fn embed_tokens(&self, ids: &[i32]) -> Result<Mat> {
        let d = self.config.hidden_size;
        let mut out = Mat::zeros(ids.len(), d);
        for (pos, &id) in ids.iter().enumerate() {
            let row = embed_token(&self.wte, &self.wpe, &self.config, id, pos)?;
            out.row_mut(pos).copy_from_slice(&row);
        }
        Ok(out)
    }

    /// Project a hidden row onto the vocabulary through the tied embedding.
    fn project_vocab(&self, h: &[f32]) -> Vec<f32> {
        let d = self.config.hidden_size;
        (0..self.config.vocab_size)
            .map(|v| {
                self.wte[v * d..(v + 1) * d]
                    .iter()
                    .zip(h)
                    .map(|(w, x)| w * x)
                    .sum()
            })
            .collect()
    }
}

/// Token embedding plus learned position embedding for one token.
pub(crate) fn embed_token(
    wte: &[f32],
    wpe: &[f32],
    config: &ModelConfig,
    id: i32,
    position: usize,
) -> Result<Vec<f32>> {
    let idx = usize::try_from(id)
        .ok()
        .filter(|&i| i < config.vocab_size)
        .ok_or_else(|| ModelError::InvalidInput(format!("token id {id} out of vocabulary range")))?;
    if position >= config.max_position_embeddings {
        return Err(ModelError::InvalidInput(format!(
            "position {position} exceeds maximum {}",
            config.max_position_embeddings
        )));
    }
    let d = config.hidden_size;
    Ok(wte[idx * d..(idx + 1) * d]
        .iter()
        .zip(&wpe[position * d..(position + 1) * d])
        .map(|(t, p)| t + p)
        .collect())
}

/// Deterministic random weights for a full transformer stack.
pub(crate) fn seeded_stack(
    config: &ModelConfig,
    seed: u64,
) -> Result<(Vec<f32>, Vec<f32>, Vec<TransformerBlock>, LayerNorm)> {
    config.validate()?;
    let d = config.hidden_size;
    let ff = config.feed_forward_dim();
    let mut rng = WeightRng::new(seed);

    let wte = rng.fill(config.vocab_size * d);
    let wpe = rng.fill(config.max_position_embeddings * d);

    let mut blocks = Vec::with_capacity(config.num_hidden_layers);
    for _ in 0..config.num_hidden_layers {
        let ln_1 = LayerNorm::new(vec![1.0; d], vec![0.0; d], config.layer_norm_eps)?;
        let c_attn = Linear::new(rng.fill(d * 3 * d), rng.fill(3 * d), d, 3 * d)?;
        let attn_proj = Linear::new(rng.fill(d * d), rng.fill(d), d, d)?;
        let attn = MultiHeadAttention::new(c_attn, attn_proj, config.num_attention_heads)?;
        let ln_2 = LayerNorm::new(vec![1.0; d], vec![0.0; d], config.layer_norm_eps)?;
        let c_fc = Linear::new(rng.fill(d * ff), rng.fill(ff), d, ff)?;
        let ff_proj = Linear::new(rng.fill(ff * d), rng.fill(d), ff, d)?;
        let mlp = FeedForward::new(c_fc, ff_proj)?;
        blocks.push(TransformerBlock {
            ln_1,
            attn,
            ln_2,
            mlp,
        });
    }

    let ln_f = LayerNorm::new(vec![1.0; d], vec![0.0; d], config.layer_norm_eps)?;
    Ok((wte, wpe, blocks, ln_f))
}

fn add_rows(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::NoopObserver;

    struct RecordingObserver {
        seen: Vec<(usize, usize, usize)>,
    }

    impl FfnObserver for RecordingObserver {
        fn on_ffn_output(&mut self, layer: usize, output: &Mat) {
            self.seen.push((layer, output.rows(), output.cols()));
        }
    }

    fn tiny_model() -> CausalLm {
        CausalLm::seeded(ModelConfig::tiny(16), 12345).unwrap()
    }

    #[test]
    fn prefill_trace_has_expected_shapes() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        let trace = model
            .prefill(&[1, 2, 3], &mut caches, &mut NoopObserver)
            .unwrap();

        assert_eq!(trace.logits.len(), 16);
        assert_eq!(trace.hidden_states.len(), 3);
        for states in &trace.hidden_states {
            assert_eq!((states.rows(), states.cols()), (3, 32));
        }
        assert_eq!(trace.attentions.len(), 2);
        for layer in &trace.attentions {
            assert_eq!(layer.len(), 4);
            for head in layer {
                assert_eq!((head.rows(), head.cols()), (3, 3));
            }
        }
    }

    #[test]
    fn prefill_fills_caches() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        model
            .prefill(&[1, 2, 3], &mut caches, &mut NoopObserver)
            .unwrap();
        assert!(caches.iter().all(|c| c.seq_len() == 3));
    }

    #[test]
    fn prefill_rejects_empty_prompt() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        let result = model.prefill(&[], &mut caches, &mut NoopObserver);
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn prefill_rejects_overlong_prompt() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        let ids = vec![1; model.max_positions() + 1];
        let result = model.prefill(&ids, &mut caches, &mut NoopObserver);
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn prefill_rejects_used_caches() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        model
            .prefill(&[1, 2], &mut caches, &mut NoopObserver)
            .unwrap();
        let result = model.prefill(&[1, 2], &mut caches, &mut NoopObserver);
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn prefill_rejects_out_of_range_token() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        let result = model.prefill(&[1, 99], &mut caches, &mut NoopObserver);
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn observer_sees_every_layer_in_order() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        let mut observer = RecordingObserver { seen: Vec::new() };
        model.prefill(&[1, 2, 3], &mut caches, &mut observer).unwrap();
        assert_eq!(observer.seen, vec![(0, 3, 32), (1, 3, 32)]);
    }

    #[test]
    fn decode_matches_prefill_logits() {
        let model = tiny_model();

        let mut full_caches = model.new_cache();
        let full = model
            .prefill(&[1, 2, 3, 4], &mut full_caches, &mut NoopObserver)
            .unwrap();

        let mut caches = model.new_cache();
        model
            .prefill(&[1, 2, 3], &mut caches, &mut NoopObserver)
            .unwrap();
        let stepped = model.decode_step(4, 3, &mut caches).unwrap();

        assert_eq!(full.logits.len(), stepped.len());
        for (a, b) in full.logits.iter().zip(&stepped) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn decode_rejects_position_overflow() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        model
            .prefill(&[1], &mut caches, &mut NoopObserver)
            .unwrap();
        let result = model.decode_step(1, model.max_positions(), &mut caches);
        assert!(matches!(result, Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn seeded_models_are_reproducible() {
        let a = tiny_model();
        let b = tiny_model();
        let mut ca = a.new_cache();
        let mut cb = b.new_cache();
        let ta = a.prefill(&[5, 6], &mut ca, &mut NoopObserver).unwrap();
        let tb = b.prefill(&[5, 6], &mut cb, &mut NoopObserver).unwrap();
        assert_eq!(ta.logits, tb.logits);
    }

    #[test]
    fn hidden_state_entries_differ_across_layers() {
        let model = tiny_model();
        let mut caches = model.new_cache();
        let trace = model
            .prefill(&[1, 2], &mut caches, &mut NoopObserver)
            .unwrap();
        let first = trace.hidden_states.first().unwrap();
        let last = trace.hidden_states.last().unwrap();
        assert_ne!(first.data(), last.data());
    }
}
