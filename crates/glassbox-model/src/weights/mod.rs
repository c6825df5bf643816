//! Weight loading for on-disk model directories.
//!
//! A model directory holds a `config.json` plus a single `model.safetensors`
//! using GPT-2 style tensor names, with or without the `transformer.` prefix
//! published checkpoints carry. The embedding model directory additionally
//! holds its `tokenizer.json`.

pub mod mmap;
pub mod safetensors;

use std::path::Path;

use glassbox_tokenizer::Tokenizer;

use crate::attention::MultiHeadAttention;
use crate::config::ModelConfig;
use crate::embedder::Embedder;
use crate::error::{ModelError, Result};
use crate::layers::{LayerNorm, Linear};
use crate::transformer::{CausalLm, FeedForward, TransformerBlock};

pub use self::mmap::MappedFile;
pub use self::safetensors::{SafetensorsFile, SafetensorsHeader, TensorInfo};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Load the conversational model from a directory.
pub fn load_causal_lm(dir: &Path) -> Result<CausalLm> {
    let config = ModelConfig::from_file(&dir.join(CONFIG_FILE))?;
    let file = SafetensorsFile::open(&dir.join(WEIGHTS_FILE))?;
    let (wte, wpe, blocks, ln_f) = load_stack(&file, &config)?;
    CausalLm::new(config, wte, wpe, blocks, ln_f)
}

/// Load the sentence embedding model from a directory.
pub fn load_embedder(dir: &Path) -> Result<Embedder> {
    let config = ModelConfig::from_file(&dir.join(CONFIG_FILE))?;
    let tokenizer = Tokenizer::from_file(&dir.join(TOKENIZER_FILE))?;
    let file = SafetensorsFile::open(&dir.join(WEIGHTS_FILE))?;
    let (wte, wpe, blocks, ln_f) = load_stack(&file, &config)?;
    Embedder::new(config, tokenizer, wte, wpe, blocks, ln_f)
}

fn load_stack(
    file: &SafetensorsFile,
    config: &ModelConfig,
) -> Result<(Vec<f32>, Vec<f32>, Vec<TransformerBlock>, LayerNorm)> {
    let d = config.hidden_size;
    let ff = config.feed_forward_dim();

    let wte = tensor_checked(file, "wte.weight", config.vocab_size * d)?;
    let wpe = tensor_checked(file, "wpe.weight", config.max_position_embeddings * d)?;

    let mut blocks = Vec::with_capacity(config.num_hidden_layers);
    for i in 0..config.num_hidden_layers {
        let prefix = format!("h.{i}");
        let ln_1 = layer_norm(file, &format!("{prefix}.ln_1"), d, config.layer_norm_eps)?;
        let c_attn = linear(file, &format!("{prefix}.attn.c_attn"), d, 3 * d)?;
        let attn_proj = linear(file, &format!("{prefix}.attn.c_proj"), d, d)?;
        let attn = MultiHeadAttention::new(c_attn, attn_proj, config.num_attention_heads)?;
        let ln_2 = layer_norm(file, &format!("{prefix}.ln_2"), d, config.layer_norm_eps)?;
        let c_fc = linear(file, &format!("{prefix}.mlp.c_fc"), d, ff)?;
        let ff_proj = linear(file, &format!("{prefix}.mlp.c_proj"), ff, d)?;
        blocks.push(TransformerBlock {
            ln_1,
            attn,
            ln_2,
            mlp: FeedForward::new(c_fc, ff_proj)?,
        });
    }

    let ln_f = layer_norm(file, "ln_f", d, config.layer_norm_eps)?;
    Ok((wte, wpe, blocks, ln_f))
}

/// Resolve a GPT-2 tensor name, trying the `transformer.` prefixed form too.
fn resolve_name(file: &SafetensorsFile, name: &str) -> Result<String> {
    if file.has_tensor(name) {
        return Ok(name.to_string());
    }
    let prefixed = format!("transformer.{name}");
    if file.has_tensor(&prefixed) {
        return Ok(prefixed);
    }
    Err(ModelError::MissingTensor(name.to_string()))
}

fn tensor_checked(file: &SafetensorsFile, name: &str, expected_len: usize) -> Result<Vec<f32>> {
    let resolved = resolve_name(file, name)?;
    let values = file.tensor_f32(&resolved)?;
    if values.len() != expected_len {
        return Err(ModelError::shape(
            format!("{name} with {expected_len} elements"),
            values.len(),
        ));
    }
    Ok(values)
}

fn linear(file: &SafetensorsFile, prefix: &str, in_dim: usize, out_dim: usize) -> Result<Linear> {
    let weight_name = resolve_name(file, &format!("{prefix}.weight"))?;
    if let Some(shape) = file.shape(&weight_name) {
        if shape != [in_dim, out_dim] {
            return Err(ModelError::shape(
                format!("[{in_dim}, {out_dim}] for {weight_name}"),
                format!("{shape:?}"),
            ));
        }
    }
    let weight = file.tensor_f32(&weight_name)?;
    let bias = tensor_checked(file, &format!("{prefix}.bias"), out_dim)?;
    Linear::new(weight, bias, in_dim, out_dim)
}

fn layer_norm(file: &SafetensorsFile, prefix: &str, dim: usize, eps: f32) -> Result<LayerNorm> {
    let weight = tensor_checked(file, &format!("{prefix}.weight"), dim)?;
    let bias = tensor_checked(file, &format!("{prefix}.bias"), dim)?;
    LayerNorm::new(weight, bias, eps)
}
