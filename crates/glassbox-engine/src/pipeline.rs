//! Prompt-to-payload generation pipeline.
//!
//! One generation call runs a traced prefill over the prompt, samples a
//! continuation with KV-cached decode steps, and assembles the introspection
//! payload from the prefill trace: input token strings, mean attention of the
//! final layer, layer-zero embeddings, the captured feed-forward activations,
//! and the first sampling step's top candidates.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

use glassbox_model::{CausalLm, PrefillTrace};
use glassbox_sampling::{softmax, top_candidates, Sampler};
use glassbox_tokenizer::Tokenizer;

use crate::capture::{ActivationChannel, ActivationTrace};
use crate::error::{EngineError, Result};
use crate::registry::ModelRegistry;

/// Service-level sampling and budget settings.
///
/// Per-request knobs live in [`GenerationOptions`]; everything here applies
/// to all requests and comes from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Prompts are truncated to this many tokens before prefill.
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Used when a request does not set a temperature.
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Used when a request does not set a token budget.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,

    /// Fixed sampling seed; omit for per-call entropy from the clock.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_input_tokens() -> usize {
    512
}
fn default_top_k() -> usize {
    50
}
fn default_top_p() -> f32 {
    0.9
}
fn default_repetition_penalty() -> f32 {
    1.2
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    100
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            max_input_tokens: default_max_input_tokens(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            seed: None,
        }
    }
}

/// Per-request generation knobs.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Top next-token candidates and the sampled choice at the first step.
#[derive(Debug, Clone, Serialize)]
pub struct FirstTokenGeneration {
    pub top_k_tokens: Vec<String>,
    pub top_k_probabilities: Vec<f32>,
    pub chosen_token: String,
    /// Final hidden state at the last prompt position.
    pub output_vector: Vec<f32>,
}

/// Introspection data captured while generating.
#[derive(Debug, Clone, Serialize)]
pub struct VisualizationPayload {
    /// Surface string of each prompt token.
    pub input_tokens: Vec<String>,

    /// Final-layer attention, averaged over heads: `[prompt][prompt]`.
    pub attention: Vec<Vec<f32>>,

    /// Layer-zero hidden state of each prompt token.
    pub embeddings: Vec<Vec<f32>>,

    /// Feed-forward activations of the observed layer, if captured.
    pub ffn_activations: Option<Vec<Vec<f32>>>,

    pub first_token_generation: FirstTokenGeneration,
}

/// A finished generation: the text plus everything captured on the way.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub visualization: VisualizationPayload,
}

/// Runs generation requests against the registry's resources.
pub struct GenerationPipeline {
    registry: Arc<ModelRegistry>,
    settings: GenerationSettings,
}

impl GenerationPipeline {
    pub fn new(registry: Arc<ModelRegistry>, settings: GenerationSettings) -> Self {
        GenerationPipeline { registry, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate a reply and its introspection payload.
    ///
    /// Loads the models first when they are not ready yet, then runs the
    /// heavy work on the blocking pool.
    pub async fn generate(
        &self,
        message: String,
        options: GenerationOptions,
    ) -> Result<GenerationOutcome> {
        if !self.registry.is_ready() {
            self.registry.load_all().await?;
        }
        let (tokenizer, model, channel) = self.registry.generation_handles()?;
        let settings = self.settings.clone();

        task::spawn_blocking(move || {
            run_generation(&tokenizer, &model, channel, &settings, &message, options)
        })
        .await
        .map_err(|e| EngineError::Generation(format!("generation task panicked: {e}")))?
    }
}

fn run_generation(
    tokenizer: &Tokenizer,
    model: &CausalLm,
    channel: ActivationChannel,
    settings: &GenerationSettings,
    message: &str,
    options: GenerationOptions,
) -> Result<GenerationOutcome> {
    if options.max_tokens == 0 {
        return Err(EngineError::Generation(
            "max_tokens must be at least 1".to_string(),
        ));
    }

    let limit = settings.max_input_tokens.min(model.max_positions());
    let input_ids = tokenizer.encode_truncated(message, limit);
    if input_ids.is_empty() {
        return Err(EngineError::Generation(
            "prompt produced no tokens".to_string(),
        ));
    }
    let input_len = input_ids.len();

    let mut capture = channel.begin();
    let mut caches = model.new_cache();
    let trace = model.prefill(&input_ids, &mut caches, &mut capture)?;

    let mut sampler = Sampler::new()
        .with_temperature(options.temperature)
        .with_top_k(settings.top_k)
        .with_top_p(settings.top_p)
        .with_repetition_penalty(settings.repetition_penalty)
        .with_seed(settings.seed.unwrap_or_else(entropy_seed));

    let mut sequence = input_ids;
    let first_choice = sample_next(&mut sampler, &trace.logits, &sequence)?;

    let eos = tokenizer.eos_id();
    let mut next = first_choice;
    let mut generated = 0usize;
    loop {
        if next == eos {
            break;
        }
        sequence.push(next);
        generated += 1;
        if generated >= options.max_tokens || sequence.len() >= model.max_positions() {
            break;
        }
        let logits = model.decode_step(next, sequence.len() - 1, &mut caches)?;
        next = sample_next(&mut sampler, &logits, &sequence)?;
    }

    let visualization = build_payload(
        tokenizer,
        &trace,
        capture,
        first_choice,
        &sequence[..input_len],
    )?;
    let text = tokenizer.decode_skipping_specials(&sequence);
    debug!(input_tokens = input_len, generated, "generation complete");

    Ok(GenerationOutcome {
        text,
        visualization,
    })
}

fn sample_next(sampler: &mut Sampler, logits: &[f32], sequence: &[i32]) -> Result<i32> {
    let history: Vec<usize> = sequence.iter().map(|&t| t as usize).collect();
    let index = sampler.sample_with_history(logits, &history)?;
    Ok(index as i32)
}

fn build_payload(
    tokenizer: &Tokenizer,
    trace: &PrefillTrace,
    capture: ActivationTrace,
    first_choice: i32,
    input_ids: &[i32],
) -> Result<VisualizationPayload> {
    let input_len = input_ids.len();
    let input_tokens = input_ids
        .iter()
        .map(|&id| tokenizer.decode_piece(id))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let probs = softmax(&trace.logits);
    let top = top_candidates(&probs, 5);
    let mut top_k_tokens = Vec::with_capacity(top.len());
    let mut top_k_probabilities = Vec::with_capacity(top.len());
    for (id, p) in top {
        top_k_tokens.push(tokenizer.decode_piece(id as i32)?);
        top_k_probabilities.push(p);
    }

    let first_states = trace.hidden_states.first().ok_or_else(empty_trace)?;
    let last_states = trace.hidden_states.last().ok_or_else(empty_trace)?;
    let last_layer = trace.attentions.last().ok_or_else(empty_trace)?;

    let heads = last_layer.len().max(1) as f32;
    let mut attention = vec![vec![0.0f32; input_len]; input_len];
    for head in last_layer {
        for (i, row) in attention.iter_mut().enumerate() {
            for (a, w) in row.iter_mut().zip(head.row(i)) {
                *a += w / heads;
            }
        }
    }

    Ok(VisualizationPayload {
        input_tokens,
        attention,
        embeddings: first_states.to_rows(),
        ffn_activations: capture.into_sole_entry().map(|m| m.to_rows()),
        first_token_generation: FirstTokenGeneration {
            top_k_tokens,
            top_k_probabilities,
            chosen_token: tokenizer.decode_piece(first_choice)?,
            output_vector: last_states.row(input_len - 1).to_vec(),
        },
    })
}

fn empty_trace() -> EngineError {
    EngineError::Generation("activation trace is empty".to_string())
}

fn entropy_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}
