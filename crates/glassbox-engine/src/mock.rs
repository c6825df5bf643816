//! In-process provider with small seeded models.
//!
//! Used by tests and by the server when no model directory is configured.
//! Everything is deterministic for a given seed: the vocabulary is built
//! from a fixed word list and the weights come from a seeded generator.

use glassbox_model::{CausalLm, Embedder, ModelConfig};
use glassbox_tokenizer::Tokenizer;

use crate::device::Device;
use crate::error::{EngineError, Result};
use crate::provider::ModelProvider;

/// Words the mock vocabulary can tokenize as single pieces. The leading
/// `\u{0120}` marks a word boundary, as in GPT-2 vocabularies.
const WORDS: &[&str] = &[
    "Hello",
    "Hi",
    ",",
    ".",
    "!",
    "?",
    "\u{0120}how",
    "\u{0120}are",
    "\u{0120}you",
    "\u{0120}world",
    "\u{0120}there",
    "\u{0120}is",
    "\u{0120}a",
    "\u{0120}the",
    "\u{0120}test",
    "\u{0120}model",
    "\u{0120}today",
    "\u{0120}fine",
    "\u{0120}thanks",
];

/// Provider that fabricates deterministic tiny models in memory.
pub struct MockProvider {
    seed: u64,
    fail: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        MockProvider {
            seed: 12345,
            fail: false,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        MockProvider { seed, fail: false }
    }

    /// A provider whose model stage always fails, for load-failure paths.
    pub fn failing() -> Self {
        MockProvider {
            seed: 12345,
            fail: true,
        }
    }

    fn build_tokenizer() -> Result<Tokenizer> {
        let mut vocab: Vec<String> = vec!["<|endoftext|>".to_string()];
        let mut merges: Vec<(String, String)> = Vec::new();
        for word in WORDS {
            add_word(&mut vocab, &mut merges, word);
        }
        Tokenizer::from_parts(vocab, merges, "<|endoftext|>")
            .map_err(|e| EngineError::Load(e.to_string()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelProvider for MockProvider {
    fn load_tokenizer(&self) -> Result<Tokenizer> {
        Self::build_tokenizer()
    }

    fn load_model(&self, _device: Device) -> Result<CausalLm> {
        if self.fail {
            return Err(EngineError::Load("mock model load failure".to_string()));
        }
        let tokenizer = Self::build_tokenizer()?;
        let config = ModelConfig::tiny(tokenizer.vocab_size());
        CausalLm::seeded(config, self.seed).map_err(|e| EngineError::Load(e.to_string()))
    }

    fn load_embedder(&self) -> Result<Embedder> {
        if self.fail {
            return Err(EngineError::Load("mock embedder load failure".to_string()));
        }
        let tokenizer = Self::build_tokenizer()?;
        let mut config = ModelConfig::tiny(tokenizer.vocab_size());
        config.hidden_size = 16;
        config.intermediate_size = Some(32);
        config.head_dim = 0;
        config.resolve();
        Embedder::seeded(config, tokenizer, self.seed.wrapping_add(1))
            .map_err(|e| EngineError::Load(e.to_string()))
    }

    fn describe(&self) -> String {
        "mock-gpt2-tiny".to_string()
    }
}

/// Register a word as a single piece: its characters, every cumulative
/// prefix, and the merges that chain them together.
fn add_word(vocab: &mut Vec<String>, merges: &mut Vec<(String, String)>, word: &str) {
    let chars: Vec<String> = word.chars().map(|c| c.to_string()).collect();
    for c in &chars {
        if !vocab.contains(c) {
            vocab.push(c.clone());
        }
    }
    let mut prefix = chars[0].clone();
    for c in &chars[1..] {
        let joined = format!("{prefix}{c}");
        if !vocab.contains(&joined) {
            vocab.push(joined.clone());
        }
        let pair = (prefix.clone(), c.clone());
        if !merges.contains(&pair) {
            merges.push(pair);
        }
        prefix = joined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_covers_greeting_words() {
        let tokenizer = MockProvider::build_tokenizer().unwrap();
        let ids = tokenizer.encode("Hello, how are you");
        assert_eq!(ids.len(), 5);
        assert_eq!(tokenizer.decode(&ids), "Hello, how are you");
    }

    #[test]
    fn models_share_the_vocabulary() {
        let provider = MockProvider::new();
        let tokenizer = provider.load_tokenizer().unwrap();
        let model = provider.load_model(Device::Cpu).unwrap();
        assert_eq!(model.vocab_size(), tokenizer.vocab_size());
    }

    #[test]
    fn embedder_uses_a_narrower_width() {
        let provider = MockProvider::new();
        let model = provider.load_model(Device::Cpu).unwrap();
        let embedder = provider.load_embedder().unwrap();
        assert_eq!(embedder.hidden_size(), 16);
        assert_ne!(embedder.hidden_size(), model.hidden_size());
    }

    #[test]
    fn failing_provider_fails_at_the_model_stage() {
        let provider = MockProvider::failing();
        assert!(provider.load_tokenizer().is_ok());
        assert!(matches!(
            provider.load_model(Device::Cpu),
            Err(EngineError::Load(_))
        ));
    }

    #[test]
    fn same_seed_same_model() {
        let a = MockProvider::with_seed(9).load_model(Device::Cpu).unwrap();
        let b = MockProvider::with_seed(9).load_model(Device::Cpu).unwrap();
        let mut ca = a.new_cache();
        let mut cb = b.new_cache();
        let ta = a
            .prefill(&[1, 2], &mut ca, &mut glassbox_model::NoopObserver)
            .unwrap();
        let tb = b
            .prefill(&[1, 2], &mut cb, &mut glassbox_model::NoopObserver)
            .unwrap();
        assert_eq!(ta.logits, tb.logits);
    }
}
