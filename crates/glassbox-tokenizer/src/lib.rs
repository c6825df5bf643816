//! # glassbox-tokenizer
//!
//! Byte-pair tokenization for the glassbox service.
//!
//! Loads a HuggingFace-style `tokenizer.json` (vocabulary + merge rules) and
//! provides:
//! - encoding with truncation to a maximum input length
//! - whole-sequence decoding with optional special-token skipping
//! - per-id surface decoding for visualization labels
//! - a guaranteed padding token (falls back to the end-of-sequence token
//!   when the vocabulary does not define one)
//!
//! The merge loop is a simplified BPE: rules are applied greedily in file
//! order. That is sufficient for the vocabularies this service ships and for
//! the in-memory vocabularies tests construct via [`Tokenizer::from_parts`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Error type for tokenizer operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizerError {
    #[error("invalid token ID: {0}")]
    InvalidToken(i32),
    #[error("tokenizer asset error: {0}")]
    Asset(String),
}

pub type Result<T> = std::result::Result<T, TokenizerError>;

/// Byte-level BPE marker for a leading space.
const SPACE_MARKER: char = '\u{0120}';

/// Byte-level BPE marker for a newline.
const NEWLINE_MARKER: char = '\u{010A}';

/// Known end-of-sequence surface forms, checked in order.
const EOS_CANDIDATES: &[&str] = &["<|endoftext|>", "<|end_of_text|>", "</s>"];

/// Known padding surface forms, checked in order.
const PAD_CANDIDATES: &[&str] = &["<pad>", "[PAD]"];

/// Tokenizer wrapper handling encoding, decoding, and special tokens.
#[derive(Debug)]
pub struct Tokenizer {
    /// Vocabulary: token_id -> token string.
    vocab: Vec<String>,

    /// Reverse vocabulary: token string -> token_id.
    token_to_id: HashMap<String, i32>,

    /// BPE merge rules (pairs of token strings), in application order.
    merges: Vec<(String, String)>,

    /// IDs of control tokens, excluded from user-visible decoding.
    special_ids: HashSet<i32>,

    /// Whether the vocabulary uses byte-level space/newline markers.
    byte_level: bool,

    eos_id: i32,
    pad_id: i32,
}

impl Tokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    ///
    /// The file follows the HuggingFace tokenizers format: `model.vocab` maps
    /// token strings to ids, `model.merges` lists merge rules, and
    /// `added_tokens` carries the control tokens.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            TokenizerError::Asset(format!("failed to read {}: {e}", path.display()))
        })?;

        let json: serde_json::Value = serde_json::from_str(&data)
            .map_err(|e| TokenizerError::Asset(format!("failed to parse tokenizer JSON: {e}")))?;

        let mut vocab = Vec::new();
        let mut token_to_id = HashMap::new();

        if let Some(vocab_obj) = json
            .get("model")
            .and_then(|m| m.get("vocab"))
            .and_then(|v| v.as_object())
        {
            vocab.resize(vocab_obj.len(), String::new());

            for (token, id_val) in vocab_obj {
                if let Some(id) = id_val.as_i64() {
                    let id = id as i32;
                    if (id as usize) < vocab.len() {
                        vocab[id as usize] = token.clone();
                    }
                    token_to_id.insert(token.clone(), id);
                }
            }
        }

        // Merges appear either as "a b" strings or as ["a", "b"] pairs
        // depending on the tokenizers version that wrote the file.
        let mut merges = Vec::new();
        if let Some(merge_list) = json
            .get("model")
            .and_then(|m| m.get("merges"))
            .and_then(|m| m.as_array())
        {
            for merge in merge_list {
                if let Some(s) = merge.as_str() {
                    if let Some((a, b)) = s.split_once(' ') {
                        merges.push((a.to_string(), b.to_string()));
                    }
                } else if let Some(pair) = merge.as_array() {
                    if let (Some(a), Some(b)) = (
                        pair.first().and_then(|v| v.as_str()),
                        pair.get(1).and_then(|v| v.as_str()),
                    ) {
                        merges.push((a.to_string(), b.to_string()));
                    }
                }
            }
        }

        // Control tokens may extend the vocabulary beyond model.vocab.
        let mut special_ids = HashSet::new();
        if let Some(added) = json.get("added_tokens").and_then(|a| a.as_array()) {
            for entry in added {
                let id = entry.get("id").and_then(|v| v.as_i64());
                let content = entry.get("content").and_then(|v| v.as_str());
                if let (Some(id), Some(content)) = (id, content) {
                    let id = id as i32;
                    if id as usize >= vocab.len() {
                        vocab.resize(id as usize + 1, String::new());
                    }
                    vocab[id as usize] = content.to_string();
                    token_to_id.insert(content.to_string(), id);
                    if entry
                        .get("special")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                    {
                        special_ids.insert(id);
                    }
                }
            }
        }

        Self::assemble(vocab, token_to_id, merges, special_ids)
    }

    /// Build a tokenizer from an in-memory vocabulary and merge list.
    ///
    /// Ids are assigned by position in `vocab`. `eos` must name an entry of
    /// `vocab`; it is registered as the sole control token.
    pub fn from_parts(
        vocab: Vec<String>,
        merges: Vec<(String, String)>,
        eos: &str,
    ) -> Result<Self> {
        let mut token_to_id = HashMap::with_capacity(vocab.len());
        for (id, token) in vocab.iter().enumerate() {
            token_to_id.insert(token.clone(), id as i32);
        }

        let mut special_ids = HashSet::new();
        if let Some(&id) = token_to_id.get(eos) {
            special_ids.insert(id);
        }

        Self::assemble(vocab, token_to_id, merges, special_ids)
    }

    fn assemble(
        vocab: Vec<String>,
        token_to_id: HashMap<String, i32>,
        merges: Vec<(String, String)>,
        mut special_ids: HashSet<i32>,
    ) -> Result<Self> {
        if vocab.is_empty() {
            return Err(TokenizerError::Asset("empty vocabulary".to_string()));
        }

        let eos_id = EOS_CANDIDATES
            .iter()
            .find_map(|s| token_to_id.get(*s).copied())
            .or_else(|| special_ids.iter().min().copied())
            .ok_or_else(|| {
                TokenizerError::Asset("vocabulary defines no end-of-sequence token".to_string())
            })?;
        special_ids.insert(eos_id);

        // No dedicated padding token is common (GPT-2 has none); reuse EOS.
        let pad_id = PAD_CANDIDATES
            .iter()
            .find_map(|s| token_to_id.get(*s).copied())
            .unwrap_or(eos_id);
        special_ids.insert(pad_id);

        let byte_level = vocab.iter().any(|t| t.starts_with(SPACE_MARKER));

        Ok(Tokenizer {
            vocab,
            token_to_id,
            merges,
            special_ids,
            byte_level,
            eos_id,
            pad_id,
        })
    }

    /// Encode text into token IDs.
    ///
    /// Characters that never merge into a known token are dropped.
    pub fn encode(&self, text: &str) -> Vec<i32> {
        let prepared = self.mark_bytes(text);

        let mut tokens: Vec<String> = prepared.chars().map(|c| c.to_string()).collect();

        for (a, b) in &self.merges {
            let merged = format!("{a}{b}");
            let mut i = 0;
            while i + 1 < tokens.len() {
                if tokens[i] == *a && tokens[i + 1] == *b {
                    tokens[i] = merged.clone();
                    tokens.remove(i + 1);
                } else {
                    i += 1;
                }
            }
        }

        tokens
            .iter()
            .filter_map(|t| self.token_to_id.get(t).copied())
            .collect()
    }

    /// Encode text, keeping at most `max_len` leading tokens.
    pub fn encode_truncated(&self, text: &str, max_len: usize) -> Vec<i32> {
        let mut ids = self.encode(text);
        ids.truncate(max_len);
        ids
    }

    /// Decode token IDs back to text. Unknown IDs are skipped.
    pub fn decode(&self, token_ids: &[i32]) -> String {
        let joined: String = token_ids
            .iter()
            .filter_map(|&id| self.vocab.get(id as usize))
            .map(|s| s.as_str())
            .collect();
        self.unmark_bytes(&joined)
    }

    /// Decode token IDs, excluding control tokens from the output.
    pub fn decode_skipping_specials(&self, token_ids: &[i32]) -> String {
        let kept: Vec<i32> = token_ids
            .iter()
            .copied()
            .filter(|id| !self.special_ids.contains(id))
            .collect();
        self.decode(&kept)
    }

    /// Decode one token ID to its surface form.
    pub fn decode_piece(&self, token_id: i32) -> Result<String> {
        let piece = self
            .vocab
            .get(token_id as usize)
            .ok_or(TokenizerError::InvalidToken(token_id))?;
        Ok(self.unmark_bytes(piece))
    }

    /// Whether an ID names a control token.
    pub fn is_special(&self, token_id: i32) -> bool {
        self.special_ids.contains(&token_id)
    }

    pub fn eos_id(&self) -> i32 {
        self.eos_id
    }

    pub fn pad_id(&self) -> i32 {
        self.pad_id
    }

    /// Vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn mark_bytes(&self, text: &str) -> String {
        if !self.byte_level {
            return text.to_string();
        }
        text.chars()
            .map(|c| match c {
                ' ' => SPACE_MARKER,
                '\n' => NEWLINE_MARKER,
                other => other,
            })
            .collect()
    }

    fn unmark_bytes(&self, text: &str) -> String {
        if !self.byte_level {
            return text.to_string();
        }
        text.chars()
            .map(|c| match c {
                SPACE_MARKER => ' ',
                NEWLINE_MARKER => '\n',
                other => other,
            })
            .collect()
    }
}
