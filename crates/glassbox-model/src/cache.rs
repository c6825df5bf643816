//! Per-layer key/value cache for incremental decoding.
//!
//! Prefill appends one row per prompt token; each decode step appends one
//! more. Buffers are preallocated at the maximum sequence length so appends
//! never reallocate.

use crate::error::{ModelError, Result};

/// Key/value rows for a single transformer layer.
///
/// Rows are flattened `[n_heads, head_dim]` slices; head `h` occupies
/// `[h * head_dim, (h + 1) * head_dim)` within a row.
#[derive(Debug, Clone)]
pub struct LayerKvCache {
    k: Vec<f32>,
    v: Vec<f32>,
    capacity: usize,
    n_heads: usize,
    head_dim: usize,
    seq_len: usize,
}

impl LayerKvCache {
    pub fn new(capacity: usize, n_heads: usize, head_dim: usize) -> Self {
        let buf_len = capacity * n_heads * head_dim;
        LayerKvCache {
            k: vec![0.0; buf_len],
            v: vec![0.0; buf_len],
            capacity,
            n_heads,
            head_dim,
            seq_len: 0,
        }
    }

    /// Width of one cached row (`n_heads * head_dim`).
    pub fn token_width(&self) -> usize {
        self.n_heads * self.head_dim
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.seq_len == 0
    }

    /// Append the key/value row for one token.
    pub fn append_token(&mut self, k_token: &[f32], v_token: &[f32]) -> Result<()> {
        let width = self.token_width();
        if k_token.len() != width || v_token.len() != width {
            let got = if k_token.len() != width {
                k_token.len()
            } else {
                v_token.len()
            };
            return Err(ModelError::shape(width, got));
        }
        if self.seq_len >= self.capacity {
            return Err(ModelError::CacheFull {
                seq_len: self.seq_len + 1,
                max: self.capacity,
            });
        }
        let offset = self.seq_len * width;
        self.k[offset..offset + width].copy_from_slice(k_token);
        self.v[offset..offset + width].copy_from_slice(v_token);
        self.seq_len += 1;
        Ok(())
    }

    /// Key slice for head `h` at cached position `pos`.
    pub fn key(&self, pos: usize, h: usize) -> &[f32] {
        let offset = pos * self.token_width() + h * self.head_dim;
        &self.k[offset..offset + self.head_dim]
    }

    /// Value slice for head `h` at cached position `pos`.
    pub fn value(&self, pos: usize, h: usize) -> &[f32] {
        let offset = pos * self.token_width() + h * self.head_dim;
        &self.v[offset..offset + self.head_dim]
    }

    /// Reset to empty without releasing the buffers.
    pub fn clear(&mut self) {
        self.seq_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_advances_seq_len() {
        let mut cache = LayerKvCache::new(8, 2, 4);
        assert!(cache.is_empty());
        cache.append_token(&[0.1; 8], &[0.2; 8]).unwrap();
        assert_eq!(cache.seq_len(), 1);
    }

    #[test]
    fn append_rejects_wrong_width() {
        let mut cache = LayerKvCache::new(8, 2, 4);
        let result = cache.append_token(&[0.1; 7], &[0.2; 8]);
        assert!(matches!(result, Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn append_rejects_overflow() {
        let mut cache = LayerKvCache::new(2, 2, 4);
        cache.append_token(&[0.1; 8], &[0.2; 8]).unwrap();
        cache.append_token(&[0.1; 8], &[0.2; 8]).unwrap();
        let result = cache.append_token(&[0.1; 8], &[0.2; 8]);
        assert!(matches!(result, Err(ModelError::CacheFull { .. })));
    }

    #[test]
    fn head_slices_follow_layout() {
        let mut cache = LayerKvCache::new(4, 2, 2);
        cache
            .append_token(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0])
            .unwrap();
        assert_eq!(cache.key(0, 0), &[1.0, 2.0]);
        assert_eq!(cache.key(0, 1), &[3.0, 4.0]);
        assert_eq!(cache.value(0, 1), &[7.0, 8.0]);
    }

    #[test]
    fn clear_resets_length() {
        let mut cache = LayerKvCache::new(4, 2, 2);
        cache.append_token(&[0.0; 4], &[0.0; 4]).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
