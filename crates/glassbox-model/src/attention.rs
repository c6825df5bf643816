//! Multi-head self-attention with per-head weight capture.

use crate::cache::LayerKvCache;
use crate::error::{ModelError, Result};
use crate::layers::Linear;
use crate::mat::Mat;

/// Multi-head attention with a fused QKV projection, GPT-2 style.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    c_attn: Linear,
    c_proj: Linear,
    n_heads: usize,
    head_dim: usize,
}

impl MultiHeadAttention {
    pub fn new(c_attn: Linear, c_proj: Linear, n_heads: usize) -> Result<Self> {
        let d = c_attn.in_dim();
        if c_attn.out_dim() != 3 * d {
            return Err(ModelError::shape(format!("{} (3x{d})", 3 * d), c_attn.out_dim()));
        }
        if c_proj.in_dim() != d || c_proj.out_dim() != d {
            return Err(ModelError::shape(
                format!("{d}x{d} output projection"),
                format!("{}x{}", c_proj.in_dim(), c_proj.out_dim()),
            ));
        }
        if n_heads == 0 || d % n_heads != 0 {
            return Err(ModelError::shape(
                format!("width divisible by {n_heads} heads"),
                d,
            ));
        }
        Ok(MultiHeadAttention {
            c_attn,
            c_proj,
            n_heads,
            head_dim: d / n_heads,
        })
    }

    pub fn n_heads(&self) -> usize {
        self.n_heads
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// Attend over a full sequence.
    ///
    /// Returns the projected context and one `seq x seq` weight matrix per
    /// head. With `causal` set, positions never attend forward; masked
    /// entries are zero. When a cache is given, the key/value rows are
    /// appended so decoding can continue from this sequence.
    pub fn forward_full(
        &self,
        x: &Mat,
        causal: bool,
        cache: Option<&mut LayerKvCache>,
    ) -> Result<(Mat, Vec<Mat>)> {
        let seq = x.rows();
        let d = self.n_heads * self.head_dim;
        let qkv = self.c_attn.forward(x);

        if let Some(cache) = cache {
            for r in 0..seq {
                let row = qkv.row(r);
                cache.append_token(&row[d..2 * d], &row[2 * d..3 * d])?;
            }
        }

        let scale = 1.0 / (self.head_dim as f32).sqrt();
        let mut ctx = Mat::zeros(seq, d);
        let mut weights = vec![Mat::zeros(seq, seq); self.n_heads];

        for h in 0..self.n_heads {
            let span = h * self.head_dim..(h + 1) * self.head_dim;
            for i in 0..seq {
                let q = &qkv.row(i)[span.clone()];
                let visible = if causal { i + 1 } else { seq };
                let mut scores: Vec<f32> = (0..visible)
                    .map(|j| {
                        let k = &qkv.row(j)[d + span.start..d + span.end];
                        dot(q, k) * scale
                    })
                    .collect();
                softmax_in_place(&mut scores);
                weights[h].row_mut(i)[..visible].copy_from_slice(&scores);
                let out = &mut ctx.row_mut(i)[span.clone()];
                for (j, &w) in scores.iter().enumerate() {
                    let v = &qkv.row(j)[2 * d + span.start..2 * d + span.end];
                    for (o, &vv) in out.iter_mut().zip(v) {
                        *o += w * vv;
                    }
                }
            }
        }

        Ok((self.c_proj.forward(&ctx), weights))
    }

    /// Attend a single new token over the cached sequence.
    ///
    /// Appends this token's key/value row, then attends the query over every
    /// cached position including the new one.
    pub fn forward_step(&self, x: &[f32], cache: &mut LayerKvCache) -> Result<Vec<f32>> {
        let d = self.n_heads * self.head_dim;
        let qkv = self.c_attn.forward_row(x);
        cache.append_token(&qkv[d..2 * d], &qkv[2 * d..3 * d])?;

        let scale = 1.0 / (self.head_dim as f32).sqrt();
        let seq = cache.seq_len();
        let mut ctx = vec![0.0; d];
        for h in 0..self.n_heads {
            let q = &qkv[h * self.head_dim..(h + 1) * self.head_dim];
            let mut scores: Vec<f32> = (0..seq)
                .map(|j| dot(q, cache.key(j, h)) * scale)
                .collect();
            softmax_in_place(&mut scores);
            let out = &mut ctx[h * self.head_dim..(h + 1) * self.head_dim];
            for (j, &w) in scores.iter().enumerate() {
                for (o, &v) in out.iter_mut().zip(cache.value(j, h)) {
                    *o += w * v;
                }
            }
        }

        Ok(self.c_proj.forward_row(&ctx))
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn softmax_in_place(scores: &mut [f32]) {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}
