//! Elementary layers: LayerNorm, affine projection, GELU.

use crate::error::{ModelError, Result};
use crate::mat::Mat;

/// GELU activation, tanh approximation.
pub fn gelu(x: f32) -> f32 {
    let sqrt_2_over_pi = 0.797_884_6;
    let c = 0.044_715;
    0.5 * x * (1.0 + (sqrt_2_over_pi * (x + c * x * x * x)).tanh())
}

/// Layer normalization with learned scale and shift.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    weight: Vec<f32>,
    bias: Vec<f32>,
    eps: f32,
}

impl LayerNorm {
    pub fn new(weight: Vec<f32>, bias: Vec<f32>, eps: f32) -> Result<Self> {
        if weight.is_empty() || weight.len() != bias.len() {
            return Err(ModelError::shape(
                format!("matching non-empty weight/bias, weight {}", weight.len()),
                bias.len(),
            ));
        }
        Ok(LayerNorm { weight, bias, eps })
    }

    pub fn dim(&self) -> usize {
        self.weight.len()
    }

    /// Normalize each row independently.
    pub fn forward(&self, x: &Mat) -> Mat {
        debug_assert_eq!(x.cols(), self.dim());
        let mut out = Mat::zeros(x.rows(), x.cols());
        for r in 0..x.rows() {
            let normed = self.forward_row(x.row(r));
            out.row_mut(r).copy_from_slice(&normed);
        }
        out
    }

    pub fn forward_row(&self, row: &[f32]) -> Vec<f32> {
        let n = row.len() as f32;
        let mean = row.iter().sum::<f32>() / n;
        let variance = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let inv = 1.0 / (variance + self.eps).sqrt();
        row.iter()
            .zip(self.weight.iter().zip(&self.bias))
            .map(|(v, (w, b))| (v - mean) * inv * w + b)
            .collect()
    }
}

/// Affine projection with weights stored `[in_dim, out_dim]` row-major,
/// the layout GPT-2 checkpoints use for their Conv1D projections.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Vec<f32>,
    bias: Vec<f32>,
    in_dim: usize,
    out_dim: usize,
}

impl Linear {
    pub fn new(weight: Vec<f32>, bias: Vec<f32>, in_dim: usize, out_dim: usize) -> Result<Self> {
        if weight.len() != in_dim * out_dim {
            return Err(ModelError::shape(
                format!("{in_dim}x{out_dim} weight"),
                weight.len(),
            ));
        }
        if bias.len() != out_dim {
            return Err(ModelError::shape(format!("{out_dim} bias"), bias.len()));
        }
        Ok(Linear {
            weight,
            bias,
            in_dim,
            out_dim,
        })
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    pub fn forward(&self, x: &Mat) -> Mat {
        debug_assert_eq!(x.cols(), self.in_dim);
        let mut out = Mat::zeros(x.rows(), self.out_dim);
        for r in 0..x.rows() {
            let projected = self.forward_row(x.row(r));
            out.row_mut(r).copy_from_slice(&projected);
        }
        out
    }

    pub fn forward_row(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), self.in_dim);
        let mut out = self.bias.clone();
        for (j, &v) in x.iter().enumerate() {
            let row = &self.weight[j * self.out_dim..(j + 1) * self.out_dim];
            for (o, w) in out.iter_mut().zip(row) {
                *o += v * w;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gelu_known_values() {
        assert!(gelu(0.0).abs() < 1e-6);
        assert!((gelu(1.0) - 0.8412).abs() < 1e-3);
        assert!((gelu(-1.0) + 0.1588).abs() < 1e-3);
    }

    #[test]
    fn layer_norm_centers_and_scales() {
        let ln = LayerNorm::new(vec![1.0; 4], vec![0.0; 4], 1e-5).unwrap();
        let out = ln.forward_row(&[1.0, 2.0, 3.0, 4.0]);
        let mean = out.iter().sum::<f32>() / 4.0;
        let var = out.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn layer_norm_applies_affine() {
        let ln = LayerNorm::new(vec![2.0, 2.0], vec![1.0, 1.0], 1e-5).unwrap();
        let out = ln.forward_row(&[-1.0, 1.0]);
        // Normalized inputs are close to -1 and 1; scale doubles, shift adds one.
        assert!((out[0] + 1.0).abs() < 1e-2);
        assert!((out[1] - 3.0).abs() < 1e-2);
    }

    #[test]
    fn layer_norm_rejects_mismatched_params() {
        assert!(LayerNorm::new(vec![1.0; 4], vec![0.0; 3], 1e-5).is_err());
        assert!(LayerNorm::new(vec![], vec![], 1e-5).is_err());
    }

    #[test]
    fn linear_matvec_layout() {
        // weight[j][o]: rows are inputs, columns outputs.
        let w = vec![
            1.0, 0.0, // input 0
            0.0, 1.0, // input 1
            1.0, 1.0, // input 2
        ];
        let linear = Linear::new(w, vec![0.5, -0.5], 3, 2).unwrap();
        let out = linear.forward_row(&[1.0, 2.0, 3.0]);
        assert_eq!(out, vec![1.0 + 3.0 + 0.5, 2.0 + 3.0 - 0.5]);
    }

    #[test]
    fn linear_rejects_bad_shapes() {
        assert!(Linear::new(vec![0.0; 5], vec![0.0; 2], 3, 2).is_err());
        assert!(Linear::new(vec![0.0; 6], vec![0.0; 3], 3, 2).is_err());
    }

    #[test]
    fn linear_forward_stacks_rows() {
        let linear = Linear::new(vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 0.0], 2, 2).unwrap();
        let x = Mat::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let out = linear.forward(&x);
        assert_eq!(out.row(0), &[1.0, 2.0]);
        assert_eq!(out.row(1), &[3.0, 4.0]);
    }
}
