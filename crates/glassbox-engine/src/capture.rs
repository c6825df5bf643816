//! Per-call capture of feed-forward activations.

use glassbox_model::{CausalLm, FfnObserver, Mat};

/// Identifies the layer whose feed-forward output generation records.
///
/// Created once when the model loads; [`ActivationChannel::begin`] starts an
/// empty trace scoped to a single generation call, so concurrent calls never
/// share capture state.
#[derive(Debug, Clone, Copy)]
pub struct ActivationChannel {
    layer: usize,
}

impl ActivationChannel {
    /// Target the final transformer layer of `model`.
    pub fn for_model(model: &CausalLm) -> Self {
        ActivationChannel {
            layer: model.num_layers().saturating_sub(1),
        }
    }

    pub fn with_layer(layer: usize) -> Self {
        ActivationChannel { layer }
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    /// A fresh trace for one generation call.
    pub fn begin(&self) -> ActivationTrace {
        ActivationTrace {
            layer: self.layer,
            entries: Vec::new(),
        }
    }
}

/// Feed-forward outputs recorded during a single forward pass.
#[derive(Debug)]
pub struct ActivationTrace {
    layer: usize,
    entries: Vec<Mat>,
}

impl ActivationTrace {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The capture of a one-pass generation. None unless exactly one pass
    /// reported the target layer.
    pub fn into_sole_entry(mut self) -> Option<Mat> {
        if self.entries.len() == 1 {
            self.entries.pop()
        } else {
            None
        }
    }
}

impl FfnObserver for ActivationTrace {
    fn on_ffn_output(&mut self, layer: usize, output: &Mat) {
        if layer == self.layer {
            self.entries.push(output.clone());
        }
    }
}
