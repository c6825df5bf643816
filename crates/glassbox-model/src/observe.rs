//! Observation hooks for intermediate activations.

use crate::mat::Mat;

/// Receives the feed-forward sublayer output of each block during a full
/// forward pass, before the residual connection is applied.
///
/// The model calls `on_ffn_output` once per layer in layer order. Implementors
/// decide which layers to retain.
pub trait FfnObserver {
    fn on_ffn_output(&mut self, layer: usize, output: &Mat);
}

/// Observer that discards everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl FfnObserver for NoopObserver {
    fn on_ffn_output(&mut self, _layer: usize, _output: &Mat) {}
}
