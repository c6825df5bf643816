//! Observable per-resource loading progress.

use std::sync::atomic::{AtomicU8, Ordering};

/// The loadable resources, one progress slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tokenizer,
    Model,
    Embedder,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Tokenizer, Resource::Model, Resource::Embedder];
}

/// Loading progress per resource, readable from any thread while a load runs.
///
/// Slots hold 0 until their resource finishes, then 100. A failed load
/// resets every slot to 0.
#[derive(Debug, Default)]
pub struct LoadingProgress {
    tokenizer: AtomicU8,
    model: AtomicU8,
    embedder: AtomicU8,
}

impl LoadingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, resource: Resource) -> &AtomicU8 {
        match resource {
            Resource::Tokenizer => &self.tokenizer,
            Resource::Model => &self.model,
            Resource::Embedder => &self.embedder,
        }
    }

    pub fn complete(&self, resource: Resource) {
        self.slot(resource).store(100, Ordering::Release);
    }

    pub fn get(&self, resource: Resource) -> u8 {
        self.slot(resource).load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        for resource in Resource::ALL {
            self.slot(resource).store(0, Ordering::Release);
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            tokenizer: self.get(Resource::Tokenizer),
            model: self.get(Resource::Model),
            embedder: self.get(Resource::Embedder),
        }
    }
}

/// Point-in-time copy of all three slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub tokenizer: u8,
    pub model: u8,
    pub embedder: u8,
}

impl ProgressSnapshot {
    /// Aggregate percentage across the three resources, 0.0 to 100.0.
    pub fn overall(&self) -> f32 {
        (self.tokenizer as f32 + self.model as f32 + self.embedder as f32) / 3.0
    }

    pub fn is_complete(&self) -> bool {
        self.tokenizer == 100 && self.model == 100 && self.embedder == 100
    }
}
