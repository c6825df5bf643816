//! Service facade tying the registry and pipeline together.

use std::sync::Arc;

use tokio::task;
use tracing::{error, info};

use crate::device::Device;
use crate::error::{EngineError, Result};
use crate::pipeline::{
    GenerationOptions, GenerationOutcome, GenerationPipeline, GenerationSettings,
};
use crate::progress::ProgressSnapshot;
use crate::provider::ModelProvider;
use crate::registry::{LoadState, ModelRegistry};

/// Everything a frontend needs: loading, generation, and embeddings.
pub struct GlassboxService {
    registry: Arc<ModelRegistry>,
    pipeline: GenerationPipeline,
    model_name: String,
}

impl GlassboxService {
    pub fn new(provider: Arc<dyn ModelProvider>, settings: GenerationSettings) -> Arc<Self> {
        let model_name = provider.describe();
        let registry = Arc::new(ModelRegistry::new(provider));
        let pipeline = GenerationPipeline::new(Arc::clone(&registry), settings);
        Arc::new(GlassboxService {
            registry,
            pipeline,
            model_name,
        })
    }

    /// Kick off loading without waiting for it.
    ///
    /// Requests that arrive while loading runs see partial progress from
    /// [`GlassboxService::loading_progress`]; a failed load is retried by the
    /// next call that needs the models.
    pub fn spawn_background_load(&self) {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            match registry.load_all().await {
                Ok(()) => info!("background model load finished"),
                Err(e) => error!("background model load failed: {e}"),
            }
        });
    }

    /// Load every resource, waiting for completion.
    pub async fn load_all(&self) -> Result<()> {
        self.registry.load_all().await
    }

    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }

    pub fn state(&self) -> LoadState {
        self.registry.state()
    }

    pub fn loading_progress(&self) -> ProgressSnapshot {
        self.registry.progress().snapshot()
    }

    pub fn device(&self) -> Device {
        self.registry.device()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn settings(&self) -> &GenerationSettings {
        self.pipeline.settings()
    }

    /// Generate a reply with introspection data, loading models if needed.
    pub async fn generate(
        &self,
        message: String,
        options: GenerationOptions,
    ) -> Result<GenerationOutcome> {
        self.pipeline.generate(message, options).await
    }

    /// Embed a text with the sentence embedder.
    ///
    /// Unlike [`GlassboxService::generate`] this never triggers a load; it
    /// fails fast when the models are not ready.
    pub async fn embed(&self, text: String) -> Result<Vec<f32>> {
        let embedder = self.registry.embedder()?;
        task::spawn_blocking(move || embedder.embed(&text).map_err(EngineError::from))
            .await
            .map_err(|e| EngineError::Generation(format!("embedding task panicked: {e}")))?
    }
}
