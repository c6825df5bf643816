//! Idempotent loading and ownership of the model trio.
//!
//! The registry owns the tokenizer, the conversational model, and the
//! sentence embedder, together with a load state machine:
//!
//! ```text
//! NotStarted ──claim──> Loading ──> Ready
//!      ^                   │
//!      └──── Failed <──────┘
//! ```
//!
//! Any number of tasks may call [`ModelRegistry::load_all`] concurrently;
//! exactly one claims the load and the rest await its outcome through a
//! watch channel. A failed load resets all progress to zero and leaves the
//! state claimable again.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tokio::task;
use tracing::{error, info};

use glassbox_model::{CausalLm, Embedder};
use glassbox_tokenizer::Tokenizer;

use crate::capture::ActivationChannel;
use crate::device::Device;
use crate::error::{EngineError, Result};
use crate::progress::{LoadingProgress, Resource};
use crate::provider::ModelProvider;

/// Lifecycle of the loadable resources as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotStarted,
    Loading,
    Ready,
    Failed,
}

#[derive(Default)]
struct ResourceSlots {
    tokenizer: Option<Arc<Tokenizer>>,
    model: Option<Arc<CausalLm>>,
    channel: Option<ActivationChannel>,
    embedder: Option<Arc<Embedder>>,
}

/// Owns the loaded resources and the load state machine.
pub struct ModelRegistry {
    provider: Arc<dyn ModelProvider>,
    device: Device,
    progress: LoadingProgress,
    state: watch::Sender<LoadState>,
    slots: RwLock<ResourceSlots>,
}

impl ModelRegistry {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        let (state, _) = watch::channel(LoadState::NotStarted);
        ModelRegistry {
            provider,
            device: Device::auto(),
            progress: LoadingProgress::new(),
            state,
            slots: RwLock::new(ResourceSlots::default()),
        }
    }

    pub fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoadState::Ready
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn progress(&self) -> &LoadingProgress {
        &self.progress
    }

    pub fn describe_model(&self) -> String {
        self.provider.describe()
    }

    /// Load every resource, exactly once across concurrent callers.
    ///
    /// The first caller performs the load; others await its outcome. Calling
    /// again after a failure starts a fresh attempt.
    pub async fn load_all(&self) -> Result<()> {
        let claimed = self.state.send_if_modified(|state| match state {
            LoadState::NotStarted | LoadState::Failed => {
                *state = LoadState::Loading;
                true
            }
            LoadState::Loading | LoadState::Ready => false,
        });

        if !claimed {
            return self.await_outcome().await;
        }

        match self.run_load().await {
            Ok(()) => {
                self.state.send_replace(LoadState::Ready);
                info!(model = %self.provider.describe(), "all models loaded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "model loading failed");
                self.clear_slots();
                self.progress.reset();
                self.state.send_replace(LoadState::Failed);
                Err(e)
            }
        }
    }

    /// Wait for an in-flight load started by another task.
    async fn await_outcome(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        loop {
            match *rx.borrow_and_update() {
                LoadState::Ready => return Ok(()),
                LoadState::Failed => {
                    return Err(EngineError::Load(
                        "model loading failed in another task".to_string(),
                    ));
                }
                LoadState::NotStarted | LoadState::Loading => {}
            }
            if rx.changed().await.is_err() {
                return Err(EngineError::Load("loading task went away".to_string()));
            }
        }
    }

    async fn run_load(&self) -> Result<()> {
        info!(
            device = self.device.name(),
            model = %self.provider.describe(),
            "starting model load"
        );

        info!("[1/3] loading tokenizer");
        let provider = Arc::clone(&self.provider);
        let tokenizer = task::spawn_blocking(move || provider.load_tokenizer())
            .await
            .map_err(join_failure)??;
        self.store(|slots| slots.tokenizer = Some(Arc::new(tokenizer)))?;
        self.progress.complete(Resource::Tokenizer);

        info!("[2/3] loading conversational model");
        let provider = Arc::clone(&self.provider);
        let device = self.device;
        let model = task::spawn_blocking(move || provider.load_model(device))
            .await
            .map_err(join_failure)??;
        let channel = ActivationChannel::for_model(&model);
        self.store(|slots| {
            slots.model = Some(Arc::new(model));
            slots.channel = Some(channel);
        })?;
        self.progress.complete(Resource::Model);

        info!("[3/3] loading embedding model");
        let provider = Arc::clone(&self.provider);
        let embedder = task::spawn_blocking(move || provider.load_embedder())
            .await
            .map_err(join_failure)??;
        self.store(|slots| slots.embedder = Some(Arc::new(embedder)))?;
        self.progress.complete(Resource::Embedder);

        Ok(())
    }

    fn store(&self, write: impl FnOnce(&mut ResourceSlots)) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| EngineError::Load("model registry lock poisoned".to_string()))?;
        write(&mut slots);
        Ok(())
    }

    fn clear_slots(&self) {
        if let Ok(mut slots) = self.slots.write() {
            *slots = ResourceSlots::default();
        }
    }

    /// Tokenizer, model, and capture channel for one generation call.
    pub fn generation_handles(
        &self,
    ) -> Result<(Arc<Tokenizer>, Arc<CausalLm>, ActivationChannel)> {
        if !self.is_ready() {
            return Err(EngineError::NotReady("text generation"));
        }
        let slots = self
            .slots
            .read()
            .map_err(|_| EngineError::Generation("model registry lock poisoned".to_string()))?;
        match (&slots.tokenizer, &slots.model, slots.channel) {
            (Some(tokenizer), Some(model), Some(channel)) => {
                Ok((Arc::clone(tokenizer), Arc::clone(model), channel))
            }
            _ => Err(EngineError::NotReady("text generation")),
        }
    }

    /// The embedding model. Never triggers a load.
    pub fn embedder(&self) -> Result<Arc<Embedder>> {
        if !self.is_ready() {
            return Err(EngineError::NotReady("embeddings"));
        }
        let slots = self
            .slots
            .read()
            .map_err(|_| EngineError::Generation("model registry lock poisoned".to_string()))?;
        slots
            .embedder
            .as_ref()
            .map(Arc::clone)
            .ok_or(EngineError::NotReady("embeddings"))
    }
}

fn join_failure(e: task::JoinError) -> EngineError {
    EngineError::Load(format!("loading task panicked: {e}"))
}
