//! End-to-end tests for loading, generation, and embeddings against the
//! in-memory mock provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glassbox_engine::{
    Device, EngineError, GenerationOptions, GenerationSettings, GlassboxService, LoadState,
    MockProvider, ModelProvider, ModelRegistry,
};
use glassbox_model::{CausalLm, Embedder};
use glassbox_tokenizer::Tokenizer;

/// Counts model loads and widens the race window with a short sleep.
struct CountingProvider {
    inner: MockProvider,
    model_loads: AtomicUsize,
}

impl CountingProvider {
    fn new() -> Self {
        CountingProvider {
            inner: MockProvider::new(),
            model_loads: AtomicUsize::new(0),
        }
    }
}

impl ModelProvider for CountingProvider {
    fn load_tokenizer(&self) -> glassbox_engine::Result<Tokenizer> {
        self.inner.load_tokenizer()
    }

    fn load_model(&self, device: Device) -> glassbox_engine::Result<CausalLm> {
        self.model_loads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        self.inner.load_model(device)
    }

    fn load_embedder(&self) -> glassbox_engine::Result<Embedder> {
        self.inner.load_embedder()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// Sleeps long enough per stage for pollers to observe partial progress.
struct SlowProvider {
    inner: MockProvider,
}

impl ModelProvider for SlowProvider {
    fn load_tokenizer(&self) -> glassbox_engine::Result<Tokenizer> {
        thread::sleep(Duration::from_millis(120));
        self.inner.load_tokenizer()
    }

    fn load_model(&self, device: Device) -> glassbox_engine::Result<CausalLm> {
        thread::sleep(Duration::from_millis(120));
        self.inner.load_model(device)
    }

    fn load_embedder(&self) -> glassbox_engine::Result<Embedder> {
        thread::sleep(Duration::from_millis(120));
        self.inner.load_embedder()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

fn seeded_settings(seed: u64) -> GenerationSettings {
    GenerationSettings {
        seed: Some(seed),
        ..GenerationSettings::default()
    }
}

fn options(temperature: f32, max_tokens: usize) -> GenerationOptions {
    GenerationOptions {
        temperature,
        max_tokens,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_load_runs_the_provider_once() {
    let provider = Arc::new(CountingProvider::new());
    let registry = Arc::new(ModelRegistry::new(provider.clone()));
    assert_eq!(registry.state(), LoadState::NotStarted);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.load_all().await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(provider.model_loads.load(Ordering::SeqCst), 1);
    assert_eq!(registry.state(), LoadState::Ready);
    assert!(registry.is_ready());
    assert!(registry.progress().snapshot().is_complete());
}

#[tokio::test]
async fn failed_load_resets_progress_and_can_be_retried() {
    let registry = ModelRegistry::new(Arc::new(MockProvider::failing()));

    let err = registry.load_all().await.unwrap_err();
    assert!(matches!(err, EngineError::Load(_)));
    assert_eq!(registry.state(), LoadState::Failed);
    assert!(!registry.is_ready());

    let snapshot = registry.progress().snapshot();
    assert_eq!(snapshot.tokenizer, 0);
    assert_eq!(snapshot.model, 0);
    assert_eq!(snapshot.embedder, 0);

    // A later call claims the failed slot again instead of hanging.
    let err = registry.load_all().await.unwrap_err();
    assert!(matches!(err, EngineError::Load(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failure_fails_every_caller() {
    let registry = Arc::new(ModelRegistry::new(Arc::new(MockProvider::failing())));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.load_all().await }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_err());
    }
    assert_eq!(registry.state(), LoadState::Failed);
}

#[tokio::test]
async fn generate_loads_models_on_demand() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));
    assert!(!service.is_ready());

    let outcome = service
        .generate("Hello, how are you".to_string(), options(0.7, 3))
        .await
        .unwrap();

    assert!(service.is_ready());
    assert_eq!(service.state(), LoadState::Ready);
    assert!(!outcome.text.is_empty());
}

#[tokio::test]
async fn visualization_dimensions_match_the_prompt() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));
    let outcome = service
        .generate("Hello, how are you".to_string(), options(0.7, 2))
        .await
        .unwrap();
    let viz = &outcome.visualization;

    let prompt_len = viz.input_tokens.len();
    assert_eq!(prompt_len, 5);
    assert_eq!(viz.input_tokens[0], "Hello");

    assert_eq!(viz.attention.len(), prompt_len);
    for (i, row) in viz.attention.iter().enumerate() {
        assert_eq!(row.len(), prompt_len);
        // Causal mask: nothing attends to later positions.
        for &w in &row[i + 1..] {
            assert_eq!(w, 0.0);
        }
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3, "row {i} sums to {sum}");
    }

    assert_eq!(viz.embeddings.len(), prompt_len);
    let hidden = viz.embeddings[0].len();
    assert!(hidden > 0);

    let ffn = viz.ffn_activations.as_ref().expect("ffn captured");
    assert_eq!(ffn.len(), prompt_len);
    assert_eq!(ffn[0].len(), hidden);

    assert_eq!(viz.first_token_generation.output_vector.len(), hidden);
}

#[tokio::test]
async fn first_token_candidates_are_ranked() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));
    let outcome = service
        .generate("Hello there".to_string(), options(0.7, 1))
        .await
        .unwrap();
    let first = &outcome.visualization.first_token_generation;

    assert_eq!(first.top_k_tokens.len(), 5);
    assert_eq!(first.top_k_probabilities.len(), 5);
    for pair in first.top_k_probabilities.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
    for &p in &first.top_k_probabilities {
        assert!(p > 0.0 && p <= 1.0);
    }
    assert!(!first.chosen_token.is_empty());
}

#[tokio::test]
async fn embed_never_triggers_loading() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));

    let err = service.embed("hi".to_string()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotReady(_)));
    assert!(!service.is_ready());
    assert_eq!(service.state(), LoadState::NotStarted);
}

#[tokio::test]
async fn embed_returns_a_unit_vector() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));
    service.load_all().await.unwrap();

    let embedding = service.embed("Hello world".to_string()).await.unwrap();
    assert_eq!(embedding.len(), 16);
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
}

#[tokio::test]
async fn zero_token_budget_is_rejected() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));
    service.load_all().await.unwrap();

    let err = service
        .generate("Hello".to_string(), options(0.7, 0))
        .await
        .unwrap_err();
    match err {
        EngineError::Generation(msg) => assert!(msg.contains("max_tokens")),
        other => panic!("expected a generation error, got {other}"),
    }
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(7));
    service.load_all().await.unwrap();

    let err = service
        .generate(String::new(), options(0.7, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Generation(_)));
}

#[tokio::test]
async fn same_seed_extends_the_same_prefix() {
    let service = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(42));
    service.load_all().await.unwrap();

    let short = service
        .generate("Hello, how are you".to_string(), options(0.7, 1))
        .await
        .unwrap();
    let long = service
        .generate("Hello, how are you".to_string(), options(0.7, 2))
        .await
        .unwrap();

    assert!(
        long.text.starts_with(&short.text),
        "{:?} does not extend {:?}",
        long.text,
        short.text
    );
}

#[tokio::test]
async fn near_zero_temperature_ignores_the_seed() {
    let prompt = "Hello, how are you".to_string();

    let first = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(1));
    let second = GlassboxService::new(Arc::new(MockProvider::new()), seeded_settings(2));

    let a = first.generate(prompt.clone(), options(1e-4, 3)).await.unwrap();
    let b = second.generate(prompt, options(1e-4, 3)).await.unwrap();

    assert_eq!(
        a.visualization.first_token_generation.chosen_token,
        b.visualization.first_token_generation.chosen_token
    );
    assert_eq!(a.text, b.text);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_load_reports_partial_progress() {
    let provider = Arc::new(SlowProvider {
        inner: MockProvider::new(),
    });
    let service = GlassboxService::new(provider, seeded_settings(7));
    assert_eq!(service.loading_progress().overall(), 0.0);

    service.spawn_background_load();

    let mut saw_partial = false;
    let mut saw_loading = false;
    for _ in 0..1000 {
        let overall = service.loading_progress().overall();
        if overall > 0.0 && overall < 100.0 {
            saw_partial = true;
        }
        if service.state() == LoadState::Loading {
            saw_loading = true;
        }
        if service.is_ready() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(service.is_ready(), "load did not finish in time");
    assert!(saw_partial, "never observed partial progress");
    assert!(saw_loading, "never observed the loading state");
    assert_eq!(service.loading_progress().overall(), 100.0);
}
