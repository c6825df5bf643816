use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use glassbox_engine::{
    DiskProvider, GenerationSettings, GlassboxService, MockProvider, ModelProvider,
};
use glassbox_server::{run_server, AppState};

/// Chat API with model introspection data.
#[derive(Parser)]
#[command(name = "glassbox-server")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Directory with the causal LM checkpoint (config, weights, tokenizer).
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Directory with the sentence embedder checkpoint.
    #[arg(long)]
    embedder_dir: Option<PathBuf>,

    /// Fixed sampling seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let provider: Arc<dyn ModelProvider> = match (&args.model_dir, &args.embedder_dir) {
        (Some(model_dir), Some(embedder_dir)) => {
            Arc::new(DiskProvider::new(model_dir.clone(), embedder_dir.clone()))
        }
        _ => {
            tracing::warn!("no checkpoint directories given, serving the built-in mock model");
            Arc::new(MockProvider::new())
        }
    };

    let settings = GenerationSettings {
        seed: args.seed,
        ..GenerationSettings::default()
    };
    let service = GlassboxService::new(provider, settings);
    service.spawn_background_load();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    tracing::info!("Starting server on {addr}");

    run_server(AppState::new(service), addr).await?;
    Ok(())
}
