//! tartan-id - Voice and face recognition service
//!
//! Resolves identities for voice clips and face images through external
//! providers, caching every result under a fingerprint of the input features
//! so repeated inputs are answered locally.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tartan_common::config::{RootFolderInitializer, RootFolderResolver};
use tartan_common::Fingerprinter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tartan_id::cache::CacheStore;
use tartan_id::config::ServiceConfig;
use tartan_id::services::{
    FaceDetector, FullFrameDetector, OpenAiClient, OvershootClient, ShazamClient,
    VisionFaceRecognizer, VoiceActorRecognizer,
};
use tartan_id::AppState;

const MODULE_NAME: &str = "tartan-id";

#[derive(Debug, Parser)]
#[command(name = "tartan-id", version, about = "Voice and face recognition service")]
struct Args {
    /// Root folder holding the cache database
    #[arg(long, value_name = "PATH")]
    root_folder: Option<PathBuf>,

    /// Listen port (default 5000)
    #[arg(long)]
    port: Option<u16>,

    /// Bind address (default 127.0.0.1)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Load TOML config (missing file ⇒ defaults)
    let toml_config = tartan_common::config::load_or_default(MODULE_NAME);

    // Step 2: Initialize tracing; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting tartan-id (recognition) service");
    info!(
        "Version: {} (build {}, {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServiceConfig::resolve(&toml_config, args.bind, args.port);

    // Step 3: Resolve and create root folder
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_toml_config(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 4: Open cache database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let fingerprinter = Fingerprinter::new(config.voice_policy.clone());
    let store = CacheStore::open(&db_path, &config.database, fingerprinter).await?;
    let stats = store.stats().await?;
    info!(
        voice_entries = stats.voice.entries,
        face_entries = stats.face.entries,
        "Recognition cache ready"
    );

    // Step 5: Wire providers
    let detector: Arc<dyn FaceDetector> = Arc::new(FullFrameDetector::default());
    let mut state = AppState::new(Arc::new(store)).with_face_detector(Arc::clone(&detector));

    let providers = &config.providers;
    if let Some(key) = &providers.openai_api_key {
        let voice_client =
            OpenAiClient::new(&providers.openai_base_url, key.clone(), providers.request_timeout)?;
        let vision_client =
            OpenAiClient::new(&providers.openai_base_url, key.clone(), providers.request_timeout)?;

        state = state
            .with_voice_recognizer(Arc::new(VoiceActorRecognizer::new(
                voice_client,
                providers.voice_model.clone(),
            )))
            .with_face_recognizer(Arc::new(VisionFaceRecognizer::new(
                vision_client,
                providers.vision_model.clone(),
                detector,
            )));
        info!(
            voice_model = %providers.voice_model,
            vision_model = %providers.vision_model,
            "OpenAI recognizers enabled"
        );
    } else {
        warn!("Voice and face recognition disabled: no OpenAI API key");
    }

    if let Some(key) = &providers.shazam_api_key {
        state = state.with_shazam(ShazamClient::new(key.clone(), providers.request_timeout)?);
        info!("Shazam music identification enabled");
    }

    if let Some(key) = &providers.overshoot_api_key {
        state = state.with_overshoot(OvershootClient::new(key.clone(), providers.request_timeout)?);
        info!("Overshoot scene analysis enabled");
    }

    // Step 6: Serve
    let app = tartan_id::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
