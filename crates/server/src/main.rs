use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invox_core::{
    load_config, validate_config, Extractor, FileStorage, GeminiExtractor, InvoiceOrchestrator,
    InvoiceStore, LocalStorage, SqliteInvoiceStore,
};

use invox_server::api::create_router;
use invox_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("INVOX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Upload directory: {:?}", config.storage.upload_dir);

    // Create SQLite invoice store
    let store: Arc<dyn InvoiceStore> = Arc::new(
        SqliteInvoiceStore::new(&config.database.path)
            .context("Failed to create invoice store")?,
    );
    info!("Invoice store initialized");

    // Create local blob storage
    let storage: Arc<dyn FileStorage> = Arc::new(
        LocalStorage::new(config.storage.upload_dir.clone(), &config.storage.base_url)
            .context("Failed to create file storage")?,
    );
    info!("File storage initialized");

    // Create extraction client
    let gemini_config = config
        .extraction
        .gemini
        .clone()
        .context("Gemini backend selected but no gemini config provided")?;
    let extractor: Arc<dyn Extractor> = Arc::new(
        GeminiExtractor::new(gemini_config).context("Failed to create Gemini extractor")?,
    );
    info!("Gemini extractor initialized");

    // Create orchestrator
    let orchestrator = InvoiceOrchestrator::new(store, storage, extractor);

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), orchestrator));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
