//! Prompt sieve server - Main entry point
//!
//! Accepts large texts over WebSocket, splits them into "Prompt" sections
//! and streams back the sections written in the target language.

use anyhow::{Context, Result};
use clap::Parser;
use sieve_common::config::TomlConfig;
use sieve_server::classifier::{build_classifier, ClassifierGate};
use sieve_server::config::{Args, ServerConfig};
use sieve_server::pipeline::PipelineConfig;
use sieve_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let level = toml_config.logging.level.clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("sieve_server={level},sieve_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sieve-server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::resolve(&args, toml_config).context("Invalid configuration")?;
    info!("Static files: {}", config.static_dir.display());
    info!(
        min_length = config.pipeline.min_length,
        target_language = %config.pipeline.target_language,
        max_segments = config.pipeline.max_segments,
        max_payload_bytes = config.max_payload_bytes,
        "Pipeline configured"
    );

    // Model loads in the background; the server answers "not ready" meanwhile
    let classifier =
        build_classifier(&config.classifier).context("Failed to create language classifier")?;
    let gate = ClassifierGate::initialize(classifier);

    let state = AppState::new(
        gate,
        PipelineConfig::from(&config.pipeline),
        config.max_payload_bytes,
        config.static_dir.clone(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
