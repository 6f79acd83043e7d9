//! Gaming News Proxy server binary
//!
//! Loads configuration, builds the shared services, starts the cache sweeps
//! and serves the API until Ctrl+C or SIGTERM.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gaming_news_proxy::cache::Partition;
use gaming_news_proxy::{create_router, spawn_cleanup_task, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gaming_news_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gaming News Proxy");

    let config = Config::from_env();
    info!(
        port = config.server_port,
        api_key_configured = config.youtube_api_key.is_some(),
        max_retries = config.max_retries,
        cleanup_interval = config.cleanup_interval,
        "Configuration loaded"
    );
    if config.youtube_api_key.is_none() {
        warn!("YOUTUBE_API_KEY is not set; upstream-backed routes will fail");
    }

    let state = AppState::from_config(&config).context("failed to build upstream client")?;

    let sweeps = vec![
        spawn_cleanup_task(
            state.cache.clone(),
            Partition::Api,
            config.cleanup_interval,
            config.stale_retention_ms(),
        ),
        spawn_cleanup_task(
            state.cache.clone(),
            Partition::RateLimit,
            config.rate_limit_cleanup_interval,
            0,
        ),
    ];
    info!("Background cache sweeps started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(sweeps))
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then stops the sweep tasks.
async fn shutdown_signal(sweeps: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for sweep in sweeps {
        sweep.abort();
    }
    warn!("Cache sweep tasks aborted");
}
