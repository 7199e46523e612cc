//! Table Cache - A distributed cache over a partitioned table store
//!
//! Serves the cache over HTTP, backed by the in-memory table service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use table_cache::api::{create_router, AppState};
use table_cache::store::{MemoryConnector, MemoryTableService};
use table_cache::{spawn_sweeper_task, Config, TableCache};

/// Main entry point for the table cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and connect to its table
/// 4. Start the expiration sweeper, unless disabled
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "table_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Table Cache Server");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: table={}, partition={}, port={}, sweep_interval={}s",
        config.table_name, config.partition_key, config.server_port, config.sweep_interval
    );

    let cache_config = config.cache_config().context("invalid cache configuration")?;
    let connector = MemoryConnector::new(MemoryTableService::new());
    let cache = Arc::new(TableCache::new(cache_config, connector)?);

    let shutdown = CancellationToken::new();
    cache
        .connect(&shutdown)
        .await
        .context("failed to connect to the cache table")?;

    // Start background sweeper
    let sweeper = (config.sweep_interval > 0)
        .then(|| spawn_sweeper_task(cache.clone(), config.sweep_interval, shutdown.clone()));

    // Create router with all endpoints
    let app = create_router(AppState::with_shutdown(cache, shutdown.clone()));

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, cancels the shared token so the sweeper and any
/// in-flight table calls stop.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

    shutdown.cancel();
    warn!("Sweeper and in-flight table calls cancelled");
}
