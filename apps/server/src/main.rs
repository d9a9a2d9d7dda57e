//! # Stockbook Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing (RUST_LOG) → ServerConfig::load → Database::new (migrations)   │
//! │       → bootstrap admin → scheduler::spawn → axum::serve                │
//! │                                                                         │
//! │  Ctrl+C / SIGTERM → graceful shutdown → scheduler stopped → pool closed │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use std::time::Duration;
use stockbook_db::Database;
use stockbook_server::config::ServerConfig;
use stockbook_server::{bootstrap_admin, build_app, scheduler, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,stockbook=debug,sqlx=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting Stockbook server...");

    // Load configuration
    let config = ServerConfig::load(None).context("loading configuration")?;
    info!(
        addr = %config.listen_addr(),
        db = %config.database.path.display(),
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }
    }

    // Connect to database; migrations run on connect
    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    info!("Database ready");

    let state = AppState::new(db.clone(), config.clone());
    bootstrap_admin(&state).await?;

    let scheduler = config
        .scheduler
        .enabled
        .then(|| scheduler::spawn(db.clone(), Duration::from_secs(config.scheduler.tick_secs)));

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.listen_addr()))?;
    info!(addr = %config.listen_addr(), "Listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
