//! # Ledger Server
//!
//! Bootstrap: logging, configuration, database, journal, gRPC listener.
//!
//! ```text
//! load config ──► connect (retry) ──► migrate ──► open journal ──► serve
//!                                                                    │
//!                         close pool ◄── shutdown ◄── SIGINT/SIGTERM ┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use ledger_core::Argon2Scheme;
use ledger_db::Database;
use ledger_server::{serve, ServerConfig, SessionEnv, TransactionsService, UnsentJournal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting ledger server...");

    let config = ServerConfig::load().context("Failed to load configuration")?;
    info!(
        host = %config.host,
        port = config.port,
        max_connections = config.db_max_connections,
        tls = config.tls_enabled,
        "Configuration loaded"
    );

    let db = Database::connect_with_retry(&config.db_config(), config.connect_retry).await;
    info!("Connected to PostgreSQL");

    db.run_migrations().await.context("Failed to run migrations")?;

    let journal = UnsentJournal::open(&config.unsent_log_path)
        .await
        .context("Failed to open unsent journal")?;

    let env = SessionEnv {
        journal: Arc::new(journal),
        credentials: Arc::new(Argon2Scheme),
    };
    let service = TransactionsService::new(db.balances(), env, &config);

    let handle = serve(&config, service).await.context("Failed to start gRPC server")?;

    shutdown_signal().await;

    handle.shutdown().await.context("Server did not shut down cleanly")?;
    db.close().await;

    info!("Ledger server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
