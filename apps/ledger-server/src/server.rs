//! Listener and lifecycle of the gRPC server.
//!
//! [`serve`] starts the server on a background task and hands back a
//! [`ServerHandle`]; stopping the server goes through that handle only.

use std::net::SocketAddr;

use ledger_db::LedgerStore;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::proto::transactions_server::TransactionsServer;
use crate::services::transactions_service::TransactionsService;

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting streams, waits for open ones to finish, then returns.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(signal) = self.shutdown.take() {
            let _ = signal.send(());
        }

        match self.task.await {
            Ok(result) => {
                result?;
                info!("Server shutdown complete");
                Ok(())
            }
            Err(e) => Err(ServerError::Internal(format!("server task failed: {e}"))),
        }
    }
}

/// Binds the configured address and starts serving `service`.
pub async fn serve<S: LedgerStore>(
    config: &ServerConfig,
    service: TransactionsService<S>,
) -> Result<ServerHandle, ServerError> {
    let listener = TcpListener::bind(config.listen_addr()?).await?;
    let local_addr = listener.local_addr()?;

    let mut builder = Server::builder();
    if config.tls_enabled {
        let identity = load_identity(config).await?;
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity))?;
        info!("TLS enabled");
    }

    let (shutdown, signal) = oneshot::channel::<()>();
    let router = builder.add_service(TransactionsServer::new(service));

    let incoming = TcpListenerStream::new(listener);
    let task = tokio::spawn(router.serve_with_incoming_shutdown(incoming, async {
        let _ = signal.await;
    }));

    info!(addr = %local_addr, "gRPC server listening");

    Ok(ServerHandle {
        local_addr,
        shutdown: Some(shutdown),
        task,
    })
}

async fn load_identity(config: &ServerConfig) -> Result<Identity, ServerError> {
    let (Some(cert_path), Some(key_path)) = (&config.tls_cert_path, &config.tls_key_path) else {
        return Err(crate::config::ConfigError::MissingTlsConfig.into());
    };

    let cert = tokio::fs::read(cert_path).await?;
    let key = tokio::fs::read(key_path).await?;
    Ok(Identity::from_pem(cert, key))
}

// =============================================================================
// End-to-end Tests
// =============================================================================
