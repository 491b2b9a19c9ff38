//! Transactions gRPC service implementation.
//!
//! Binds each Transfer stream to its own [`Session`] running on a spawned
//! task. Responses flow back through an mpsc channel wrapped in a
//! `ReceiverStream`.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ledger_db::LedgerStore;
use tokio_stream::{wrappers::ReceiverStream, Stream};
use tonic::{Request, Response, Status, Streaming};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::proto::{
    transactions_server::Transactions, BalanceRequest, BalanceResponse, TransferRequest,
    TransferResponse,
};
use crate::session::{self, Session, SessionEnd, SessionEnv};

/// Transactions service implementation.
pub struct TransactionsService<S> {
    store: Arc<S>,
    env: SessionEnv,
    acquire_timeout: Duration,
    request_header: Option<String>,
}

impl<S: LedgerStore> TransactionsService<S> {
    /// Create a new transactions service.
    pub fn new(store: S, env: SessionEnv, config: &ServerConfig) -> Self {
        TransactionsService {
            store: Arc::new(store),
            env,
            acquire_timeout: config.acquire_timeout,
            request_header: config.request_header.clone(),
        }
    }

    /// First value of the configured request header, or empty.
    fn log_prefix<T>(&self, request: &Request<T>) -> String {
        self.request_header
            .as_deref()
            .and_then(|name| request.metadata().get(name))
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

#[tonic::async_trait]
impl<S: LedgerStore> Transactions for TransactionsService<S> {
    type TransferStream = Pin<Box<dyn Stream<Item = Result<TransferResponse, Status>> + Send>>;

    /// Bidirectional transfer stream.
    async fn transfer(
        &self,
        request: Request<Streaming<TransferRequest>>,
    ) -> Result<Response<Self::TransferStream>, Status> {
        let prefix = self.log_prefix(&request);
        let inbound = request.into_inner();

        let session = Session::open(
            self.store.as_ref(),
            self.acquire_timeout,
            self.env.clone(),
            prefix,
        )
        .await
        .map_err(|e| Status::from(ServerError::from(e)))?;

        info!(request = %session.prefix(), "Transfer stream opened");

        let (tx, rx) = session::response_channel();

        tokio::spawn(async move {
            match session.run(inbound, tx).await {
                SessionEnd::Completed => info!("Transfer stream completed"),
                SessionEnd::ReceiveFailed(status) => {
                    warn!(code = ?status.code(), "Transfer stream ended on receive error")
                }
                SessionEnd::SendFailed => error!("Transfer stream ended on send error"),
            }
        });

        let output_stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(output_stream)))
    }

    async fn balance(
        &self,
        _request: Request<BalanceRequest>,
    ) -> Result<Response<BalanceResponse>, Status> {
        Err(Status::unimplemented("unimplemented method"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unsent::UnsentJournal;
    use ledger_core::Argon2Scheme;
    use ledger_db::memory::MemoryStore;
    use tonic::metadata::MetadataValue;

    async fn service(
        dir: &tempfile::TempDir,
        header: Option<&str>,
    ) -> TransactionsService<MemoryStore> {
        let mut vars = vec![("DATABASE_URL".to_string(), "postgres://unused/ledger".to_string())];
        if let Some(header) = header {
            vars.push(("REQUEST_HEADER_NAME".to_string(), header.to_string()));
        }
        let config = ServerConfig::from_lookup(|key| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();

        let journal = UnsentJournal::open(dir.path().join("unsent.log")).await.unwrap();
        let env = SessionEnv {
            journal: Arc::new(journal),
            credentials: Arc::new(Argon2Scheme),
        };
        TransactionsService::new(MemoryStore::new(), env, &config)
    }

    #[tokio::test]
    async fn test_log_prefix_uses_first_header_value() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, Some("x-request-id")).await;

        let mut request = Request::new(());
        request.metadata_mut().append("x-request-id", MetadataValue::from_static("first"));
        request.metadata_mut().append("x-request-id", MetadataValue::from_static("second"));
        assert_eq!(svc.log_prefix(&request), "first");

        assert_eq!(svc.log_prefix(&Request::new(())), "");
    }

    #[tokio::test]
    async fn test_log_prefix_without_configured_header() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, None).await;

        let mut request = Request::new(());
        request.metadata_mut().insert("x-request-id", MetadataValue::from_static("abc"));
        assert_eq!(svc.log_prefix(&request), "");
    }

    #[tokio::test]
    async fn test_balance_is_unimplemented() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir, None).await;

        let err = svc
            .balance(Request::new(BalanceRequest {
                client_key: "alice".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unimplemented);
        assert_eq!(err.message(), "unimplemented method");
    }
}
