//! # Session Loop
//!
//! One session serves one Transfer stream on one reserved store connection.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Connecting ── ping fails ─────────────────────► Closed (Unavailable)   │
//! │      │        acquire times out ───────────────► Closed (Exhausted)     │
//! │      ▼                                                                  │
//! │    Ready ◄──────────── response sent ───────────┐                       │
//! │      │                                          │                       │
//! │      │ receive                                  │                       │
//! │      ├── end of stream ───► Closed, connection released                 │
//! │      ├── receive error ───► Closed, connection released                 │
//! │      ▼                                          │                       │
//! │  Processing ── transfer::process ── send ───────┘                       │
//! │                                      │                                  │
//! │                                      └─ send fails ──► journal record,  │
//! │                                                        connection       │
//! │                                                        closed, Closed   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests on a session are handled strictly one at a time: a response is
//! sent before the next request is read, so responses come back in request
//! order and at most one transaction is open on the connection.

use std::sync::Arc;
use std::time::Duration;

use ledger_core::{CredentialScheme, LedgerError};
use ledger_db::{LedgerStore, ReservedConnection, StoreError};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::{error, info, info_span, warn, Instrument};

use crate::proto::{TransferRequest, TransferResponse};
use crate::transfer;
use crate::unsent::UnsentJournal;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionEnv {
    pub journal: Arc<UnsentJournal>,
    pub credentials: Arc<dyn CredentialScheme>,
}

/// Sending half of a Transfer stream's responses.
pub type Outbound = mpsc::Sender<Result<TransferResponse, Status>>;

/// Responses queued per stream before the session waits on the client.
///
/// A queued response counts as sent. Keeping the queue at one bounds what a
/// vanished client can take with it to a single response.
const RESPONSE_BUFFER: usize = 1;

/// Channel between a session and the transport's response stream.
pub fn response_channel() -> (Outbound, mpsc::Receiver<Result<TransferResponse, Status>>) {
    mpsc::channel(RESPONSE_BUFFER)
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client closed its side of the stream.
    Completed,
    /// Reading the next request failed.
    ReceiveFailed(Status),
    /// A computed response could not be delivered. It was journaled and the
    /// store connection was closed.
    SendFailed,
}

/// A Transfer stream bound to its reserved connection.
pub struct Session<C> {
    conn: C,
    prefix: String,
    env: SessionEnv,
}

impl<C: ReservedConnection> Session<C> {
    /// Connecting state: checks the store is reachable and reserves one
    /// connection, waiting at most `acquire_timeout` for it.
    pub async fn open<S>(
        store: &S,
        acquire_timeout: Duration,
        env: SessionEnv,
        prefix: String,
    ) -> Result<Self, LedgerError>
    where
        S: LedgerStore<Conn = C>,
    {
        if let Err(e) = store.ping().await {
            warn!(request = %prefix, error = %e, "Store ping failed");
            return Err(LedgerError::Unavailable);
        }

        let conn = match store.acquire(acquire_timeout).await {
            Ok(conn) => conn,
            Err(StoreError::PoolExhausted) => {
                warn!(request = %prefix, timeout = ?acquire_timeout, "No free store connection");
                return Err(LedgerError::Exhausted);
            }
            Err(e) => {
                warn!(request = %prefix, error = %e, "Failed to acquire store connection");
                return Err(e.into());
            }
        };

        Ok(Session { conn, prefix, env })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Serves requests from `inbound` until the stream ends or breaks.
    pub async fn run<S>(self, inbound: S, outbound: Outbound) -> SessionEnd
    where
        S: Stream<Item = Result<TransferRequest, Status>> + Unpin + Send,
    {
        let span = info_span!("session", request = %self.prefix);
        self.serve(inbound, outbound).instrument(span).await
    }

    async fn serve<S>(self, mut inbound: S, outbound: Outbound) -> SessionEnd
    where
        S: Stream<Item = Result<TransferRequest, Status>> + Unpin + Send,
    {
        let Session { mut conn, prefix, env } = self;

        loop {
            let request = match inbound.next().await {
                None => {
                    info!("Stream closed by client");
                    return SessionEnd::Completed;
                }
                Some(Err(status)) => {
                    error!(
                        code = ?status.code(),
                        message = status.message(),
                        "Failed to receive request"
                    );
                    let forwarded = Status::new(status.code(), status.message().to_string());
                    // Best effort: the client may already be gone.
                    let _ = outbound.send(Err(forwarded)).await;
                    return SessionEnd::ReceiveFailed(status);
                }
                Some(Ok(request)) => request,
            };

            let processed = transfer::process(&request, &mut conn, env.credentials.as_ref()).await;
            let status_code = processed.response.status_code;

            if let Some(fault) = &processed.fault {
                error!(
                    transfer_id = %request.transfer_id,
                    status_code,
                    error = %fault,
                    "Transfer failed"
                );
            }

            if outbound.send(Ok(processed.response)).await.is_err() {
                error!(
                    transfer_id = %request.transfer_id,
                    status_code,
                    outcome = "unsent",
                    "Failed to send response"
                );
                let journaled = env.journal.record(&prefix, &request.transfer_id, status_code);
                if let Err(e) = journaled.await {
                    error!(
                        transfer_id = %request.transfer_id,
                        error = %e,
                        "Failed to journal unsent response"
                    );
                }
                conn.close().await;
                return SessionEnd::SendFailed;
            }

            info!(
                transfer_id = %request.transfer_id,
                status_code,
                outcome = "success",
                "Response sent"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
