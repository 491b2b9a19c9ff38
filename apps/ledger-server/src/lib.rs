//! # Ledger Server
//!
//! gRPC server that moves funds between accounts held in PostgreSQL.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Server                                   │
//! │                                                                         │
//! │  Client ──► Transfer stream ──► TransactionsService                     │
//! │                                       │ one task per stream             │
//! │                                       ▼                                 │
//! │                                  Session ──► transfer::process          │
//! │                                       │            │                    │
//! │                                       │            ▼                    │
//! │                                       │      reserved connection        │
//! │                                       │      (ledger-db)                │
//! │                                       ▼                                 │
//! │                              UnsentJournal (undeliverable responses)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `SERVER_HOST` / `SERVER_PORT` - listen address (default: 0.0.0.0:50051)
//! - `DATABASE_URL` - PostgreSQL connection string, or the parts
//!   `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_DB`, `DB_LOGIN`, `DB_PASSWORD`
//! - `DB_MAX_CONNECTIONS` - concurrent Transfer streams (default: 20)
//! - `DB_ACQUIRE_TIMEOUT_SECS` - wait for a free connection (default: 10)
//! - `DB_CONNECT_RETRY_SECS` - startup retry interval (default: 10)
//! - `TLS_ENABLED`, `TLS_CERT_PATH`, `TLS_KEY_PATH` - optional TLS
//! - `REQUEST_HEADER_NAME` - metadata header used as the log prefix
//! - `UNSENT_LOG_PATH` - unsent journal (default: log/unsent_changes.log)

pub mod config;
pub mod error;
pub mod proto;
pub mod server;
pub mod services;
pub mod session;
pub mod transfer;
pub mod unsent;

// Re-exports
pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{serve, ServerHandle};
pub use services::transactions_service::TransactionsService;
pub use session::{Session, SessionEnd, SessionEnv};
pub use unsent::UnsentJournal;
