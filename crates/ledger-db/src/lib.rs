//! # ledger-db: Database Layer for the Ledger Server
//!
//! PostgreSQL persistence for account balances, behind a small async seam
//! that the transfer path is written against.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ledger-db                                      │
//! │                                                                         │
//! │  ┌────────────┐   ┌──────────────────────┐   ┌──────────────────────┐  │
//! │  │   pool     │──►│ repository::balances │──►│ store (seam traits)  │  │
//! │  │ Database   │   │ PgLedgerStore        │   │ LedgerStore          │  │
//! │  │ DbConfig   │   │ PgReservedConnection │   │ ReservedConnection   │  │
//! │  └────────────┘   │ PgLedgerTx           │   │ LedgerTx             │  │
//! │        │          └──────────────────────┘   └──────────▲───────────┘  │
//! │        ▼                                                │              │
//! │  ┌────────────┐                              ┌──────────┴───────────┐  │
//! │  │ migrations │                              │ memory (feature)     │  │
//! │  └────────────┘                              │ MemoryStore          │  │
//! │                                              └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use ledger_db::{Database, DbConfig, LedgerStore};
//!
//! let db = Database::connect_with_retry(&DbConfig::new(url), Duration::from_secs(10)).await;
//! db.run_migrations().await?;
//!
//! let store = db.balances();
//! store.ping().await?;
//! let mut conn = store.acquire(Duration::from_secs(10)).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

#[cfg(feature = "memory")]
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig};
pub use repository::{PgLedgerStore, PgLedgerTx, PgReservedConnection};
pub use store::{LedgerStore, LedgerTx, ReservedConnection};
