//! # Store Seam
//!
//! The three traits the transfer path is written against.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LedgerStore (shared by all sessions)                                   │
//! │     ping()                                                              │
//! │     acquire(timeout) ──► ReservedConnection (owned by one session)      │
//! │                              begin() ──► LedgerTx (one transfer)        │
//! │                              close()     find_sender / find_receiver    │
//! │                              drop = return to pool                      │
//! │                                          insert_account / update_balance│
//! │                                          commit / rollback              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations: [`crate::PgLedgerStore`] over PostgreSQL and, with the
//! `memory` feature, [`crate::memory::MemoryStore`].

use async_trait::async_trait;
use std::time::Duration;

use ledger_core::{AccountId, Money, NewAccount, ReceiverAccount, SenderAccount};

use crate::error::StoreResult;

/// Shared entry point to the balance store.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Conn: ReservedConnection;

    /// Round trip to the store.
    async fn ping(&self) -> StoreResult<()>;

    /// Checks out one connection, waiting at most `timeout`.
    async fn acquire(&self, timeout: Duration) -> StoreResult<Self::Conn>;
}

/// A connection reserved for one session.
///
/// Dropping the value returns the connection to its pool.
#[async_trait]
pub trait ReservedConnection: Send + Sized + 'static {
    /// Opens a transaction borrowing this connection.
    async fn begin<'a>(&'a mut self) -> StoreResult<Box<dyn LedgerTx + 'a>>;

    /// Closes the underlying connection instead of returning it to the pool.
    async fn close(self);
}

/// One open transaction.
///
/// Reads lock the rows they return until the transaction ends.
#[async_trait]
pub trait LedgerTx: Send {
    /// Loads the paying account. Absent key is [`StoreError::RowNotFound`].
    ///
    /// [`StoreError::RowNotFound`]: crate::StoreError::RowNotFound
    async fn find_sender(&mut self, client_key: &str) -> StoreResult<SenderAccount>;

    /// Loads the receiving account. Absent key is `RowNotFound`.
    async fn find_receiver(&mut self, client_key: &str) -> StoreResult<ReceiverAccount>;

    async fn insert_account(&mut self, account: &NewAccount) -> StoreResult<()>;

    async fn update_balance(&mut self, id: AccountId, balance: &Money) -> StoreResult<()>;

    async fn commit(&mut self) -> StoreResult<()>;

    /// Discards the transaction. A no-op returning `Ok` once the transaction
    /// has been committed or rolled back.
    async fn rollback(&mut self) -> StoreResult<()>;
}
