//! In-process implementation of the store seam.
//!
//! Writes made inside a [`MemoryTx`] are staged and only applied to the
//! shared account map on commit. Every seam call is counted and most can be
//! made to fail, so callers can assert exactly how the store was driven.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ledger_core::{AccountId, Money, NewAccount, ReceiverAccount, SenderAccount};

use crate::error::{StoreError, StoreResult};
use crate::store::{LedgerStore, LedgerTx, ReservedConnection};

#[derive(Debug, Clone)]
struct Row {
    id: AccountId,
    credential: String,
    credential_salt: String,
    balance: Money,
}

/// How many times each seam operation ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub pings: usize,
    pub acquires: usize,
    pub begins: usize,
    pub commits: usize,
    /// Open transactions discarded by `rollback`.
    pub rollbacks: usize,
    /// Connections closed instead of released.
    pub closed: usize,
    /// Connections returned to the pool.
    pub released: usize,
}

/// Failures to inject.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub ping: bool,
    /// `acquire` times out.
    pub acquire: bool,
    pub begin: bool,
    pub insert: bool,
    /// `update_balance` fails for this account id.
    pub update_account: Option<AccountId>,
    pub commit: bool,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: BTreeMap<String, Row>,
    next_id: AccountId,
    counters: Counters,
    faults: Faults,
}

/// Shared in-memory balance store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts a committed account directly.
    pub fn seed(
        &self,
        client_key: &str,
        credential: &str,
        credential_salt: &str,
        balance: Money,
    ) -> AccountId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.accounts.insert(
            client_key.to_string(),
            Row {
                id,
                credential: credential.to_string(),
                credential_salt: credential_salt.to_string(),
                balance,
            },
        );
        id
    }

    /// Committed balance of an account.
    pub fn balance_of(&self, client_key: &str) -> Option<Money> {
        self.lock().accounts.get(client_key).map(|row| row.balance.clone())
    }

    /// Committed `(credential, salt)` of an account.
    pub fn credentials_of(&self, client_key: &str) -> Option<(String, String)> {
        self.lock()
            .accounts
            .get(client_key)
            .map(|row| (row.credential.clone(), row.credential_salt.clone()))
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    pub fn counters(&self) -> Counters {
        self.lock().counters.clone()
    }

    /// Replaces the injected faults.
    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Conn = MemoryConnection;

    async fn ping(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.counters.pings += 1;
        if inner.faults.ping {
            return Err(StoreError::ConnectionFailed("injected ping failure".to_string()));
        }
        Ok(())
    }

    async fn acquire(&self, _timeout: Duration) -> StoreResult<Self::Conn> {
        let mut inner = self.lock();
        if inner.faults.acquire {
            return Err(StoreError::PoolExhausted);
        }
        inner.counters.acquires += 1;
        Ok(MemoryConnection {
            store: self.clone(),
            closed: false,
        })
    }
}

/// Connection handed out by [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    closed: bool,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.store.lock().counters.released += 1;
        }
    }
}

#[async_trait]
impl ReservedConnection for MemoryConnection {
    async fn begin<'a>(&'a mut self) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        let mut inner = self.store.lock();
        if inner.faults.begin {
            return Err(StoreError::ConnectionFailed("injected begin failure".to_string()));
        }
        inner.counters.begins += 1;
        let view = inner.accounts.clone();
        drop(inner);

        Ok(Box::new(MemoryTx {
            store: self.store.clone(),
            view,
            writes: Vec::new(),
            open: true,
        }))
    }

    async fn close(self) {
        let mut this = self;
        this.closed = true;
        this.store.lock().counters.closed += 1;
    }
}

#[derive(Debug, Clone)]
enum Write {
    Insert(String, Row),
    Update(AccountId, Money),
}

/// Transaction over a snapshot of the accounts plus its own staged writes.
#[derive(Debug)]
pub struct MemoryTx {
    store: MemoryStore,
    view: BTreeMap<String, Row>,
    writes: Vec<Write>,
    open: bool,
}

impl MemoryTx {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::TxClosed)
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn find_sender(&mut self, client_key: &str) -> StoreResult<SenderAccount> {
        self.ensure_open()?;
        let row = self.view.get(client_key).ok_or(StoreError::RowNotFound)?;
        Ok(SenderAccount {
            id: row.id,
            balance: row.balance.clone(),
            credential: row.credential.clone(),
            credential_salt: row.credential_salt.clone(),
        })
    }

    async fn find_receiver(&mut self, client_key: &str) -> StoreResult<ReceiverAccount> {
        self.ensure_open()?;
        let row = self.view.get(client_key).ok_or(StoreError::RowNotFound)?;
        Ok(ReceiverAccount {
            id: row.id,
            balance: row.balance.clone(),
        })
    }

    async fn insert_account(&mut self, account: &NewAccount) -> StoreResult<()> {
        self.ensure_open()?;
        let id = {
            let mut inner = self.store.lock();
            if inner.faults.insert {
                return Err(StoreError::QueryFailed("injected insert failure".to_string()));
            }
            if inner.accounts.contains_key(&account.client_key) {
                return Err(StoreError::QueryFailed(format!(
                    "duplicate key value violates unique constraint: {}",
                    account.client_key
                )));
            }
            inner.next_id += 1;
            inner.next_id
        };
        if self.view.contains_key(&account.client_key) {
            return Err(StoreError::QueryFailed(format!(
                "duplicate key value violates unique constraint: {}",
                account.client_key
            )));
        }

        let row = Row {
            id,
            credential: account.credential.clone(),
            credential_salt: account.credential_salt.clone(),
            balance: account.balance.clone(),
        };
        self.view.insert(account.client_key.clone(), row.clone());
        self.writes.push(Write::Insert(account.client_key.clone(), row));
        Ok(())
    }

    async fn update_balance(&mut self, id: AccountId, balance: &Money) -> StoreResult<()> {
        self.ensure_open()?;
        if self.store.lock().faults.update_account == Some(id) {
            return Err(StoreError::QueryFailed(format!("injected update failure for {id}")));
        }
        let row = self
            .view
            .values_mut()
            .find(|row| row.id == id)
            .ok_or(StoreError::RowNotFound)?;
        row.balance = balance.clone();
        self.writes.push(Write::Update(id, balance.clone()));
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.open = false;

        let mut inner = self.store.lock();
        if inner.faults.commit {
            return Err(StoreError::RolledBack("injected commit failure".to_string()));
        }
        for write in self.writes.drain(..) {
            match write {
                Write::Insert(key, row) => {
                    inner.accounts.insert(key, row);
                }
                Write::Update(id, balance) => {
                    if let Some(row) = inner.accounts.values_mut().find(|row| row.id == id) {
                        row.balance = balance;
                    }
                }
            }
        }
        inner.counters.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        if self.open {
            self.open = false;
            self.writes.clear();
            self.store.lock().counters.rollbacks += 1;
        }
        Ok(())
    }
}
