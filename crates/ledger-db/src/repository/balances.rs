//! # Balances Repository
//!
//! PostgreSQL implementation of the store seam over the `balances` relation.
//!
//! ## Transfer statement sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │  SELECT ... WHERE client_key = $from FOR UPDATE     (find_sender)       │
//! │  SELECT ... WHERE client_key = $to   FOR UPDATE     (find_receiver)     │
//! │  INSERT INTO balances ...   or   UPDATE ... receiver                    │
//! │  UPDATE balances SET balance = ... WHERE id = sender                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balances cross the wire as text (`balance::text`, `$n::numeric`) so that
//! no precision is lost to an intermediate fixed-width type.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{Connection, Transaction};
use std::time::Duration;
use tracing::{debug, warn};

use ledger_core::{AccountId, Money, NewAccount, ReceiverAccount, SenderAccount};

use crate::error::{StoreError, StoreResult};
use crate::store::{LedgerStore, LedgerTx, ReservedConnection};

// =============================================================================
// Store
// =============================================================================

/// Balance store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Creates a new PgLedgerStore.
    pub fn new(pool: PgPool) -> Self {
        PgLedgerStore { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Conn = PgReservedConnection;

    /// Reachability check that never waits on a saturated pool.
    ///
    /// Sessions hold their connection for the whole stream, so a pool with
    /// every slot reserved is busy, not unreachable. That case is left to
    /// [`acquire`](LedgerStore::acquire), which reports `PoolExhausted`.
    async fn ping(&self) -> StoreResult<()> {
        if let Some(mut conn) = self.pool.try_acquire() {
            conn.ping().await?;
            return Ok(());
        }

        if self.pool.size() >= self.pool.options().get_max_connections() {
            debug!(size = self.pool.size(), "Pool saturated, ping skipped");
            return Ok(());
        }

        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(()),
            // Lost the last free slot to another session in the meantime.
            Err(sqlx::Error::PoolTimedOut) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn acquire(&self, timeout: Duration) -> StoreResult<Self::Conn> {
        match tokio::time::timeout(timeout, self.pool.acquire()).await {
            Ok(Ok(conn)) => Ok(PgReservedConnection { conn }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(StoreError::PoolExhausted),
        }
    }
}

// =============================================================================
// Reserved connection
// =============================================================================

/// A pooled connection checked out for the lifetime of one session.
#[derive(Debug)]
pub struct PgReservedConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl ReservedConnection for PgReservedConnection {
    async fn begin<'a>(&'a mut self) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        let tx = Connection::begin(&mut *self.conn).await?;
        Ok(Box::new(PgLedgerTx { tx: Some(tx) }))
    }

    async fn close(self) {
        // Detached connections are not returned to the pool.
        if let Err(e) = self.conn.detach().close().await {
            warn!(error = %e, "Failed to close detached connection");
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(sqlx::FromRow)]
struct SenderRow {
    id: i64,
    balance: Option<String>,
    private_key: String,
    private_key_salt: String,
}

#[derive(sqlx::FromRow)]
struct ReceiverRow {
    id: i64,
    balance: Option<String>,
}

fn decode_balance(text: Option<&str>) -> StoreResult<Money> {
    let balance = Money::from_db(text);
    if balance.is_present() {
        Ok(balance)
    } else {
        Err(StoreError::decode("balance", format!("{:?} value", balance.presence())))
    }
}

/// An open PostgreSQL transaction. `None` once committed or rolled back.
pub struct PgLedgerTx<'c> {
    tx: Option<Transaction<'c, Postgres>>,
}

impl<'c> PgLedgerTx<'c> {
    fn open(&mut self) -> StoreResult<&mut Transaction<'c, Postgres>> {
        self.tx.as_mut().ok_or(StoreError::TxClosed)
    }
}

#[async_trait]
impl<'c> LedgerTx for PgLedgerTx<'c> {
    async fn find_sender(&mut self, client_key: &str) -> StoreResult<SenderAccount> {
        let tx = self.open()?;
        let row = sqlx::query_as::<_, SenderRow>(
            r#"
            SELECT id, balance::text AS balance, private_key, private_key_salt
            FROM balances
            WHERE client_key = $1
            FOR UPDATE
            "#,
        )
        .bind(client_key)
        .fetch_one(&mut **tx)
        .await?;

        Ok(SenderAccount {
            id: row.id,
            balance: decode_balance(row.balance.as_deref())?,
            credential: row.private_key,
            credential_salt: row.private_key_salt,
        })
    }

    async fn find_receiver(&mut self, client_key: &str) -> StoreResult<ReceiverAccount> {
        let tx = self.open()?;
        let row = sqlx::query_as::<_, ReceiverRow>(
            r#"
            SELECT id, balance::text AS balance
            FROM balances
            WHERE client_key = $1
            FOR UPDATE
            "#,
        )
        .bind(client_key)
        .fetch_one(&mut **tx)
        .await?;

        Ok(ReceiverAccount {
            id: row.id,
            balance: decode_balance(row.balance.as_deref())?,
        })
    }

    async fn insert_account(&mut self, account: &NewAccount) -> StoreResult<()> {
        debug!(client_key = %account.client_key, "Creating account");
        let tx = self.open()?;
        sqlx::query(
            r#"
            INSERT INTO balances (client_key, private_key, private_key_salt, balance)
            VALUES ($1, $2, $3, $4::numeric)
            "#,
        )
        .bind(&account.client_key)
        .bind(&account.credential)
        .bind(&account.credential_salt)
        .bind(account.balance.to_string())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn update_balance(&mut self, id: AccountId, balance: &Money) -> StoreResult<()> {
        let tx = self.open()?;
        let result = sqlx::query("UPDATE balances SET balance = $1::numeric WHERE id = $2")
            .bind(balance.to_string())
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(StoreError::TxClosed),
        }
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use ledger_core::{err_to_code, money, StatusCode};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_decode_balance_rejects_null_and_nan() {
        assert!(decode_balance(Some("12.3400000000")).is_ok());
        assert!(matches!(decode_balance(None), Err(StoreError::Decode { .. })));
        assert!(matches!(decode_balance(Some("NaN")), Err(StoreError::Decode { .. })));
    }

    // -------------------------------------------------------------------------
    // PostgreSQL round trips. Run with DATABASE_URL set and `--ignored`.
    // -------------------------------------------------------------------------

    async fn connect(max_connections: u32) -> Option<Database> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = DbConfig::new(url)
            .max_connections(max_connections)
            .min_connections(0)
            .connect_timeout(Duration::from_secs(1));
        let db = Database::new(&config).await.unwrap();
        db.run_migrations().await.unwrap();
        Some(db)
    }

    fn unique_key(tag: &str) -> String {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        format!("{tag}-{nanos}")
    }

    fn account(client_key: &str, balance: &str) -> NewAccount {
        NewAccount {
            client_key: client_key.to_string(),
            credential: "cred".to_string(),
            credential_salt: "salt".to_string(),
            balance: balance.parse().unwrap(),
        }
    }

    async fn seed(conn: &mut PgReservedConnection, accounts: &[NewAccount]) {
        let mut tx = conn.begin().await.unwrap();
        for acc in accounts {
            tx.insert_account(acc).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL (DATABASE_URL)
    async fn test_transfer_round_trip_keeps_numeric_scale() {
        let Some(db) = connect(2).await else { return };
        let store = db.balances();
        let (alice, bob) = (unique_key("alice"), unique_key("bob"));

        let mut conn = store.acquire(Duration::from_secs(1)).await.unwrap();
        seed(&mut conn, &[account(&alice, "10"), account(&bob, "0.5")]).await;

        let mut tx = conn.begin().await.unwrap();
        let sender = tx.find_sender(&alice).await.unwrap();
        let receiver = tx.find_receiver(&bob).await.unwrap();
        assert_eq!(sender.credential, "cred");
        assert_eq!(sender.credential_salt, "salt");

        let amount = Money::new(100_000_000_000i64, -10);
        let credited = money::add(&receiver.balance, &amount);
        let debited = money::subtract(&sender.balance.rescale(-10), &amount);
        tx.update_balance(receiver.id, &credited).await.unwrap();
        tx.update_balance(sender.id, &debited).await.unwrap();
        tx.commit().await.unwrap();
        // Rolling back a committed transaction is a no-op.
        tx.rollback().await.unwrap();
        assert!(matches!(tx.find_sender(&alice).await, Err(StoreError::TxClosed)));
        drop(tx);

        let mut tx = conn.begin().await.unwrap();
        assert_eq!(tx.find_sender(&alice).await.unwrap().balance.to_string(), "0.0000000000");
        assert_eq!(tx.find_receiver(&bob).await.unwrap().balance.to_string(), "10.5000000000");
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL (DATABASE_URL)
    async fn test_created_receiver_visible_only_after_commit() {
        let Some(db) = connect(2).await else { return };
        let store = db.balances();
        let carol = unique_key("carol");

        let mut conn = store.acquire(Duration::from_secs(1)).await.unwrap();

        let mut tx = conn.begin().await.unwrap();
        assert!(matches!(tx.find_receiver(&carol).await, Err(StoreError::RowNotFound)));
        tx.insert_account(&account(&carol, "3.25")).await.unwrap();
        tx.rollback().await.unwrap();
        drop(tx);

        let mut tx = conn.begin().await.unwrap();
        assert!(matches!(tx.find_receiver(&carol).await, Err(StoreError::RowNotFound)));
        tx.insert_account(&account(&carol, "3.25")).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let mut tx = conn.begin().await.unwrap();
        assert_eq!(tx.find_receiver(&carol).await.unwrap().balance.to_string(), "3.25");
        // Duplicate keys are rejected by the UNIQUE constraint.
        assert!(matches!(
            tx.insert_account(&account(&carol, "1")).await,
            Err(StoreError::QueryFailed(_))
        ));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL (DATABASE_URL)
    async fn test_nan_balance_is_decode_failure() {
        let Some(db) = connect(2).await else { return };
        let store = db.balances();
        let dave = unique_key("dave");

        let mut conn = store.acquire(Duration::from_secs(1)).await.unwrap();
        seed(&mut conn, &[account(&dave, "1")]).await;
        sqlx::query("UPDATE balances SET balance = 'NaN' WHERE client_key = $1")
            .bind(&dave)
            .execute(&mut *conn.conn)
            .await
            .unwrap();

        let mut tx = conn.begin().await.unwrap();
        let err = tx.find_sender(&dave).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert_eq!(err_to_code(Some(err.kind())), StatusCode::Unknown);
        assert!(matches!(tx.find_receiver(&dave).await, Err(StoreError::Decode { .. })));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL (DATABASE_URL)
    async fn test_close_does_not_return_connection_to_pool() {
        let Some(db) = connect(1).await else { return };
        let store = db.balances();

        let conn = store.acquire(Duration::from_secs(1)).await.unwrap();
        conn.close().await;
        assert_eq!(store.pool.num_idle(), 0);

        // The freed slot opens a fresh connection.
        let conn = store.acquire(Duration::from_secs(1)).await.unwrap();
        drop(conn);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL (DATABASE_URL)
    async fn test_saturated_pool_is_reachable_but_exhausted() {
        let Some(db) = connect(1).await else { return };
        let store = db.balances();
        store.ping().await.unwrap();

        let held = store.acquire(Duration::from_secs(1)).await.unwrap();
        store.ping().await.unwrap();

        let err = store.acquire(Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, StoreError::PoolExhausted));
        assert_eq!(err_to_code(Some(err.kind())), StatusCode::ResourceExhausted);
        drop(held);
    }
}
