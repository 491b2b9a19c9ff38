//! Repositories over the PostgreSQL schema.

pub mod balances;

pub use balances::{PgLedgerStore, PgLedgerTx, PgReservedConnection};
