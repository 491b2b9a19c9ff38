//! # Domain Types
//!
//! Rows of the `balances` relation as the transfer path sees them.
//!
//! ```text
//! balances
//! ┌────┬────────────┬─────────────┬──────────────────┬─────────────────┐
//! │ id │ client_key │ private_key │ private_key_salt │ balance NUMERIC │
//! └────┴────────────┴─────────────┴──────────────────┴─────────────────┘
//!   ▲        ▲
//!   │        └── external identifier, unique, immutable
//!   └── store-assigned
//! ```

use crate::money::Money;

/// Store-assigned account id.
pub type AccountId = i64;

/// An account loaded as the paying side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderAccount {
    pub id: AccountId,
    pub balance: Money,
    pub credential: String,
    pub credential_salt: String,
}

/// An account loaded as the receiving side. Credentials are not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverAccount {
    pub id: AccountId,
    pub balance: Money,
}

/// An account created lazily the first time funds are sent to its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub client_key: String,
    pub credential: String,
    pub credential_salt: String,
    pub balance: Money,
}
