//! # ledger-core: Pure Business Logic for the Ledger Server
//!
//! This crate contains the arithmetic and the outcome taxonomy that every
//! transfer flows through, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Server Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              ledger-server (tonic, Transfer stream)             │   │
//! │  │     Session loop ──► Transfer procedure ──► TransferResponse    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ledger-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌─────────┐  │   │
//! │  │   │   money   │  │   error   │  │ credentials │  │  types  │  │   │
//! │  │   │  compare  │  │ StatusCode│  │   Argon2    │  │ Account │  │   │
//! │  │   │ add / sub │  │ err_to_code│ │   verify    │  │ Request │  │   │
//! │  │   └───────────┘  └───────────┘  └─────────────┘  └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    ledger-db (Database Layer)                   │   │
//! │  │             PostgreSQL balances, store seam, migrations         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Arbitrary precision decimal money with explicit exponents
//! - [`error`] - Status codes, error kinds and the `err_to_code` mapping
//! - [`credentials`] - Injected credential hashing capability
//! - [`types`] - Account and transfer records
//!
//! ## Example Usage
//!
//! ```rust
//! use ledger_core::money::{self, Money};
//! use std::cmp::Ordering;
//!
//! let balance: Money = "10.00".parse().unwrap();
//! let amount: Money = "10.01".parse().unwrap();
//!
//! assert_eq!(money::compare(&balance, &amount), Ordering::Less);
//! assert_eq!(money::add(&balance, &amount).to_string(), "20.01");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credentials;
pub mod error;
pub mod money;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use credentials::{Argon2Scheme, CredentialScheme, DerivedCredential};
pub use error::{err_to_code, ErrorKind, LedgerError, StatusCode};
pub use money::{Money, Presence};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Exponent both operands are brought to before the funds check.
///
/// ## Known limitation
/// Amounts or balances carrying more than ten fractional digits are truncated
/// to ten by this rescale. The stored column's own scale is not consulted.
pub const COMPARISON_EXPONENT: i32 = -10;
