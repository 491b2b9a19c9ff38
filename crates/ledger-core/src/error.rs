//! # Error Types
//!
//! The outcome taxonomy of the ledger: every transfer result, business
//! decline or system fault, is reduced to one [`StatusCode`].
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Outcome Taxonomy                                │
//! │                                                                         │
//! │  ledger-db                     ledger-core (this file)                  │
//! │  ─────────                     ───────────────────────                  │
//! │  sqlx::Error                                                            │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  StoreError ──kind()──►  ErrorKind ──err_to_code()──► StatusCode        │
//! │      │                      ▲                           (0..=16)        │
//! │      └────► LedgerError ────┘                                           │
//! │                                                                         │
//! │  The kind travels inside the error value. Codes are never looked up    │
//! │  by error identity, so wrapping or rebuilding an error cannot change   │
//! │  the code it produces.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use thiserror::Error;

// =============================================================================
// Status Codes
// =============================================================================

/// Wire-level status of a transfer, closed set `0..=16`.
///
/// | Code | Produced by |
/// |------|-------------|
/// | 0, 2, 3, 5, 7, 8, 9, 10 | [`err_to_code`] |
/// | 1, 4, 12, 13, 14, 16 | transport layer only |
/// | 6, 11, 15 | never produced |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    Canceled = 1,
    Unknown = 2,
    /// Transfer amount could not be parsed.
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    /// Sender does not exist.
    NotFound = 5,
    Reserved6 = 6,
    /// Bad credential or insufficient funds. Deliberately indistinguishable.
    PermissionDenied = 7,
    ResourceExhausted = 8,
    Unavailable = 9,
    Aborted = 10,
    Reserved11 = 11,
    Unimplemented = 12,
    Internal = 13,
    ShuttingDown = 14,
    Reserved15 = 15,
    Unauthenticated = 16,
}

impl StatusCode {
    /// Numeric value as carried on the wire.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Inverse of [`StatusCode::as_i32`]; `None` outside `0..=16`.
    pub fn from_i32(value: i32) -> Option<Self> {
        use StatusCode::*;
        Some(match value {
            0 => Success,
            1 => Canceled,
            2 => Unknown,
            3 => InvalidArgument,
            4 => DeadlineExceeded,
            5 => NotFound,
            6 => Reserved6,
            7 => PermissionDenied,
            8 => ResourceExhausted,
            9 => Unavailable,
            10 => Aborted,
            11 => Reserved11,
            12 => Unimplemented,
            13 => Internal,
            14 => ShuttingDown,
            15 => Reserved15,
            16 => Unauthenticated,
            _ => return None,
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_i32())
    }
}

// =============================================================================
// Error Kinds
// =============================================================================

/// Classification of every error the transfer path can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Store unreachable.
    Unavailable,
    /// No pooled connection within the acquisition deadline.
    Exhausted,
    /// Credential mismatch or insufficient funds.
    PermissionDenied,
    /// Amount text is not a decimal.
    InvalidArgument,
    /// Mutation or commit failed after validation passed.
    Aborted,
    /// Store passthrough: the row does not exist.
    RowNotFound,
    /// Store passthrough: transaction already closed or rolled back.
    TxClosed,
    /// Anything not classified above.
    Unknown,
}

/// Maps an error kind (or success) onto its status code.
///
/// Total and stateless: every kind has exactly one code, and codes 1, 4, 6,
/// 11 through 16 are never returned.
pub fn err_to_code(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        None => StatusCode::Success,
        Some(ErrorKind::RowNotFound) => StatusCode::NotFound,
        Some(ErrorKind::TxClosed) => StatusCode::Aborted,
        Some(ErrorKind::Exhausted) => StatusCode::ResourceExhausted,
        Some(ErrorKind::Unavailable) => StatusCode::Unavailable,
        Some(ErrorKind::PermissionDenied) => StatusCode::PermissionDenied,
        Some(ErrorKind::InvalidArgument) => StatusCode::InvalidArgument,
        Some(ErrorKind::Aborted) => StatusCode::Aborted,
        Some(ErrorKind::Unknown) => StatusCode::Unknown,
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors raised along the transfer path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("database is not available")]
    Unavailable,

    #[error("database is too busy")]
    Exhausted,

    /// The amount failed to parse. Carries enough context for the fault log.
    #[error("{from} failed transfer to {to}: couldn't convert `{amount}` to decimal number")]
    InvalidAmount {
        from: String,
        to: String,
        amount: String,
    },

    #[error("aborted transaction: {0}")]
    Aborted(String),

    /// An error surfaced by the store, keeping the store's classification.
    #[error("{message}")]
    Store { kind: ErrorKind, message: String },
}

impl LedgerError {
    /// The taxonomy kind carried by this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unavailable => ErrorKind::Unavailable,
            LedgerError::Exhausted => ErrorKind::Exhausted,
            LedgerError::InvalidAmount { .. } => ErrorKind::InvalidArgument,
            LedgerError::Aborted(_) => ErrorKind::Aborted,
            LedgerError::Store { kind, .. } => *kind,
        }
    }

    /// Shorthand for `err_to_code(Some(self.kind()))`.
    pub fn code(&self) -> StatusCode {
        err_to_code(Some(self.kind()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
