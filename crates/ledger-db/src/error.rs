//! # Database Error Types
//!
//! Error types for balance store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  PostgreSQL Error (sqlx::Error)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ▼  kind()                                                         │
//! │  ledger_core::ErrorKind ──► StatusCode on the TransferResponse         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use ledger_core::{ErrorKind, LedgerError};
use thiserror::Error;

/// Balance store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query returned no row.
    #[error("no rows in result set")]
    RowNotFound,

    /// The transaction was already committed or rolled back.
    #[error("tx is closed")]
    TxClosed,

    /// The server rolled the transaction back on its own.
    ///
    /// ## When This Occurs
    /// - Serialization failure or deadlock (SQLSTATE class 40)
    /// - Statement issued inside an already failed transaction (25P02)
    #[error("transaction rolled back by server: {0}")]
    RolledBack(String),

    /// Database could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Pool exhausted (no connection within the acquire deadline).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A column could not be read into its Rust type.
    #[error("Failed to decode {column}: {reason}")]
    Decode { column: String, reason: String },

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a Decode error for a named column.
    pub fn decode(column: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Decode {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Taxonomy classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::RowNotFound => ErrorKind::RowNotFound,
            StoreError::TxClosed | StoreError::RolledBack(_) => ErrorKind::TxClosed,
            StoreError::ConnectionFailed(_) => ErrorKind::Unavailable,
            StoreError::PoolExhausted => ErrorKind::Exhausted,
            StoreError::Decode { .. }
            | StoreError::QueryFailed(_)
            | StoreError::MigrationFailed(_)
            | StoreError::Internal(_) => ErrorKind::Unknown,
        }
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound      → StoreError::RowNotFound
/// sqlx::Error::Database         → SQLSTATE 40xxx / 25P02 → RolledBack
///                                 otherwise              → QueryFailed
/// sqlx::Error::PoolTimedOut     → StoreError::PoolExhausted
/// PoolClosed / Io / Tls         → StoreError::ConnectionFailed
/// ColumnDecode / Decode         → StoreError::Decode
/// Other                         → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::RowNotFound,

            sqlx::Error::Database(db_err) => {
                let rolled_back = db_err
                    .code()
                    .map(|code| code.starts_with("40") || code == "25P02")
                    .unwrap_or(false);
                if rolled_back {
                    StoreError::RolledBack(db_err.message().to_string())
                } else {
                    StoreError::QueryFailed(db_err.message().to_string())
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => StoreError::ConnectionFailed(e.to_string()),

            sqlx::Error::Tls(e) => StoreError::ConnectionFailed(e.to_string()),

            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::decode(index, source.to_string())
            }

            sqlx::Error::Decode(e) => StoreError::decode("row", e.to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Store {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::StatusCode;

    #[test]
    fn test_sqlx_classification() {
        assert_eq!(StoreError::from(sqlx::Error::RowNotFound).kind(), ErrorKind::RowNotFound);
        assert_eq!(StoreError::from(sqlx::Error::PoolTimedOut).kind(), ErrorKind::Exhausted);
        assert_eq!(StoreError::from(sqlx::Error::PoolClosed).kind(), ErrorKind::Unavailable);
        assert_eq!(
            StoreError::from(sqlx::Error::Protocol("bad frame".to_string())).kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_conversion_preserves_code() {
        let ledger: LedgerError = StoreError::RowNotFound.into();
        assert_eq!(ledger.code(), StatusCode::NotFound);

        let ledger: LedgerError = StoreError::TxClosed.into();
        assert_eq!(ledger.code(), StatusCode::Aborted);

        let ledger: LedgerError = StoreError::decode("balance", "NaN").into();
        assert_eq!(ledger.code(), StatusCode::Unknown);
        assert_eq!(ledger.to_string(), "Failed to decode balance: NaN");
    }
}
