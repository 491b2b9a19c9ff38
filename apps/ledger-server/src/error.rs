//! Error types for the ledger server.

use ledger_core::{LedgerError, StatusCode};
use ledger_db::StoreError;
use tonic::{Code, Status};

use crate::config::ConfigError;
use crate::unsent::JournalError;

/// Ledger server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// The gRPC code closest in meaning to a ledger status code.
///
/// The ledger's wire enumeration is numbered differently from gRPC's
/// (`Unavailable` is 9 here, 14 there), so codes are matched by name.
pub fn grpc_code(code: StatusCode) -> Code {
    match code {
        StatusCode::Success => Code::Ok,
        StatusCode::Canceled => Code::Cancelled,
        StatusCode::InvalidArgument => Code::InvalidArgument,
        StatusCode::DeadlineExceeded => Code::DeadlineExceeded,
        StatusCode::NotFound => Code::NotFound,
        StatusCode::PermissionDenied => Code::PermissionDenied,
        StatusCode::ResourceExhausted => Code::ResourceExhausted,
        StatusCode::Unavailable | StatusCode::ShuttingDown => Code::Unavailable,
        StatusCode::Aborted => Code::Aborted,
        StatusCode::Unimplemented => Code::Unimplemented,
        StatusCode::Internal => Code::Internal,
        StatusCode::Unauthenticated => Code::Unauthenticated,
        StatusCode::Unknown
        | StatusCode::Reserved6
        | StatusCode::Reserved11
        | StatusCode::Reserved15 => Code::Unknown,
    }
}

impl From<ServerError> for Status {
    fn from(error: ServerError) -> Self {
        match error {
            ServerError::Ledger(e) => Status::new(grpc_code(e.code()), e.to_string()),
            ServerError::Store(e) => {
                let code = ledger_core::err_to_code(Some(e.kind()));
                Status::new(grpc_code(code), e.to_string())
            }
            ServerError::Config(e) => Status::internal(e.to_string()),
            ServerError::Journal(e) => Status::internal(e.to_string()),
            ServerError::Transport(e) => Status::internal(e.to_string()),
            ServerError::Io(e) => Status::internal(e.to_string()),
            ServerError::Internal(msg) => Status::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connecting_failures_map_by_meaning() {
        let status = Status::from(ServerError::from(LedgerError::Unavailable));
        assert_eq!(status.code(), Code::Unavailable);

        let status = Status::from(ServerError::from(LedgerError::Exhausted));
        assert_eq!(status.code(), Code::ResourceExhausted);

        let status = Status::from(ServerError::from(StoreError::RowNotFound));
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn test_grpc_code_is_total() {
        for value in 0..=16 {
            let code = StatusCode::from_i32(value).unwrap();
            let _ = grpc_code(code);
        }
        assert_eq!(grpc_code(StatusCode::Reserved11), Code::Unknown);
        assert_eq!(grpc_code(StatusCode::ShuttingDown), Code::Unavailable);
    }
}
