//! Generated protobuf and gRPC code for package `ledger.v1`.

#![allow(clippy::all)]

tonic::include_proto!("ledger.v1");

use ledger_core::StatusCode;

impl From<StatusCode> for TransferStatus {
    fn from(code: StatusCode) -> Self {
        // Both enumerations share the same closed 0..=16 numbering.
        TransferStatus::try_from(code.as_i32()).unwrap_or(TransferStatus::Unknown)
    }
}

impl TransferResponse {
    /// Builds a response echoing `transfer_id`.
    pub fn with_status(transfer_id: impl Into<String>, code: StatusCode) -> Self {
        TransferResponse {
            status_code: TransferStatus::from(code) as i32,
            transfer_id: transfer_id.into(),
        }
    }

    /// The status as the ledger's own enumeration.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_i32(self.status_code).unwrap_or(StatusCode::Unknown)
    }
}
