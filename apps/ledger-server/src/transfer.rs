//! # Transfer Procedure
//!
//! Decides and applies one transfer on a connection reserved by the caller.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  from == to  or  amount == ""  ──────────────────────────► Success      │
//! │  parse amount ── fails ───────────────────────────────► InvalidArgument │
//! │                                                                         │
//! │  BEGIN ── fails ──────────────────────────────────────────► Unavailable │
//! │  │ load sender ── missing / undecodable ──────────► code of that error  │
//! │  │ funds at 10^-10 and credential ── either fails ──► PermissionDenied  │
//! │  │ load receiver ── missing ──► INSERT receiver                         │
//! │  │               └─ present ──► UPDATE receiver += amount               │
//! │  │ UPDATE sender -= amount          (any write fails ──► Aborted)       │
//! │  │ COMMIT ──────────────────────────────────────────► code of result    │
//! │  ROLLBACK (always; no-op after COMMIT)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Declined transfers are ordinary outcomes: they come back with a non-zero
//! status and no fault. A fault is attached only when something went wrong
//! that an operator should look at.

use std::cmp::Ordering;

use ledger_core::money::{self, Money};
use ledger_core::{
    err_to_code, CredentialScheme, LedgerError, NewAccount, StatusCode, COMPARISON_EXPONENT,
};
use ledger_db::{LedgerTx, ReservedConnection, StoreError};
use tracing::{debug, warn};

use crate::proto::{TransferRequest, TransferResponse};

/// Result of running one request through [`process`].
#[derive(Debug)]
pub struct Processed {
    pub response: TransferResponse,
    /// Set only for system faults, never for declined transfers.
    pub fault: Option<LedgerError>,
}

impl Processed {
    fn outcome(request: &TransferRequest, code: StatusCode) -> Self {
        Processed {
            response: TransferResponse::with_status(request.transfer_id.clone(), code),
            fault: None,
        }
    }

    fn fault(request: &TransferRequest, code: StatusCode, fault: impl Into<LedgerError>) -> Self {
        Processed {
            response: TransferResponse::with_status(request.transfer_id.clone(), code),
            fault: Some(fault.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }
}

/// Runs one transfer request to completion.
///
/// The connection must not be used concurrently by anything else for the
/// duration of the call.
pub async fn process<C>(
    request: &TransferRequest,
    conn: &mut C,
    credentials: &dyn CredentialScheme,
) -> Processed
where
    C: ReservedConnection,
{
    if request.from == request.to || request.amount.is_empty() {
        return Processed::outcome(request, StatusCode::Success);
    }

    let amount = match request.amount.parse::<Money>() {
        Ok(amount) if !amount.is_negative() => amount,
        _ => {
            let fault = LedgerError::InvalidAmount {
                from: request.from.clone(),
                to: request.to.clone(),
                amount: request.amount.clone(),
            };
            return Processed::fault(request, StatusCode::InvalidArgument, fault);
        }
    };

    let mut tx = match conn.begin().await {
        Ok(tx) => tx,
        Err(e) => return Processed::fault(request, StatusCode::Unavailable, e),
    };

    let processed = apply(request, &amount, tx.as_mut(), credentials).await;

    if let Err(e) = tx.rollback().await {
        warn!(transfer_id = %request.transfer_id, error = %e, "Rollback failed");
    }

    processed
}

async fn apply<'t>(
    request: &TransferRequest,
    amount: &Money,
    tx: &mut (dyn LedgerTx + 't),
    credentials: &dyn CredentialScheme,
) -> Processed {
    let sender = match tx.find_sender(&request.from).await {
        Ok(sender) => sender,
        Err(e @ (StoreError::RowNotFound | StoreError::Decode { .. })) => {
            debug!(transfer_id = %request.transfer_id, error = %e, "Sender not loaded");
            return Processed::outcome(request, err_to_code(Some(e.kind())));
        }
        Err(e) => return Processed::fault(request, err_to_code(Some(e.kind())), e),
    };

    // Known limitation: digits finer than 10^COMPARISON_EXPONENT are dropped
    // from both sides before anything is compared or written.
    let balance = sender.balance.rescale(COMPARISON_EXPONENT);
    let amount = amount.rescale(COMPARISON_EXPONENT);

    let covered = money::compare(&balance, &amount) != Ordering::Less;
    let authorized =
        credentials.verify(&request.private_key, &sender.credential, &sender.credential_salt);
    if !covered || !authorized {
        debug!(transfer_id = %request.transfer_id, "Transfer declined");
        return Processed::outcome(request, StatusCode::PermissionDenied);
    }

    let new_sender_balance = money::subtract(&balance, &amount);

    match tx.find_receiver(&request.to).await {
        Ok(receiver) => {
            let new_receiver_balance = money::add(&receiver.balance, &amount);
            if let Err(e) = tx.update_balance(receiver.id, &new_receiver_balance).await {
                return Processed::fault(request, StatusCode::Aborted, e);
            }
        }
        Err(StoreError::RowNotFound) => {
            let derived = match credentials.derive(&request.private_key) {
                Ok(derived) => derived,
                Err(e) => {
                    let fault = LedgerError::Aborted(e.to_string());
                    return Processed::fault(request, StatusCode::Aborted, fault);
                }
            };
            let account = NewAccount {
                client_key: request.to.clone(),
                credential: derived.credential,
                credential_salt: derived.salt,
                balance: amount.clone(),
            };
            if let Err(e) = tx.insert_account(&account).await {
                return Processed::fault(request, StatusCode::Aborted, e);
            }
        }
        Err(e) => return Processed::fault(request, StatusCode::Aborted, e),
    }

    if let Err(e) = tx.update_balance(sender.id, &new_sender_balance).await {
        return Processed::fault(request, StatusCode::Aborted, e);
    }

    match tx.commit().await {
        Ok(()) => Processed::outcome(request, StatusCode::Success),
        Err(e) => Processed::fault(request, err_to_code(Some(e.kind())), e),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
