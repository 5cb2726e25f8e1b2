use crate::domain::account::AccountId;
use crate::domain::transaction::{TransactionId, TransactionStatus};
use std::time::Duration;
use thiserror::Error;

/// Failures raised by a ledger or audit backend.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),
    #[error("transaction {id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error("row lock for account {0} is not held by this scope")]
    LockNotHeld(AccountId),
    #[error("balance invariant violated: {0}")]
    Invariant(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Outcome of a failed transfer.
///
/// `InvalidAmount` and `SameAccount` are raised before anything is persisted,
/// `InsufficientFunds` and `Overflow` after the rows are locked but before any
/// balance moves. Everything else is an infrastructure failure.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("cannot transfer to same account")]
    SameAccount,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("receiver balance would overflow")]
    Overflow,
    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl TransferError {
    /// True for validation and business-rule rejections, false for
    /// infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidAmount
                | TransferError::SameAccount
                | TransferError::InsufficientFunds
                | TransferError::Overflow
        )
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("queue capacity must be greater than zero")]
    InvalidCapacity,
    #[error("worker count must be greater than zero")]
    InvalidWorkerCount,
    #[error("worker pool already started")]
    AlreadyStarted,
    #[error("worker pool has been shut down")]
    ShutDown,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),
    #[error("Pool error: {0}")]
    PoolError(#[from] PoolError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T, E = PaymentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_distinguished_from_failures() {
        assert!(TransferError::InvalidAmount.is_rejection());
        assert!(TransferError::SameAccount.is_rejection());
        assert!(TransferError::InsufficientFunds.is_rejection());
        assert!(!TransferError::Timeout(Duration::from_millis(10)).is_rejection());
        assert!(!TransferError::Ledger(LedgerError::AccountNotFound(3)).is_rejection());
    }

    #[test]
    fn test_messages_match_ledger_diagnostics() {
        assert_eq!(
            TransferError::InsufficientFunds.to_string(),
            "insufficient funds"
        );
        assert_eq!(
            TransferError::Ledger(LedgerError::AccountNotFound(9)).to_string(),
            "ledger error: account 9 not found"
        );
    }
}
