use super::account::AccountId;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the transfer engine. Not persisted as such; it seeds a
/// [`Transaction`] row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TransferRequest {
    pub request_id: String,
    pub from_id: AccountId,
    pub to_id: AccountId,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(request_id: impl Into<String>, from_id: AccountId, to_id: AccountId, amount: i64) -> Self {
        Self {
            request_id: request_id.into(),
            from_id,
            to_id,
            amount,
        }
    }
}

/// Ledger record of one transfer attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub request_id: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub status: TransactionStatus,
    pub error_message: Option<String>,
    /// Sender balance right after settlement, 0 until then.
    pub from_balance: i64,
    /// Receiver balance right after settlement, 0 until then.
    pub to_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn pending(id: TransactionId, request: &TransferRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            request_id: request.request_id.clone(),
            from_account_id: request.from_id,
            to_account_id: request.to_id,
            amount: request.amount,
            status: TransactionStatus::Pending,
            error_message: None,
            from_balance: 0,
            to_balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, account: AccountId) -> bool {
        self.from_account_id == account || self.to_account_id == account
    }

    /// Moves the row out of PENDING. Terminal rows never change again.
    pub fn transition(
        &mut self,
        status: TransactionStatus,
        message: Option<String>,
    ) -> Result<(), LedgerError> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(LedgerError::InvalidStateTransition {
                id: self.id,
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.error_message = message;
        self.updated_at = Utc::now();
        Ok(())
    }
}
