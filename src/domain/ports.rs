use super::account::{Account, AccountId};
use super::audit::AuditEntry;
use super::transaction::{Transaction, TransactionId, TransactionStatus, TransferRequest};
use crate::error::LedgerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Persistent store of accounts and transaction rows.
///
/// All writes go through a [`LedgerScope`] obtained from [`LedgerStore::begin`].
/// The remaining methods are read-only views used by reporting.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerScope>, LedgerError>;

    /// Creates the account if it does not exist yet. Returns whether it was created.
    async fn open_account(&self, id: AccountId, balance: i64) -> Result<bool, LedgerError>;

    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;
    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError>;
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError>;
    /// Newest first.
    async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, LedgerError>;
    /// Rows where `account` is sender or receiver, newest first.
    async fn transactions_for_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transaction>, LedgerError>;
}

/// A transactional scope against the ledger.
///
/// Writes become visible only on [`commit`](LedgerScope::commit). Dropping a
/// scope without committing rolls it back and releases every row lock it
/// holds, which is also what happens when a deadline cancels the future
/// owning it.
#[async_trait]
pub trait LedgerScope: Send {
    /// Locks the account row for exclusive update until the scope ends.
    async fn account_for_update(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    /// Current balance as seen by this scope, including staged writes.
    async fn balance(&mut self, id: AccountId) -> Result<i64, LedgerError>;

    /// Requires the row lock taken by [`account_for_update`](LedgerScope::account_for_update).
    async fn set_balance(&mut self, id: AccountId, balance: i64) -> Result<(), LedgerError>;

    async fn insert_transaction(
        &mut self,
        request: &TransferRequest,
    ) -> Result<TransactionId, LedgerError>;

    async fn record_balances(
        &mut self,
        id: TransactionId,
        from_balance: i64,
        to_balance: i64,
    ) -> Result<(), LedgerError>;

    async fn update_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        message: Option<String>,
    ) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait AuditReader: Send + Sync {
    /// Oldest first.
    async fn entries_for_request(&self, request_id: &str) -> Result<Vec<AuditEntry>, LedgerError>;
    /// Newest first.
    async fn recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, LedgerError>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type AuditSinkRef = Arc<dyn AuditSink>;
pub type AuditReaderRef = Arc<dyn AuditReader>;
