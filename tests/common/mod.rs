#![allow(dead_code)]

use async_trait::async_trait;
use paybridge::application::engine::TransferEngine;
use paybridge::config::EngineConfig;
use paybridge::domain::account::{Account, AccountId};
use paybridge::domain::audit::AuditEntry;
use paybridge::domain::ports::{AuditSink, LedgerScope, LedgerStore, LedgerStoreRef};
use paybridge::domain::transaction::{Transaction, TransactionId, TransactionStatus, TransferRequest};
use paybridge::error::LedgerError;
use paybridge::infrastructure::in_memory::{InMemoryAuditLog, InMemoryLedger};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;

pub async fn seeded_ledger(balances: &[(AccountId, i64)]) -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::in_memory());
    for (id, balance) in balances {
        ledger.open_account(*id, *balance).await.unwrap();
    }
    ledger
}

pub fn engine(ledger: LedgerStoreRef, audit: &InMemoryAuditLog, config: EngineConfig) -> Arc<TransferEngine> {
    Arc::new(TransferEngine::new(ledger, Arc::new(audit.clone()), config))
}

pub async fn balance(ledger: &dyn LedgerStore, id: AccountId) -> i64 {
    ledger.account(id).await.unwrap().unwrap().balance
}

pub async fn total_balance(ledger: &dyn LedgerStore) -> i128 {
    ledger
        .all_accounts()
        .await
        .unwrap()
        .iter()
        .map(|a| i128::from(a.balance))
        .sum()
}

/// Writes `lines` into a temporary file, one per line.
pub fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

pub fn request(id: &str, from: AccountId, to: AccountId, amount: i64) -> TransferRequest {
    TransferRequest::new(id, from, to, amount)
}

/// Ledger whose N-th scope (1-based, counted by `begin`) fails to commit.
///
/// The engine opens one scope per phase: PENDING insert, balance move, final
/// status. Targeting a scope number therefore targets a phase.
pub struct FailingCommitLedger {
    inner: LedgerStoreRef,
    fail_scope: usize,
    scopes: AtomicUsize,
}

impl FailingCommitLedger {
    pub fn new(inner: LedgerStoreRef, fail_scope: usize) -> Self {
        Self {
            inner,
            fail_scope,
            scopes: AtomicUsize::new(0),
        }
    }
}

struct FaultyScope {
    inner: Box<dyn LedgerScope>,
    fail_commit: bool,
}

#[async_trait]
impl LedgerScope for FaultyScope {
    async fn account_for_update(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.inner.account_for_update(id).await
    }

    async fn balance(&mut self, id: AccountId) -> Result<i64, LedgerError> {
        self.inner.balance(id).await
    }

    async fn set_balance(&mut self, id: AccountId, balance: i64) -> Result<(), LedgerError> {
        self.inner.set_balance(id, balance).await
    }

    async fn insert_transaction(
        &mut self,
        request: &TransferRequest,
    ) -> Result<TransactionId, LedgerError> {
        self.inner.insert_transaction(request).await
    }

    async fn record_balances(
        &mut self,
        id: TransactionId,
        from_balance: i64,
        to_balance: i64,
    ) -> Result<(), LedgerError> {
        self.inner.record_balances(id, from_balance, to_balance).await
    }

    async fn update_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        message: Option<String>,
    ) -> Result<(), LedgerError> {
        self.inner.update_transaction_status(id, status, message).await
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        if self.fail_commit {
            self.inner.rollback().await?;
            return Err(LedgerError::Internal("injected commit failure".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl LedgerStore for FailingCommitLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerScope>, LedgerError> {
        let scope = self.scopes.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyScope {
            inner,
            fail_commit: scope == self.fail_scope,
        }))
    }

    async fn open_account(&self, id: AccountId, balance: i64) -> Result<bool, LedgerError> {
        self.inner.open_account(id, balance).await
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.inner.account(id).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.inner.all_accounts().await
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.inner.transaction(id).await
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.recent_transactions(limit).await
    }

    async fn transactions_for_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.transactions_for_account(account).await
    }
}

/// Ledger whose `begin` waits for a permit, letting a test hold workers busy.
pub struct GatedLedger {
    inner: LedgerStoreRef,
    gate: Arc<Semaphore>,
}

impl GatedLedger {
    /// Starts closed.
    pub fn new(inner: LedgerStoreRef) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                inner,
                gate: gate.clone(),
            },
            gate,
        )
    }
}

#[async_trait]
impl LedgerStore for GatedLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerScope>, LedgerError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| LedgerError::Internal(e.to_string()))?;
        drop(permit);
        self.inner.begin().await
    }

    async fn open_account(&self, id: AccountId, balance: i64) -> Result<bool, LedgerError> {
        self.inner.open_account(id, balance).await
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.inner.account(id).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.inner.all_accounts().await
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.inner.transaction(id).await
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.recent_transactions(limit).await
    }

    async fn transactions_for_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.transactions_for_account(account).await
    }
}

/// Audit sink that takes `delay` before delegating each append.
pub struct SlowAuditSink {
    inner: InMemoryAuditLog,
    delay: Duration,
}

impl SlowAuditSink {
    pub fn new(inner: InMemoryAuditLog, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl AuditSink for SlowAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.append(entry).await
    }
}

/// Audit sink that always fails.
pub struct BrokenAuditSink;

#[async_trait]
impl AuditSink for BrokenAuditSink {
    async fn append(&self, _entry: AuditEntry) -> Result<(), LedgerError> {
        Err(LedgerError::Internal("audit storage unavailable".to_string()))
    }
}
