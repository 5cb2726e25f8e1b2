//! Transactional ledger built on top of a plain row backend.
//!
//! Backends only know how to load rows and apply a batch of writes
//! atomically ([`RowStore`]). Row locking and write staging live here so that
//! every backend gets the same scope semantics.

use crate::domain::account::{Account, AccountId};
use crate::domain::ports::{LedgerScope, LedgerStore};
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus, TransferRequest};
use crate::error::LedgerError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Raw row access implemented by each storage backend.
#[async_trait]
pub trait RowStore: Send + Sync + 'static {
    fn next_transaction_id(&self) -> TransactionId;
    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;
    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError>;
    async fn insert_account_if_absent(&self, account: Account) -> Result<bool, LedgerError>;
    /// Ordered by id.
    async fn accounts(&self) -> Result<Vec<Account>, LedgerError>;
    /// Ordered by id.
    async fn transactions(&self) -> Result<Vec<Transaction>, LedgerError>;
    /// Applies every staged write or none of them.
    async fn apply(&self, writes: StagedWrites) -> Result<(), LedgerError>;
}

type RowTable = DashMap<AccountId, Arc<Mutex<()>>>;

/// One exclusive lock per account row.
///
/// Entries only live while some scope holds or waits for the row, so the
/// table stays bounded by the number of rows in contention.
#[derive(Default)]
pub struct RowLocks {
    rows: Arc<RowTable>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: AccountId) -> RowGuard {
        // The map guard must be gone before awaiting the row itself.
        let row = self.rows.entry(id).or_default().value().clone();
        let guard = row.lock_owned().await;
        RowGuard {
            id,
            rows: Arc::clone(&self.rows),
            guard: Some(guard),
        }
    }

    /// Rows currently held or awaited.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Exclusive hold on one account row. Dropping it releases the row and
/// forgets the entry once nobody else references it.
pub struct RowGuard {
    id: AccountId,
    rows: Arc<RowTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.rows
            .remove_if(&self.id, |_, row| Arc::strong_count(row) == 1);
    }
}

#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct BalanceSnapshot {
    pub id: TransactionId,
    pub from_balance: i64,
    pub to_balance: i64,
}

/// Writes buffered by a scope until commit.
#[derive(Debug, Default)]
pub struct StagedWrites {
    pub balances: BTreeMap<AccountId, i64>,
    pub inserts: Vec<Transaction>,
    pub snapshots: Vec<BalanceSnapshot>,
    pub status_updates: Vec<StatusUpdate>,
}

/// Final row images produced by [`StagedWrites::settle`].
#[derive(Debug, Default)]
pub struct Settled {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
            && self.inserts.is_empty()
            && self.snapshots.is_empty()
            && self.status_updates.is_empty()
    }

    pub fn referenced_accounts(&self) -> BTreeSet<AccountId> {
        self.balances.keys().copied().collect()
    }

    /// Existing transaction rows the staged writes modify.
    pub fn referenced_transactions(&self) -> BTreeSet<TransactionId> {
        let inserted: BTreeSet<_> = self.inserts.iter().map(|t| t.id).collect();
        self.snapshots
            .iter()
            .map(|s| s.id)
            .chain(self.status_updates.iter().map(|u| u.id))
            .filter(|id| !inserted.contains(id))
            .collect()
    }

    /// Folds the staged writes into copies of the current rows.
    ///
    /// Works on owned copies, so an error here leaves the backend untouched.
    pub fn settle(
        self,
        mut transactions: BTreeMap<TransactionId, Transaction>,
        mut accounts: BTreeMap<AccountId, Account>,
    ) -> Result<Settled, LedgerError> {
        let now = Utc::now();

        for txn in self.inserts {
            transactions.insert(txn.id, txn);
        }

        for snapshot in self.snapshots {
            let txn = transactions
                .get_mut(&snapshot.id)
                .ok_or(LedgerError::TransactionNotFound(snapshot.id))?;
            txn.from_balance = snapshot.from_balance;
            txn.to_balance = snapshot.to_balance;
            txn.updated_at = now;
        }

        for update in self.status_updates {
            let txn = transactions
                .get_mut(&update.id)
                .ok_or(LedgerError::TransactionNotFound(update.id))?;
            txn.transition(update.status, update.message)?;
        }

        for (id, balance) in self.balances {
            let account = accounts
                .get_mut(&id)
                .ok_or(LedgerError::AccountNotFound(id))?;
            account.balance = balance;
            account.updated_at = now;
        }

        Ok(Settled {
            accounts: accounts.into_values().collect(),
            transactions: transactions.into_values().collect(),
        })
    }
}

/// Scope handed out by [`Ledger::begin`].
pub struct StagedScope<S: RowStore> {
    rows: Arc<S>,
    locks: Arc<RowLocks>,
    held: HashMap<AccountId, RowGuard>,
    writes: StagedWrites,
}

impl<S: RowStore> StagedScope<S> {
    fn new(rows: Arc<S>, locks: Arc<RowLocks>) -> Self {
        Self {
            rows,
            locks,
            held: HashMap::new(),
            writes: StagedWrites::default(),
        }
    }

    async fn current_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let mut account = self
            .rows
            .load_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        if let Some(staged) = self.writes.balances.get(&id) {
            account.balance = *staged;
        }
        Ok(account)
    }
}

#[async_trait]
impl<S: RowStore> LedgerScope for StagedScope<S> {
    async fn account_for_update(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        if self.held.contains_key(&id) {
            return self.current_account(id).await;
        }
        // Unknown ids never get a lock entry.
        if self.rows.load_account(id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(id));
        }
        let guard = self.locks.acquire(id).await;
        self.held.insert(id, guard);
        match self.current_account(id).await {
            Ok(account) => Ok(account),
            Err(e) => {
                self.held.remove(&id);
                Err(e)
            }
        }
    }

    async fn balance(&mut self, id: AccountId) -> Result<i64, LedgerError> {
        Ok(self.current_account(id).await?.balance)
    }

    async fn set_balance(&mut self, id: AccountId, balance: i64) -> Result<(), LedgerError> {
        if !self.held.contains_key(&id) {
            return Err(LedgerError::LockNotHeld(id));
        }
        self.writes.balances.insert(id, balance);
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        request: &TransferRequest,
    ) -> Result<TransactionId, LedgerError> {
        let id = self.rows.next_transaction_id();
        self.writes.inserts.push(Transaction::pending(id, request));
        Ok(id)
    }

    async fn record_balances(
        &mut self,
        id: TransactionId,
        from_balance: i64,
        to_balance: i64,
    ) -> Result<(), LedgerError> {
        self.writes.snapshots.push(BalanceSnapshot {
            id,
            from_balance,
            to_balance,
        });
        Ok(())
    }

    async fn update_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        message: Option<String>,
    ) -> Result<(), LedgerError> {
        self.writes.status_updates.push(StatusUpdate {
            id,
            status,
            message,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let StagedScope {
            rows, writes, held, ..
        } = *self;
        if !writes.is_empty() {
            rows.apply(writes).await?;
        }
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// [`LedgerStore`] over any [`RowStore`] backend.
pub struct Ledger<S: RowStore> {
    rows: Arc<S>,
    locks: Arc<RowLocks>,
}

impl<S: RowStore> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: RowStore> Ledger<S> {
    pub fn new(rows: S) -> Self {
        Self {
            rows: Arc::new(rows),
            locks: Arc::new(RowLocks::new()),
        }
    }
}

#[async_trait]
impl<S: RowStore> LedgerStore for Ledger<S> {
    async fn begin(&self) -> Result<Box<dyn LedgerScope>, LedgerError> {
        Ok(Box::new(StagedScope::new(
            Arc::clone(&self.rows),
            Arc::clone(&self.locks),
        )))
    }

    async fn open_account(&self, id: AccountId, balance: i64) -> Result<bool, LedgerError> {
        self.rows
            .insert_account_if_absent(Account::new(id, balance))
            .await
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.rows.load_account(id).await
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.rows.accounts().await
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.rows.load_transaction(id).await
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions = self.rows.transactions().await?;
        transactions.reverse();
        transactions.truncate(limit);
        Ok(transactions)
    }

    async fn transactions_for_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions: Vec<_> = self
            .rows
            .transactions()
            .await?
            .into_iter()
            .filter(|t| t.involves(account))
            .collect();
        transactions.reverse();
        Ok(transactions)
    }
}
