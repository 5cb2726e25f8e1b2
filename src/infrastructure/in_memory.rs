use super::ledger::{Ledger, RowStore, StagedWrites};
use crate::domain::account::{Account, AccountId};
use crate::domain::audit::AuditEntry;
use crate::domain::ports::{AuditReader, AuditSink};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::LedgerError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Ledger kept entirely in memory.
pub type InMemoryLedger = Ledger<MemoryRows>;

impl InMemoryLedger {
    pub fn in_memory() -> Self {
        Ledger::new(MemoryRows::default())
    }
}

#[derive(Default)]
struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    transactions: BTreeMap<TransactionId, Transaction>,
}

/// Row backend behind [`InMemoryLedger`].
///
/// A single `RwLock` guards both tables, so a commit is applied while no
/// reader can observe half of it.
#[derive(Default)]
pub struct MemoryRows {
    state: RwLock<MemoryState>,
    last_transaction_id: AtomicU64,
}

#[async_trait]
impl RowStore for MemoryRows {
    fn next_transaction_id(&self) -> TransactionId {
        self.last_transaction_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn insert_account_if_absent(&self, account: Account) -> Result<bool, LedgerError> {
        let mut state = self.state.write().await;
        match state.accounts.entry(account.id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(true)
            }
        }
    }

    async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.transactions.values().cloned().collect())
    }

    async fn apply(&self, writes: StagedWrites) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;

        let transactions = writes
            .referenced_transactions()
            .into_iter()
            .filter_map(|id| state.transactions.get(&id).map(|t| (id, t.clone())))
            .collect();
        let accounts = writes
            .referenced_accounts()
            .into_iter()
            .filter_map(|id| state.accounts.get(&id).map(|a| (id, a.clone())))
            .collect();

        let settled = writes.settle(transactions, accounts)?;
        for account in settled.accounts {
            state.accounts.insert(account.id, account);
        }
        for txn in settled.transactions {
            state.transactions.insert(txn.id, txn);
        }
        Ok(())
    }
}

/// A thread-safe in-memory audit log.
#[derive(Default, Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), LedgerError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[async_trait]
impl AuditReader for InMemoryAuditLog {
    async fn entries_for_request(&self, request_id: &str) -> Result<Vec<AuditEntry>, LedgerError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, LedgerError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
