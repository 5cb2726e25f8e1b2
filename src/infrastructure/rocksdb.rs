use super::ledger::{Ledger, RowStore, StagedWrites};
use crate::domain::account::{Account, AccountId};
use crate::domain::audit::AuditEntry;
use crate::domain::ports::{AuditReader, AuditSink};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::LedgerError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for storing account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing transaction rows.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for the append-only audit trail.
pub const CF_AUDIT_LOGS: &str = "audit_logs";

/// Ledger persisted in RocksDB.
pub type RocksDbLedger = Ledger<RocksDBStore>;

/// A persistent store implementation using RocksDB.
///
/// Accounts, transactions and audit entries live in separate Column Families,
/// keyed by big-endian `u64` ids so that iteration follows id order. Values
/// are JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    last_transaction_id: Arc<AtomicU64>,
    last_audit_id: Arc<AtomicU64>,
    // Serializes read-settle-write so two commits never settle from the same snapshot.
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Id counters resume after the highest key already stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ACCOUNTS, CF_TRANSACTIONS, CF_AUDIT_LOGS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let store = Self {
            db: Arc::new(db),
            last_transaction_id: Arc::new(AtomicU64::new(0)),
            last_audit_id: Arc::new(AtomicU64::new(0)),
            commit_lock: Arc::new(Mutex::new(())),
        };
        store
            .last_transaction_id
            .store(store.last_key(CF_TRANSACTIONS)?, Ordering::SeqCst);
        store
            .last_audit_id
            .store(store.last_key(CF_AUDIT_LOGS)?, Ordering::SeqCst);
        Ok(store)
    }

    /// Opens the store and wraps it as a ledger plus an audit log sharing the same DB.
    pub fn open_ledger<P: AsRef<Path>>(path: P) -> Result<(RocksDbLedger, Self), LedgerError> {
        let store = Self::open(path)?;
        Ok((Ledger::new(store.clone()), store))
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, LedgerError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Internal(format!("column family {name} not found")))
    }

    fn last_key(&self, name: &str) -> Result<u64, LedgerError> {
        let cf = self.cf(name)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                decode_key(&key)
            }
            None => Ok(0),
        }
    }

    fn get<T: DeserializeOwned>(&self, name: &str, id: u64) -> Result<Option<T>, LedgerError> {
        let cf = self.cf(name)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, LedgerError> {
        let cf = self.cf(name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn put<T: Serialize>(&self, name: &str, id: u64, value: &T) -> Result<(), LedgerError> {
        let cf = self.cf(name)?;
        self.db.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }
}

fn decode_key(key: &[u8]) -> Result<u64, LedgerError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LedgerError::Internal(format!("malformed key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl RowStore for RocksDBStore {
    fn next_transaction_id(&self) -> TransactionId {
        self.last_transaction_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.get(CF_ACCOUNTS, id)
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.get(CF_TRANSACTIONS, id)
    }

    async fn insert_account_if_absent(&self, account: Account) -> Result<bool, LedgerError> {
        let _commit = self.commit_lock.lock().await;
        if self.get::<Account>(CF_ACCOUNTS, account.id)?.is_some() {
            return Ok(false);
        }
        self.put(CF_ACCOUNTS, account.id, &account)?;
        Ok(true)
    }

    async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.scan(CF_ACCOUNTS)
    }

    async fn transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        self.scan(CF_TRANSACTIONS)
    }

    async fn apply(&self, writes: StagedWrites) -> Result<(), LedgerError> {
        let _commit = self.commit_lock.lock().await;

        let mut transactions = BTreeMap::new();
        for id in writes.referenced_transactions() {
            if let Some(txn) = self.get::<Transaction>(CF_TRANSACTIONS, id)? {
                transactions.insert(id, txn);
            }
        }
        let mut accounts = BTreeMap::new();
        for id in writes.referenced_accounts() {
            if let Some(account) = self.get::<Account>(CF_ACCOUNTS, id)? {
                accounts.insert(id, account);
            }
        }

        let settled = writes.settle(transactions, accounts)?;

        let mut batch = WriteBatch::default();
        let accounts_cf = self.cf(CF_ACCOUNTS)?;
        for account in &settled.accounts {
            batch.put_cf(accounts_cf, account.id.to_be_bytes(), serde_json::to_vec(account)?);
        }
        let transactions_cf = self.cf(CF_TRANSACTIONS)?;
        for txn in &settled.transactions {
            batch.put_cf(transactions_cf, txn.id.to_be_bytes(), serde_json::to_vec(txn)?);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for RocksDBStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), LedgerError> {
        let id = self.last_audit_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.put(CF_AUDIT_LOGS, id, &entry)
    }
}

#[async_trait]
impl AuditReader for RocksDBStore {
    async fn entries_for_request(&self, request_id: &str) -> Result<Vec<AuditEntry>, LedgerError> {
        Ok(self
            .scan::<AuditEntry>(CF_AUDIT_LOGS)?
            .into_iter()
            .filter(|e| e.request_id == request_id)
            .collect())
    }

    async fn recent_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, LedgerError> {
        let mut entries = self.scan::<AuditEntry>(CF_AUDIT_LOGS)?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditStatus;
    use crate::domain::ports::LedgerStore;
    use crate::domain::transaction::{TransactionStatus, TransferRequest};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.db.cf_handle(CF_TRANSACTIONS).is_some());
        assert!(store.db.cf_handle(CF_AUDIT_LOGS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_scope_commit() {
        let dir = tempdir().unwrap();
        let (ledger, _) = RocksDBStore::open_ledger(dir.path()).unwrap();
        ledger.open_account(1, 1000).await.unwrap();
        ledger.open_account(2, 500).await.unwrap();

        let mut scope = ledger.begin().await.unwrap();
        let id = scope
            .insert_transaction(&TransferRequest::new("r1", 1, 2, 300))
            .await
            .unwrap();
        scope.account_for_update(1).await.unwrap();
        scope.account_for_update(2).await.unwrap();
        scope.set_balance(1, 700).await.unwrap();
        scope.set_balance(2, 800).await.unwrap();
        scope.commit().await.unwrap();

        assert_eq!(ledger.account(1).await.unwrap().unwrap().balance, 700);
        assert_eq!(ledger.account(2).await.unwrap().unwrap().balance, 800);
        let row = ledger.transaction(id).await.unwrap().unwrap();
        assert_eq!(row.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_rocksdb_counters_resume_after_reopen() {
        let dir = tempdir().unwrap();
        {
            let (ledger, audit) = RocksDBStore::open_ledger(dir.path()).unwrap();
            let mut scope = ledger.begin().await.unwrap();
            scope
                .insert_transaction(&TransferRequest::new("r1", 1, 2, 1))
                .await
                .unwrap();
            scope.commit().await.unwrap();
            audit
                .append(AuditEntry::transfer("r1", AuditStatus::Success, "transfer completed"))
                .await
                .unwrap();
        }

        let (ledger, audit) = RocksDBStore::open_ledger(dir.path()).unwrap();
        let mut scope = ledger.begin().await.unwrap();
        let id = scope
            .insert_transaction(&TransferRequest::new("r2", 1, 2, 1))
            .await
            .unwrap();
        assert_eq!(id, 2);
        scope.commit().await.unwrap();

        audit
            .append(AuditEntry::transfer("r2", AuditStatus::Failed, "insufficient funds"))
            .await
            .unwrap();
        let recent = audit.recent_entries(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].request_id, "r2");
        assert_eq!(audit.entries_for_request("r1").await.unwrap().len(), 1);
    }
}
