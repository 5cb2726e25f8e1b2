//! Storage adapters for the ledger and audit ports.

pub mod in_memory;
pub mod ledger;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

use crate::domain::ports::{AuditReaderRef, AuditSinkRef, LedgerStoreRef};
use crate::error::LedgerError;
use in_memory::{InMemoryAuditLog, InMemoryLedger};
use std::path::Path;
use std::sync::Arc;

/// The ledger and audit handles a process runs against.
#[derive(Clone)]
pub struct Storage {
    pub ledger: LedgerStoreRef,
    pub audit_sink: AuditSinkRef,
    pub audit_reader: AuditReaderRef,
}

impl Storage {
    pub fn in_memory() -> Self {
        let audit = InMemoryAuditLog::new();
        Self {
            ledger: Arc::new(InMemoryLedger::in_memory()),
            audit_sink: Arc::new(audit.clone()),
            audit_reader: Arc::new(audit),
        }
    }

    /// Opens persistent storage at `db_path` when given, in-memory storage otherwise.
    pub fn open(db_path: Option<&Path>) -> Result<Self, LedgerError> {
        match db_path {
            Some(path) => Self::open_persistent(path),
            None => Ok(Self::in_memory()),
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    fn open_persistent(path: &Path) -> Result<Self, LedgerError> {
        let (ledger, store) = self::rocksdb::RocksDBStore::open_ledger(path)?;
        tracing::info!(path = %path.display(), "opened RocksDB storage");
        let store = Arc::new(store);
        Ok(Self {
            ledger: Arc::new(ledger),
            audit_sink: store.clone(),
            audit_reader: store,
        })
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    fn open_persistent(path: &Path) -> Result<Self, LedgerError> {
        tracing::warn!(
            path = %path.display(),
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
        Ok(Self::in_memory())
    }
}
