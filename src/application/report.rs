use crate::domain::account::AccountId;
use crate::domain::audit::AuditEntry;
use crate::domain::ports::{AuditReader, LedgerStore};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::LedgerError;

/// A transaction touching the reported account, with its audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub audit_logs: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub transactions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    /// Cents sent by the account in successful transfers.
    pub total_sent: i64,
    /// Cents received by the account in successful transfers.
    pub total_received: i64,
}

impl ReportSummary {
    pub fn net_flow(&self) -> i64 {
        self.total_received - self.total_sent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserReport {
    pub account: AccountId,
    /// Newest first.
    pub details: Vec<TransactionDetail>,
    pub summary: ReportSummary,
}

/// Collects every transaction where `account` is sender or receiver, joined
/// with the audit entries sharing its request id.
pub async fn user_report(
    ledger: &dyn LedgerStore,
    audit: &dyn AuditReader,
    account: AccountId,
) -> Result<UserReport, LedgerError> {
    let transactions = ledger.transactions_for_account(account).await?;

    let mut details = Vec::with_capacity(transactions.len());
    let mut summary = ReportSummary::default();
    for transaction in transactions {
        summary.transactions += 1;
        match transaction.status {
            TransactionStatus::Pending => summary.pending += 1,
            TransactionStatus::Failed => summary.failed += 1,
            TransactionStatus::Success => {
                summary.succeeded += 1;
                if transaction.from_account_id == account {
                    summary.total_sent += transaction.amount;
                } else {
                    summary.total_received += transaction.amount;
                }
            }
        }

        let audit_logs = audit.entries_for_request(&transaction.request_id).await?;
        details.push(TransactionDetail {
            transaction,
            audit_logs,
        });
    }

    Ok(UserReport {
        account,
        details,
        summary,
    })
}
