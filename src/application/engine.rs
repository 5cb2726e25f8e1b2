use crate::config::EngineConfig;
use crate::domain::account::{Amount, lock_order};
use crate::domain::audit::{AuditEntry, AuditStatus};
use crate::domain::ports::{AuditSinkRef, LedgerStoreRef};
use crate::domain::transaction::{TransactionId, TransactionStatus, TransferRequest};
use crate::error::{LedgerError, TransferError};
use std::future::Future;
use tracing::{error, info, warn};

/// Executes transfer requests against the ledger.
///
/// Each transfer goes through three persistence boundaries: the PENDING row
/// is committed on its own, the balance mutation runs in a second scope, and
/// the terminal status is written in a third. Row locks are always taken in
/// ascending account id order, so concurrent transfers over overlapping
/// accounts cannot deadlock whatever their direction.
pub struct TransferEngine {
    ledger: LedgerStoreRef,
    audit: AuditSinkRef,
    config: EngineConfig,
}

impl TransferEngine {
    /// Creates a new `TransferEngine`.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The store holding accounts and transaction rows.
    /// * `audit` - Where terminal outcomes are recorded.
    /// * `config` - Deadlines for persistence and audit calls.
    pub fn new(ledger: LedgerStoreRef, audit: AuditSinkRef, config: EngineConfig) -> Self {
        Self {
            ledger,
            audit,
            config,
        }
    }

    /// Executes one transfer and records exactly one audit entry for it.
    ///
    /// Returns the id of the transaction row on success.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransactionId, TransferError> {
        info!(
            request_id = %request.request_id,
            from = request.from_id,
            to = request.to_id,
            amount = request.amount,
            "transfer started"
        );

        let outcome = self.execute(request).await;
        self.audit_outcome(request, &outcome).await;

        match &outcome {
            Ok(txn_id) => info!(
                request_id = %request.request_id,
                txn_id = *txn_id,
                "transfer successful"
            ),
            Err(e) if e.is_rejection() => warn!(
                request_id = %request.request_id,
                error = %e,
                "transfer rejected"
            ),
            Err(e) => error!(
                request_id = %request.request_id,
                error = %e,
                "transfer failed"
            ),
        }
        outcome
    }

    async fn execute(&self, request: &TransferRequest) -> Result<TransactionId, TransferError> {
        let amount = Amount::new(request.amount)?;
        if request.from_id == request.to_id {
            return Err(TransferError::SameAccount);
        }

        let txn_id = self.with_deadline(self.insert_pending(request)).await?;

        if let Err(err) = self
            .with_deadline(self.move_funds(txn_id, request, amount))
            .await
        {
            self.mark(txn_id, TransactionStatus::Failed, Some(err.to_string()))
                .await;
            return Err(err);
        }

        // Balances are committed at this point; a failed status write leaves
        // the row PENDING but does not undo the transfer.
        self.mark(txn_id, TransactionStatus::Success, None).await;
        Ok(txn_id)
    }

    async fn insert_pending(&self, request: &TransferRequest) -> Result<TransactionId, TransferError> {
        let mut scope = self.ledger.begin().await?;
        let txn_id = scope.insert_transaction(request).await?;
        scope.commit().await?;
        Ok(txn_id)
    }

    async fn move_funds(
        &self,
        txn_id: TransactionId,
        request: &TransferRequest,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let mut scope = self.ledger.begin().await?;

        let (first_id, second_id) = lock_order(request.from_id, request.to_id);
        let first = scope.account_for_update(first_id).await?;
        let second = scope.account_for_update(second_id).await?;

        let (sender, receiver) = if first.id == request.from_id {
            (first, second)
        } else {
            (second, first)
        };

        if !sender.can_cover(amount) {
            scope.rollback().await?;
            return Err(TransferError::InsufficientFunds);
        }

        let sender_balance = sender.balance - amount.cents();
        let receiver_balance = receiver
            .balance
            .checked_add(amount.cents())
            .ok_or(TransferError::Overflow)?;

        scope.set_balance(sender.id, sender_balance).await?;
        scope.set_balance(receiver.id, receiver_balance).await?;

        let before = i128::from(sender.balance) + i128::from(receiver.balance);
        let after =
            i128::from(scope.balance(sender.id).await?) + i128::from(scope.balance(receiver.id).await?);
        if before != after {
            return Err(LedgerError::Invariant(format!(
                "accounts {} and {} would hold {after} instead of {before}",
                sender.id, receiver.id
            ))
            .into());
        }

        scope
            .record_balances(txn_id, sender_balance, receiver_balance)
            .await?;
        scope.commit().await?;
        Ok(())
    }

    async fn mark(&self, txn_id: TransactionId, status: TransactionStatus, message: Option<String>) {
        let result = self
            .with_deadline(async {
                let mut scope = self.ledger.begin().await?;
                scope
                    .update_transaction_status(txn_id, status, message)
                    .await?;
                scope.commit().await?;
                Ok::<(), TransferError>(())
            })
            .await;

        if let Err(e) = result {
            error!(txn_id, status = %status, error = %e, "failed to update transaction status");
        }
    }

    async fn audit_outcome(
        &self,
        request: &TransferRequest,
        outcome: &Result<TransactionId, TransferError>,
    ) {
        let entry = match outcome {
            Ok(_) => AuditEntry::transfer(
                &request.request_id,
                AuditStatus::Success,
                "transfer completed",
            ),
            Err(e) => AuditEntry::transfer(&request.request_id, AuditStatus::Failed, e.to_string()),
        };

        match tokio::time::timeout(self.config.audit_timeout, self.audit.append(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                request_id = %request.request_id,
                error = %e,
                "audit append failed"
            ),
            Err(_) => warn!(
                request_id = %request.request_id,
                timeout = ?self.config.audit_timeout,
                "audit append timed out"
            ),
        }
    }

    /// Cancelling the inner future drops any open scope, which rolls it back.
    async fn with_deadline<T, F>(&self, operation: F) -> Result<T, TransferError>
    where
        F: Future<Output = Result<T, TransferError>>,
    {
        let deadline = self.config.transfer_timeout;
        tokio::time::timeout(deadline, operation)
            .await
            .unwrap_or(Err(TransferError::Timeout(deadline)))
    }
}
