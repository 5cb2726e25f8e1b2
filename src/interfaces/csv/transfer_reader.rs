use crate::domain::account::AccountId;
use crate::domain::transaction::TransferRequest;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct TransferRow {
    request_id: Option<String>,
    from: AccountId,
    to: AccountId,
    amount: i64,
}

impl From<TransferRow> for TransferRequest {
    fn from(row: TransferRow) -> Self {
        let request_id = row
            .request_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        TransferRequest::new(request_id, row.from, row.to, row.amount)
    }
}

/// Reads transfer requests from a CSV source with the header
/// `request_id, from, to, amount`.
///
/// Rows without a request id get a fresh UUID so every request can still be
/// correlated with its ledger row and audit entry.
pub struct TransferReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransferReader<R> {
    /// Creates a new `TransferReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    ///
    /// Amounts are not validated here; that is the engine's job.
    pub fn transfers(self) -> impl Iterator<Item = Result<TransferRequest>> {
        self.reader
            .into_deserialize::<TransferRow>()
            .map(|result| result.map(TransferRequest::from).map_err(PaymentError::from))
    }
}
