use crate::error::TransferError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AccountId = u64;

/// A positive transfer amount in minor currency units (cents).
///
/// The only way to build one is through [`Amount::new`], so holding an
/// `Amount` means the value has already been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub fn new(cents: i64) -> Result<Self, TransferError> {
        if cents > 0 {
            Ok(Self(cents))
        } else {
            Err(TransferError::InvalidAmount)
        }
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = TransferError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Self::new(cents)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A ledger account. `balance` is held in cents.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: AccountId, balance: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a debit of `amount` keeps the balance non-negative.
    pub fn can_cover(&self, amount: Amount) -> bool {
        self.balance >= amount.cents()
    }
}

/// Order in which the row locks of a transfer pair must be taken.
///
/// Depends only on the two ids, never on direction, so every transfer
/// touching the same pair contends on the lower id first.
pub fn lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b { (a, b) } else { (b, a) }
}
