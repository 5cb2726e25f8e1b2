use crate::domain::account::AccountId;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

/// Opening balance of one account, in cents.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct AccountSeed {
    pub account: AccountId,
    pub balance: i64,
}

/// Reads opening balances from a CSV source with the header `account, balance`.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn seeds(self) -> impl Iterator<Item = Result<AccountSeed>> {
        self.reader.into_deserialize().map(|result| {
            let seed: AccountSeed = result?;
            if seed.balance < 0 {
                return Err(PaymentError::InvalidInput(format!(
                    "account {} cannot open with negative balance {}",
                    seed.account, seed.balance
                )));
            }
            Ok(seed)
        })
    }
}
