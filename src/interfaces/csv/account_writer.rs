use crate::domain::account::{Account, AccountId};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow {
    account: AccountId,
    balance: i64,
}

/// Writes final account balances as `account,balance` CSV.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts<I>(&mut self, accounts: I) -> Result<()>
    where
        I: IntoIterator<Item = Account>,
    {
        for account in accounts {
            self.writer.serialize(BalanceRow {
                account: account.id,
                balance: account.balance,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
