use crate::domain::account::Account;
use crate::error::StoreError;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct AccountRow {
    user: u32,
    balance: String,
    blocked: bool,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            user: account.user,
            balance: account.balance.to_string(),
            blocked: account.is_blocked(),
        }
    }
}

/// Writes final account balances as `user,balance,blocked` CSV.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts<I>(&mut self, accounts: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = Account>,
    {
        for account in accounts {
            self.writer.serialize(AccountRow::from(&account))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
