use crate::application::claim::ClaimRequest;
use crate::application::engine::Marketplace;
use crate::domain::account::Account;
use crate::domain::order::{Order, OrderId, UserId};
use crate::error::{MarketError, Result, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Account,
    Deposit,
    Block,
    Unblock,
    Order,
    Claim,
    Complete,
    Cancel,
    Reactivate,
}

/// One row of the command stream.
///
/// Columns: `type,user,order,amount,date,at,key,name,phone,message`.
/// Which columns matter depends on `type`; the rest may be left empty.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub r#type: CommandType,
    pub user: UserId,
    #[serde(default)]
    pub order: Option<OrderId>,
    /// Deposit amount, order budget, or opening balance.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Order deadline.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Clock for this command; wall clock when empty.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Claim message or order description.
    #[serde(default)]
    pub message: Option<String>,
}

impl Command {
    fn order_id(&self) -> Result<OrderId> {
        self.order
            .ok_or_else(|| MarketError::Validation(format!("{:?} requires an order", self.r#type)))
    }

    /// Applies the command to the marketplace.
    pub async fn dispatch(self, market: &Marketplace) -> Result<()> {
        match self.r#type {
            CommandType::Account => {
                let mut account = Account::new(
                    self.user,
                    self.name.clone().unwrap_or_default(),
                    self.phone.clone().unwrap_or_default(),
                );
                if let Some(balance) = self.amount {
                    account = account.with_balance(balance);
                }
                market.register_account(account).await
            }
            CommandType::Deposit => {
                let amount = self
                    .amount
                    .ok_or_else(|| MarketError::Validation("deposit requires an amount".into()))?;
                market.deposit(self.user, amount).await.map(|_| ())
            }
            CommandType::Block => market.block(self.user).await,
            CommandType::Unblock => market.unblock(self.user).await,
            CommandType::Order => {
                let id = self.order_id()?;
                let deadline = self
                    .date
                    .ok_or_else(|| MarketError::Validation("order requires a deadline".into()))?;
                let mut order = Order::new(id, self.user, deadline)
                    .with_phone(self.phone.unwrap_or_default())
                    .with_description(self.message.unwrap_or_default());
                order.budget = self.amount;
                market.post_order(order).await
            }
            CommandType::Claim => {
                let mut request = ClaimRequest::new(self.order_id()?, self.user);
                request.message = self.message;
                request.idempotency_key = self.key;
                let now = self.at.unwrap_or_else(Utc::now);
                market.submit_claim_at(request, now).await.map(|_| ())
            }
            CommandType::Complete => market
                .complete_order(self.user, self.order_id()?)
                .await
                .map(|_| ()),
            CommandType::Cancel => market
                .cancel_order(self.user, self.order_id()?)
                .await
                .map(|_| ()),
            CommandType::Reactivate => market
                .reactivate_order(self.user, self.order_id()?)
                .await
                .map(|_| ()),
        }
    }
}

/// Reads commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Command>`.
/// It handles whitespace trimming and short rows automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = std::result::Result<Command, StoreError>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(StoreError::from))
    }
}
