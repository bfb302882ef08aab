use crate::domain::order::UserId;
use crate::error::MarketError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Fee currency held by an account.
///
/// Displays normalized (`100`, `0.5`), which is also how balances are
/// written out.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive amount to credit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, MarketError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(MarketError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn credit(self, amount: Amount) -> Self {
        Self(self.0 + amount.0)
    }

    /// `None` when `fee` is more than what is held.
    pub fn checked_debit(self, fee: Balance) -> Option<Self> {
        (self.0 >= fee.0).then(|| Self(self.0 - fee.0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Blocked,
}

/// A marketplace user as seen by the fee ledger.
///
/// The same record serves customers (who post orders and expose contact
/// details to winning executors) and executors (who pay fees to claim).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub user: UserId,
    pub full_name: String,
    pub phone: String,
    /// Spendable fee currency. Never negative.
    pub balance: Balance,
    #[serde(
        rename = "blocked",
        serialize_with = "serialize_blocked",
        deserialize_with = "deserialize_blocked"
    )]
    pub status: AccountStatus,
}

fn serialize_blocked<S>(status: &AccountStatus, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_bool(*status == AccountStatus::Blocked)
}

fn deserialize_blocked<'de, D>(deserializer: D) -> Result<AccountStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let blocked = bool::deserialize(deserializer)?;
    if blocked {
        Ok(AccountStatus::Blocked)
    } else {
        Ok(AccountStatus::Active)
    }
}

impl Account {
    pub fn new(user: UserId, full_name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            user,
            full_name: full_name.into(),
            phone: phone.into(),
            balance: Balance::ZERO,
            status: AccountStatus::Active,
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Balance::new(balance);
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.status == AccountStatus::Blocked
    }

    /// Credits funds to the balance.
    pub fn deposit(&mut self, amount: Amount) {
        self.balance = self.balance.credit(amount);
    }

    /// How much is missing to cover `fee`, if anything.
    pub fn shortfall(&self, fee: Balance) -> Option<Balance> {
        (self.balance < fee).then(|| Balance(fee.0 - self.balance.0))
    }

    /// Debits a fee, refusing to take the balance below zero.
    pub fn debit(&mut self, fee: Balance) -> Result<(), MarketError> {
        match self.balance.checked_debit(fee) {
            Some(rest) => {
                self.balance = rest;
                Ok(())
            }
            None => Err(MarketError::InsufficientFunds {
                required: fee,
                available: self.balance,
                shortfall: Balance(fee.0 - self.balance.0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_checked_debit() {
        let held = Balance::new(dec!(10.0));
        assert_eq!(held.checked_debit(Balance::new(dec!(4))), Some(Balance::new(dec!(6))));
        assert_eq!(held.checked_debit(held), Some(Balance::ZERO));
        assert_eq!(held.checked_debit(Balance::new(dec!(10.01))), None);
    }

    #[test]
    fn test_balance_display_is_normalized() {
        assert_eq!(Balance::new(dec!(100.00)).to_string(), "100");
        assert_eq!(Balance::new(dec!(0.50)).to_string(), "0.5");
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(MarketError::Validation(_))
        ));
    }

    #[test]
    fn test_account_deposit() {
        let mut account = Account::new(1, "Aida", "+996555000001");
        account.deposit(Amount::new(dec!(10.0)).unwrap());
        assert_eq!(account.balance, Balance::new(dec!(10.0)));
    }

    #[test]
    fn test_debit_to_exactly_zero() {
        let mut account = Account::new(1, "Aida", "").with_balance(dec!(100));
        account.debit(Balance::new(dec!(100))).unwrap();
        assert_eq!(account.balance, Balance::ZERO);
    }

    #[test]
    fn test_debit_insufficient_leaves_balance() {
        let mut account = Account::new(1, "Aida", "").with_balance(dec!(40));
        let result = account.debit(Balance::new(dec!(50)));
        match result {
            Err(MarketError::InsufficientFunds { shortfall, .. }) => {
                assert_eq!(shortfall, Balance::new(dec!(10)));
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        assert_eq!(account.balance, Balance::new(dec!(40)));
    }

    #[test]
    fn test_blocked_serializes_as_bool() {
        let mut account = Account::new(7, "Bek", "");
        account.status = AccountStatus::Blocked;
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["blocked"], serde_json::Value::Bool(true));

        let back: Account = serde_json::from_value(json).unwrap();
        assert!(back.is_blocked());
    }
}
