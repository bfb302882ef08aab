#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use orderclaim::application::engine::Marketplace;
use orderclaim::config::MarketConfig;
use orderclaim::domain::account::Account;
use orderclaim::domain::order::{Order, OrderId, UserId};
use orderclaim::infrastructure::in_memory::InMemoryLedger;
use rust_decimal::Decimal;

pub const CUSTOMER: UserId = 1;

/// Fixed clock for claims; orders posted by [`post_order`] expire well after it.
pub fn t0() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2026, 6, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn deadline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
}

/// An in-memory marketplace with one customer account already registered.
pub async fn market_with(config: MarketConfig) -> Marketplace {
    let market = Marketplace::new(Box::new(InMemoryLedger::new()), config);
    market
        .register_account(Account::new(CUSTOMER, "Aida Customer", "+996555000001"))
        .await
        .unwrap();
    market
}

pub async fn market() -> Marketplace {
    market_with(MarketConfig::default()).await
}

pub async fn executor(market: &Marketplace, user: UserId, balance: Decimal) {
    market
        .register_account(
            Account::new(user, format!("Executor {user}"), "").with_balance(balance),
        )
        .await
        .unwrap();
}

pub async fn post_order(market: &Marketplace, id: OrderId, budget: Decimal) {
    market
        .post_order(Order::new(id, CUSTOMER, deadline()).with_budget(budget))
        .await
        .unwrap();
}
