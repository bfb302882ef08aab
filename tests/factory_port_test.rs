use chrono::NaiveDate;
use orderclaim::application::claim::ClaimRequest;
use orderclaim::application::engine::Marketplace;
use orderclaim::config::MarketConfig;
use orderclaim::domain::account::Account;
use orderclaim::domain::order::Order;
use orderclaim::domain::ports::{LedgerStoreBox, LedgerStoreFactory, LockScope};
use orderclaim::infrastructure::in_memory::InMemoryLedger;
use rust_decimal_macros::dec;

fn factory() -> LedgerStoreFactory {
    Box::new(|| Box::new(InMemoryLedger::new()) as LedgerStoreBox)
}

#[tokio::test]
async fn test_factory_instantiation() {
    let store = factory()();

    let mut tx = store.begin(LockScope::new().account(1)).await.unwrap();
    tx.put_account(Account::new(1, "Aida", "").with_balance(dec!(10)));
    tx.commit().await.unwrap();

    let retrieved = store.account(1).await.unwrap().unwrap();
    assert_eq!(retrieved.balance.value(), dec!(10));
}

#[tokio::test]
async fn test_factory_stores_are_independent() {
    let factory = factory();
    let first = factory();
    let second = factory();

    let mut tx = first.begin(LockScope::new().account(1)).await.unwrap();
    tx.put_account(Account::new(1, "Aida", ""));
    tx.commit().await.unwrap();

    assert!(first.account(1).await.unwrap().is_some());
    assert!(second.account(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let store = factory()();
    {
        let mut tx = store.begin(LockScope::new().account(1)).await.unwrap();
        tx.put_account(Account::new(1, "Aida", ""));
    }
    assert!(store.account(1).await.unwrap().is_none());

    // The locks were released with the dropped transaction.
    let tx = store.begin(LockScope::new().account(1)).await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_marketplace_in_task() {
    let market = Marketplace::new(factory()(), MarketConfig::default());

    let handle = tokio::spawn(async move {
        market
            .register_account(Account::new(1, "Aida", "+996555000001"))
            .await
            .unwrap();
        market
            .register_account(Account::new(2, "Bek", "").with_balance(dec!(60)))
            .await
            .unwrap();
        let deadline = NaiveDate::from_ymd_opt(2099, 1, 1).unwrap();
        market
            .post_order(Order::new(10, 1, deadline))
            .await
            .unwrap();
        market.submit_claim(ClaimRequest::new(10, 2)).await.unwrap()
    });

    let receipt = handle.await.unwrap();
    // No budget means the low fee.
    assert_eq!(receipt.fee_charged.value(), dec!(50));
}
