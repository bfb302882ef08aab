mod common;

use chrono::Duration;
use common::{CUSTOMER, executor, market, post_order, t0};
use orderclaim::application::claim::ClaimRequest;
use orderclaim::error::MarketError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_high_budget_claim_drains_exact_balance() {
    let market = market().await;
    executor(&market, 2, dec!(100)).await;
    post_order(&market, 10, dec!(15000)).await;

    let receipt = market
        .submit_claim_at(ClaimRequest::new(10, 2).with_message("on my way"), t0())
        .await
        .unwrap();

    assert_eq!(receipt.fee_charged.value(), dec!(100));
    assert!(!receipt.duplicate);
    assert_eq!(receipt.owner_contact.customer, CUSTOMER);
    assert_eq!(receipt.owner_contact.full_name, "Aida Customer");
    assert_eq!(receipt.owner_contact.phone, "+996555000001");
    assert_eq!(receipt.response.message.as_deref(), Some("on my way"));
    assert_eq!(market.account(2).await.unwrap().unwrap().balance.value(), dec!(0));

    let attempts = market.attempts_for_executor(2).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
}

#[tokio::test]
async fn test_low_budget_claim_with_short_balance_is_rejected() {
    let market = market().await;
    executor(&market, 2, dec!(40)).await;
    post_order(&market, 10, dec!(5000)).await;

    let err = market
        .submit_claim_at(ClaimRequest::new(10, 2), t0())
        .await
        .unwrap_err();

    match err {
        MarketError::InsufficientFunds {
            required,
            available,
            shortfall,
        } => {
            assert_eq!(required.value(), dec!(50));
            assert_eq!(available.value(), dec!(40));
            assert_eq!(shortfall.value(), dec!(10));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_eq!(market.account(2).await.unwrap().unwrap().balance.value(), dec!(40));
    assert!(market.responses_for(10).await.unwrap().is_empty());

    let attempts = market.attempts_for_executor(2).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert_eq!(attempts[0].order, Some(10));
    assert!(attempts[0].reason.is_some());
}

#[tokio::test]
async fn test_sixth_executor_hits_capacity() {
    let market = market().await;
    post_order(&market, 10, dec!(500)).await;
    for user in 2..=7 {
        executor(&market, user, dec!(1000)).await;
    }
    for user in 2..=6 {
        market
            .submit_claim_at(ClaimRequest::new(10, user), t0())
            .await
            .unwrap();
    }

    let err = market
        .submit_claim_at(ClaimRequest::new(10, 7), t0())
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::CapacityExceeded { capacity: 5 }));
    assert_eq!(market.responses_for(10).await.unwrap().len(), 5);
    assert_eq!(market.account(7).await.unwrap().unwrap().balance.value(), dec!(1000));
}

#[tokio::test]
async fn test_cooldown_applies_across_orders() {
    let market = market().await;
    executor(&market, 2, dec!(1000)).await;
    post_order(&market, 10, dec!(500)).await;
    post_order(&market, 11, dec!(500)).await;

    market
        .submit_claim_at(ClaimRequest::new(10, 2), t0())
        .await
        .unwrap();

    let err = market
        .submit_claim_at(ClaimRequest::new(11, 2), t0() + Duration::seconds(3))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::RateLimited));

    // The rejected attempt restarts the window.
    let err = market
        .submit_claim_at(ClaimRequest::new(11, 2), t0() + Duration::seconds(6))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::RateLimited));

    market
        .submit_claim_at(ClaimRequest::new(11, 2), t0() + Duration::seconds(12))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_same_order_retry_in_cooldown_reports_already_claimed_before_rate_limit() {
    let market = market().await;
    executor(&market, 2, dec!(1000)).await;
    post_order(&market, 10, dec!(500)).await;

    market
        .submit_claim_at(ClaimRequest::new(10, 2), t0())
        .await
        .unwrap();
    let err = market
        .submit_claim_at(ClaimRequest::new(10, 2), t0() + Duration::seconds(3))
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::AlreadyClaimed));
    assert_eq!(market.account(2).await.unwrap().unwrap().balance.value(), dec!(950));
}

#[tokio::test]
async fn test_retry_with_same_key_is_a_conflict() {
    let market = market().await;
    executor(&market, 2, dec!(1000)).await;
    post_order(&market, 10, dec!(500)).await;

    let receipt = market
        .submit_claim_at(ClaimRequest::new(10, 2).with_idempotency_key("k-1"), t0())
        .await
        .unwrap();
    let err = market
        .submit_claim_at(
            ClaimRequest::new(10, 2).with_idempotency_key("k-1"),
            t0() + Duration::seconds(30),
        )
        .await
        .unwrap_err();

    match err {
        MarketError::Conflict { response_id } => {
            assert_eq!(response_id, Some(receipt.response.id));
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert!(!MarketError::Conflict { response_id: None }.is_retryable());
    assert_eq!(market.account(2).await.unwrap().unwrap().balance.value(), dec!(950));

    let attempts = market.attempts_for_executor(2).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts.iter().filter(|a| a.success).count(), 1);
}

#[tokio::test]
async fn test_checks_report_first_failure() {
    let market = market().await;
    executor(&market, 2, dec!(0)).await;
    post_order(&market, 10, dec!(500)).await;

    // Missing order wins over everything and is logged without an order reference.
    let err = market
        .submit_claim_at(ClaimRequest::new(99, 2), t0())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    // Self-claim comes before the balance check.
    let err = market
        .submit_claim_at(ClaimRequest::new(10, CUSTOMER), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::SelfClaimForbidden));

    let attempts = market.attempts().await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].order, None);
    assert!(attempts.iter().all(|a| !a.success));
}

#[tokio::test]
async fn test_expired_order_is_rejected() {
    let market = market().await;
    executor(&market, 2, dec!(1000)).await;
    post_order(&market, 10, dec!(500)).await;

    let after_deadline = common::deadline()
        .succ_opt()
        .unwrap()
        .and_hms_opt(0, 0, 1)
        .unwrap()
        .and_utc();
    let err = market
        .submit_claim_at(ClaimRequest::new(10, 2), after_deadline)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Expired));

    // The deadline day itself is still open.
    executor(&market, 3, dec!(1000)).await;
    let on_deadline = common::deadline().and_hms_opt(23, 0, 0).unwrap().and_utc();
    market
        .submit_claim_at(ClaimRequest::new(10, 3), on_deadline)
        .await
        .unwrap();
}
