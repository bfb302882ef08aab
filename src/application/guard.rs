//! Advisory admission checks.
//!
//! The guard runs every eligibility predicate against an unlocked snapshot
//! and stops at the first failure. Its verdict is only a filter: anything it
//! lets through is re-validated under lock by the admission executor.

use super::audit::record_rejection;
use super::claim::{AdmittedClaim, ClaimRequest};
use super::rate_limiter::RateLimiter;
use crate::domain::fee::FeePolicy;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::ports::LedgerStore;
use crate::error::{MarketError, Missing, Result};
use chrono::{DateTime, Utc};

pub struct AdmissionGuard {
    capacity: usize,
    fees: FeePolicy,
    rate_limiter: RateLimiter,
}

impl AdmissionGuard {
    pub fn new(capacity: usize, fees: FeePolicy, rate_limiter: RateLimiter) -> Self {
        Self {
            capacity,
            fees,
            rate_limiter,
        }
    }

    /// Runs the checks in order. A rejection is appended to the attempt log
    /// before it is returned.
    pub async fn check(
        &self,
        store: &dyn LedgerStore,
        request: &ClaimRequest,
        now: DateTime<Utc>,
    ) -> Result<AdmittedClaim> {
        match self.evaluate(store, request, now).await {
            Ok(admitted) => {
                tracing::debug!(
                    order = request.order,
                    executor = request.executor,
                    fee = %admitted.fee,
                    "advisory checks passed"
                );
                Ok(admitted)
            }
            Err((order, err)) => Err(record_rejection(store, request, order, err, now).await),
        }
    }

    /// On failure also returns the order reference to log, which is `None`
    /// when the order could not be found.
    async fn evaluate(
        &self,
        store: &dyn LedgerStore,
        request: &ClaimRequest,
        now: DateTime<Utc>,
    ) -> std::result::Result<AdmittedClaim, (Option<OrderId>, MarketError)> {
        let unknown = |err: MarketError| -> (Option<OrderId>, MarketError) { (None, err) };

        // A key that already succeeded stays succeeded, so the snapshot is
        // enough to answer a replay.
        if let Some(key) = &request.idempotency_key
            && let Some(prior) = store.successful_attempt(key).await.map_err(|e| unknown(e.into()))?
        {
            let response_id = match prior.order {
                Some(order) => store
                    .response(order, prior.executor)
                    .await
                    .map_err(|e| unknown(e.into()))?
                    .map(|r| r.id),
                None => None,
            };
            tracing::debug!(key = %key, "idempotent replay of a completed claim");
            return Err((
                Some(request.order),
                MarketError::Conflict { response_id },
            ));
        }

        let order = store
            .order(request.order)
            .await
            .map_err(|e| unknown(e.into()))?
            .ok_or_else(|| unknown(MarketError::NotFound(Missing::Order(request.order))))?;

        let at = |err: MarketError| -> (Option<OrderId>, MarketError) { (Some(order.id), err) };
        self.evaluate_order(store, request, &order, now)
            .await
            .map_err(at)?;

        Ok(AdmittedClaim {
            request: request.clone(),
            fee: self.fees.fee_for(order.budget),
            order,
        })
    }

    async fn evaluate_order(
        &self,
        store: &dyn LedgerStore,
        request: &ClaimRequest,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let executor = store.account(request.executor).await?.ok_or_else(|| {
            MarketError::Forbidden(format!("unknown executor {}", request.executor))
        })?;
        if executor.is_blocked() {
            return Err(MarketError::Forbidden(format!(
                "executor {} is blocked",
                executor.user
            )));
        }

        if order.is_expired(now.date_naive()) {
            return Err(MarketError::Expired);
        }

        if order.status != OrderStatus::Active {
            return Err(MarketError::InvalidState {
                status: order.status,
            });
        }

        if order.customer == request.executor {
            return Err(MarketError::SelfClaimForbidden);
        }

        if store.response(order.id, request.executor).await?.is_some() {
            return Err(MarketError::AlreadyClaimed);
        }

        if self
            .rate_limiter
            .is_limited(store, request.executor, now)
            .await?
        {
            return Err(MarketError::RateLimited);
        }

        if store.response_count(order.id).await? >= self.capacity {
            return Err(MarketError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let fee = self.fees.fee_for(order.budget);
        if let Some(shortfall) = executor.shortfall(fee) {
            return Err(MarketError::InsufficientFunds {
                required: fee,
                available: executor.balance,
                shortfall,
            });
        }

        Ok(())
    }
}
