//! Authoritative claim execution.
//!
//! Everything here runs inside one unit of work holding the idempotency key,
//! order and executor account rows. Re-validation under those locks is what
//! actually enforces capacity and balance; the guard's earlier verdict is
//! never trusted.

use super::audit::record_rejection;
use super::claim::{AdmittedClaim, ClaimReceipt, ClaimRequest, OwnerContact};
use crate::config::CompletionPolicy;
use crate::domain::account::Balance;
use crate::domain::attempt::{AttemptLogEntry, DUPLICATE_CLAIM};
use crate::domain::fee::FeePolicy;
use crate::domain::order::{Order, OrderStatus, Response};
use crate::domain::ports::{LedgerStore, LedgerTransactionBox, LockScope};
use crate::error::{MarketError, Missing, Result};
use chrono::{DateTime, Utc};

pub struct AdmissionExecutor {
    capacity: usize,
    fees: FeePolicy,
    completion: CompletionPolicy,
}

impl AdmissionExecutor {
    pub fn new(capacity: usize, fees: FeePolicy, completion: CompletionPolicy) -> Self {
        Self {
            capacity,
            fees,
            completion,
        }
    }

    /// Performs the claim atomically.
    ///
    /// On failure nothing from the transaction is kept; the failed attempt is
    /// logged afterwards in a separate unit of work.
    pub async fn execute(
        &self,
        store: &dyn LedgerStore,
        admitted: &AdmittedClaim,
        now: DateTime<Utc>,
    ) -> Result<ClaimReceipt> {
        let request = &admitted.request;
        match self.claim_locked(store, request, now).await {
            Ok(receipt) => {
                if receipt.duplicate {
                    tracing::debug!(
                        order = request.order,
                        executor = request.executor,
                        response = %receipt.response.id,
                        "claim already held, returning existing response"
                    );
                } else {
                    tracing::info!(
                        order = request.order,
                        executor = request.executor,
                        response = %receipt.response.id,
                        fee = %receipt.fee_charged,
                        "claim accepted"
                    );
                }
                Ok(receipt)
            }
            Err(err) => {
                let order = match &err {
                    MarketError::NotFound(Missing::Order(_)) => None,
                    _ => Some(request.order),
                };
                Err(record_rejection(store, request, order, err, now).await)
            }
        }
    }

    /// The transaction body. Returning early drops `tx`, which rolls it back
    /// and releases the locks before the caller logs anything.
    async fn claim_locked(
        &self,
        store: &dyn LedgerStore,
        request: &ClaimRequest,
        now: DateTime<Utc>,
    ) -> Result<ClaimReceipt> {
        let scope = LockScope::new()
            .idempotency_key(request.idempotency_key.as_deref())
            .order(request.order)
            .account(request.executor);
        let mut tx = store.begin(scope).await?;

        if let Some(key) = &request.idempotency_key
            && let Some(prior) = tx.successful_attempt(key).await?
        {
            let response_id = match prior.order {
                Some(order) => tx.response(order, prior.executor).await?.map(|r| r.id),
                None => None,
            };
            return Err(MarketError::Conflict { response_id });
        }

        let order = tx
            .order(request.order)
            .await?
            .ok_or(MarketError::NotFound(Missing::Order(request.order)))?;

        if let Some(existing) = tx.response(request.order, request.executor).await? {
            tx.append_attempt(
                AttemptLogEntry::succeeded(
                    request.order,
                    request.executor,
                    request.idempotency_key.clone(),
                    now,
                )
                .with_reason(DUPLICATE_CLAIM),
            );
            let owner_contact = owner_contact(store, &order).await?;
            tx.commit().await?;
            return Ok(ClaimReceipt {
                response: existing,
                owner_contact,
                fee_charged: Balance::ZERO,
                duplicate: true,
            });
        }

        let fee = self.revalidate(&mut tx, request, &order).await?;

        let mut executor = tx
            .account(request.executor)
            .await?
            .ok_or_else(|| MarketError::Forbidden(format!("unknown executor {}", request.executor)))?;
        executor.debit(fee)?;
        tx.put_account(executor);

        let response = Response::new(request.order, request.executor, request.message.clone(), now);
        tx.insert_response(response.clone());

        if self.completion == CompletionPolicy::CompleteOnFirstClaim {
            let mut completed = order.clone();
            completed.complete()?;
            tx.put_order(completed);
        }

        tx.append_attempt(AttemptLogEntry::succeeded(
            request.order,
            request.executor,
            request.idempotency_key.clone(),
            now,
        ));

        let owner_contact = owner_contact(store, &order).await?;
        tx.commit().await?;

        Ok(ClaimReceipt {
            response,
            owner_contact,
            fee_charged: fee,
            duplicate: false,
        })
    }

    /// Re-checks whatever may have changed since the advisory pass and
    /// returns the fee to charge.
    async fn revalidate(
        &self,
        tx: &mut LedgerTransactionBox,
        request: &ClaimRequest,
        order: &Order,
    ) -> Result<Balance> {
        if order.status != OrderStatus::Active {
            return Err(MarketError::InvalidState {
                status: order.status,
            });
        }

        if tx.response_count(order.id).await? >= self.capacity {
            return Err(MarketError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let fee = self.fees.fee_for(order.budget);
        let executor = tx
            .account(request.executor)
            .await?
            .ok_or_else(|| MarketError::Forbidden(format!("unknown executor {}", request.executor)))?;
        if let Some(shortfall) = executor.shortfall(fee) {
            return Err(MarketError::InsufficientFunds {
                required: fee,
                available: executor.balance,
                shortfall,
            });
        }

        Ok(fee)
    }
}

async fn owner_contact(store: &dyn LedgerStore, order: &Order) -> Result<OwnerContact> {
    let customer = store.account(order.customer).await?;
    let full_name = customer
        .as_ref()
        .map(|c| c.full_name.clone())
        .unwrap_or_default();
    let phone = if order.phone.is_empty() {
        customer.map(|c| c.phone).unwrap_or_default()
    } else {
        order.phone.clone()
    };
    Ok(OwnerContact {
        customer: order.customer,
        full_name,
        phone,
    })
}
