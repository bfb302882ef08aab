use super::claim::{ClaimReceipt, ClaimRequest};
use super::executor::AdmissionExecutor;
use super::guard::AdmissionGuard;
use super::rate_limiter::RateLimiter;
use crate::config::MarketConfig;
use crate::domain::account::{Account, AccountStatus, Amount, Balance};
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::fee::FeePolicy;
use crate::domain::order::{Order, OrderId, OrderStatus, Response, UserId};
use crate::domain::ports::{LedgerStore, LedgerStoreBox, LockScope};
use crate::error::{MarketError, Missing, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The main entry point of the marketplace core.
///
/// `Marketplace` owns the ledger store and wires the admission pipeline:
/// advisory guard first, then the lock-holding executor. It also exposes the
/// account and order operations the claim flow depends on. All shared state
/// lives in the store, so one instance can be shared across tasks.
pub struct Marketplace {
    store: LedgerStoreBox,
    guard: AdmissionGuard,
    executor: AdmissionExecutor,
}

impl Marketplace {
    /// Creates a new `Marketplace` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - The ledger backing orders, accounts and the attempt log.
    /// * `config` - Capacity, cooldown, fee schedule and completion policy.
    pub fn new(store: LedgerStoreBox, config: MarketConfig) -> Self {
        let fees = FeePolicy::new(config.fee.clone());
        Self {
            store,
            guard: AdmissionGuard::new(
                config.capacity,
                fees.clone(),
                RateLimiter::new(config.cooldown()),
            ),
            executor: AdmissionExecutor::new(config.capacity, fees, config.completion),
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Submits a claim using the wall clock.
    pub async fn submit_claim(&self, request: ClaimRequest) -> Result<ClaimReceipt> {
        self.submit_claim_at(request, Utc::now()).await
    }

    /// Submits a claim as of `now`.
    ///
    /// Every outcome other than success leaves exactly one failed entry in
    /// the attempt log.
    pub async fn submit_claim_at(
        &self,
        request: ClaimRequest,
        now: DateTime<Utc>,
    ) -> Result<ClaimReceipt> {
        let store = self.store.as_ref();
        let admitted = self.guard.check(store, &request, now).await?;
        self.executor.execute(store, &admitted, now).await
    }

    /// Opens a new account with its starting balance. An existing account is
    /// never replaced; its balance only moves through deposits and fees.
    pub async fn register_account(&self, account: Account) -> Result<()> {
        let mut tx = self.store.begin(LockScope::new().account(account.user)).await?;
        if tx.account(account.user).await?.is_some() {
            return Err(MarketError::Validation(format!(
                "account {} already exists",
                account.user
            )));
        }
        tracing::info!(user = account.user, balance = %account.balance, "account registered");
        tx.put_account(account);
        tx.commit().await?;
        Ok(())
    }

    /// Credits a positive amount and returns the new balance.
    pub async fn deposit(&self, user: UserId, amount: Decimal) -> Result<Balance> {
        let amount = Amount::new(amount)?;
        let balance = self
            .update_account(user, |account| {
                account.deposit(amount);
                Ok(())
            })
            .await?
            .balance;
        tracing::info!(user, %balance, "deposit credited");
        Ok(balance)
    }

    pub async fn block(&self, user: UserId) -> Result<()> {
        self.set_status(user, AccountStatus::Blocked).await
    }

    pub async fn unblock(&self, user: UserId) -> Result<()> {
        self.set_status(user, AccountStatus::Active).await
    }

    async fn set_status(&self, user: UserId, status: AccountStatus) -> Result<()> {
        self.update_account(user, |account| {
            account.status = status;
            Ok(())
        })
        .await?;
        tracing::info!(user, ?status, "account status changed");
        Ok(())
    }

    async fn update_account<F>(&self, user: UserId, apply: F) -> Result<Account>
    where
        F: FnOnce(&mut Account) -> Result<()> + Send,
    {
        let mut tx = self.store.begin(LockScope::new().account(user)).await?;
        let mut account = tx
            .account(user)
            .await?
            .ok_or(MarketError::NotFound(Missing::Account(user)))?;
        apply(&mut account)?;
        tx.put_account(account.clone());
        tx.commit().await?;
        Ok(account)
    }

    /// Publishes a new order. It always starts out active.
    pub async fn post_order(&self, mut order: Order) -> Result<()> {
        let mut tx = self.store.begin(LockScope::new().order(order.id)).await?;
        if tx.order(order.id).await?.is_some() {
            return Err(MarketError::Validation(format!(
                "order {} already exists",
                order.id
            )));
        }
        if tx.account(order.customer).await?.is_none() {
            return Err(MarketError::NotFound(Missing::Account(order.customer)));
        }
        order.status = OrderStatus::Active;
        tracing::info!(order = order.id, customer = order.customer, "order posted");
        tx.put_order(order);
        tx.commit().await?;
        Ok(())
    }

    /// Owner marks the order done: `active -> completed`.
    pub async fn complete_order(&self, customer: UserId, order: OrderId) -> Result<Order> {
        self.transition_order(customer, order, Order::complete).await
    }

    /// Owner withdraws the order: `active -> cancelled`.
    pub async fn cancel_order(&self, customer: UserId, order: OrderId) -> Result<Order> {
        self.transition_order(customer, order, Order::cancel).await
    }

    /// Owner reopens a completed order, which makes any free capacity
    /// claimable again.
    pub async fn reactivate_order(&self, customer: UserId, order: OrderId) -> Result<Order> {
        self.transition_order(customer, order, Order::reactivate).await
    }

    async fn transition_order<F>(&self, customer: UserId, id: OrderId, apply: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> Result<()> + Send,
    {
        let mut tx = self.store.begin(LockScope::new().order(id)).await?;
        let mut order = tx
            .order(id)
            .await?
            .ok_or(MarketError::NotFound(Missing::Order(id)))?;
        if order.customer != customer {
            return Err(MarketError::Forbidden(format!(
                "user {customer} does not own order {id}"
            )));
        }
        let from = order.status;
        apply(&mut order)?;
        tx.put_order(order.clone());
        tx.commit().await?;
        tracing::info!(order = id, %from, to = %order.status, "order status changed");
        Ok(order)
    }

    pub async fn account(&self, user: UserId) -> Result<Option<Account>> {
        Ok(self.store.account(user).await?)
    }

    pub async fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.store.accounts().await?)
    }

    pub async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.store.order(id).await?)
    }

    pub async fn responses_for(&self, order: OrderId) -> Result<Vec<Response>> {
        Ok(self.store.responses_for(order).await?)
    }

    /// The full attempt log, oldest first.
    pub async fn attempts(&self) -> Result<Vec<AttemptLogEntry>> {
        Ok(self.store.attempts().await?)
    }

    pub async fn attempts_for_executor(&self, executor: UserId) -> Result<Vec<AttemptLogEntry>> {
        Ok(self.store.attempts_for_executor(executor).await?)
    }
}
