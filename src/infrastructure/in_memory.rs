use super::unit_of_work::{HeldLocks, PendingWrites, RowLocks};
use crate::domain::account::Account;
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::order::{Order, OrderId, Response, UserId};
use crate::domain::ports::{LedgerStore, LedgerTransaction, LedgerTransactionBox, LockScope};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<UserId, Account>,
    orders: HashMap<OrderId, Order>,
    responses: HashMap<(OrderId, UserId), Response>,
    attempts: Vec<AttemptLogEntry>,
}

impl LedgerState {
    fn response_count(&self, order: OrderId) -> usize {
        self.responses.keys().filter(|(o, _)| *o == order).count()
    }

    fn successful_attempt(&self, key: &str) -> Option<&AttemptLogEntry> {
        self.attempts
            .iter()
            .find(|a| a.success && a.idempotency_key.as_deref() == Some(key))
    }

    fn apply(&mut self, pending: PendingWrites) {
        self.orders.extend(pending.orders);
        self.accounts.extend(pending.accounts);
        for response in pending.responses {
            self.responses
                .insert((response.order, response.executor), response);
        }
        self.attempts.extend(pending.attempts);
    }
}

/// A thread-safe in-memory ledger.
///
/// Committed state sits behind one `Arc<RwLock<..>>`; row locks come from a
/// separate [`RowLocks`] table so a transaction holding an order does not
/// block snapshot readers. Suited to tests and single-node deployments.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    locks: RowLocks,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn account(&self, user: UserId) -> StoreResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&user).cloned())
    }

    async fn accounts(&self) -> StoreResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<_> = state.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.user);
        Ok(accounts)
    }

    async fn response(&self, order: OrderId, executor: UserId) -> StoreResult<Option<Response>> {
        Ok(self
            .state
            .read()
            .await
            .responses
            .get(&(order, executor))
            .cloned())
    }

    async fn responses_for(&self, order: OrderId) -> StoreResult<Vec<Response>> {
        let state = self.state.read().await;
        let mut responses: Vec<_> = state
            .responses
            .values()
            .filter(|r| r.order == order)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.created_at);
        Ok(responses)
    }

    async fn response_count(&self, order: OrderId) -> StoreResult<usize> {
        Ok(self.state.read().await.response_count(order))
    }

    async fn last_attempt_at(&self, executor: UserId) -> StoreResult<Option<DateTime<Utc>>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .iter()
            .filter(|a| a.executor == executor)
            .map(|a| a.created_at)
            .max())
    }

    async fn successful_attempt(&self, key: &str) -> StoreResult<Option<AttemptLogEntry>> {
        Ok(self.state.read().await.successful_attempt(key).cloned())
    }

    async fn attempts(&self) -> StoreResult<Vec<AttemptLogEntry>> {
        let mut attempts = self.state.read().await.attempts.clone();
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }

    async fn attempts_for_executor(&self, executor: UserId) -> StoreResult<Vec<AttemptLogEntry>> {
        let mut attempts: Vec<_> = self
            .state
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.executor == executor)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }

    async fn append_attempt(&self, entry: AttemptLogEntry) -> StoreResult<()> {
        self.state.write().await.attempts.push(entry);
        Ok(())
    }

    async fn begin(&self, scope: LockScope) -> StoreResult<LedgerTransactionBox> {
        let locks = self.locks.acquire(&scope).await;
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            _locks: locks,
            pending: PendingWrites::default(),
        }))
    }
}

struct InMemoryTransaction {
    state: Arc<RwLock<LedgerState>>,
    _locks: HeldLocks,
    pending: PendingWrites,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        if let Some(order) = self.pending.order(id) {
            return Ok(Some(order.clone()));
        }
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn account(&mut self, user: UserId) -> StoreResult<Option<Account>> {
        if let Some(account) = self.pending.account(user) {
            return Ok(Some(account.clone()));
        }
        Ok(self.state.read().await.accounts.get(&user).cloned())
    }

    async fn response(
        &mut self,
        order: OrderId,
        executor: UserId,
    ) -> StoreResult<Option<Response>> {
        if let Some(response) = self.pending.response(order, executor) {
            return Ok(Some(response.clone()));
        }
        Ok(self
            .state
            .read()
            .await
            .responses
            .get(&(order, executor))
            .cloned())
    }

    async fn response_count(&mut self, order: OrderId) -> StoreResult<usize> {
        let committed = self.state.read().await.response_count(order);
        Ok(committed + self.pending.responses_for(order))
    }

    async fn successful_attempt(&mut self, key: &str) -> StoreResult<Option<AttemptLogEntry>> {
        if let Some(entry) = self.pending.successful_attempt(key) {
            return Ok(Some(entry.clone()));
        }
        Ok(self.state.read().await.successful_attempt(key).cloned())
    }

    fn put_order(&mut self, order: Order) {
        self.pending.orders.insert(order.id, order);
    }

    fn put_account(&mut self, account: Account) {
        self.pending.accounts.insert(account.user, account);
    }

    fn insert_response(&mut self, response: Response) {
        self.pending.responses.push(response);
    }

    fn append_attempt(&mut self, entry: AttemptLogEntry) {
        self.pending.attempts.push(entry);
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTransaction {
            state,
            _locks,
            pending,
        } = *self;
        state.write().await.apply(pending);
        Ok(())
    }
}
