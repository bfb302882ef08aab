use super::account::Account;
use super::attempt::AttemptLogEntry;
use super::order::{Order, OrderId, Response, UserId};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// A row that can be locked for the duration of a unit of work.
///
/// The derived `Ord` is the global acquisition order: idempotency keys,
/// then orders, then accounts. Every transaction takes its locks in that
/// order, so two transactions can never wait on each other in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    IdempotencyKey(String),
    Order(OrderId),
    Account(UserId),
}

/// The set of rows a transaction locks when it begins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockScope {
    keys: BTreeSet<LockKey>,
}

impl LockScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, id: OrderId) -> Self {
        self.keys.insert(LockKey::Order(id));
        self
    }

    pub fn account(mut self, user: UserId) -> Self {
        self.keys.insert(LockKey::Account(user));
        self
    }

    pub fn idempotency_key(mut self, key: Option<&str>) -> Self {
        if let Some(key) = key {
            self.keys.insert(LockKey::IdempotencyKey(key.to_owned()));
        }
        self
    }

    /// Keys in acquisition order.
    pub fn keys(&self) -> impl Iterator<Item = &LockKey> {
        self.keys.iter()
    }
}

/// Durable storage for orders, responses, accounts and the attempt log.
///
/// Methods on the store itself read a best-effort snapshot and take no locks.
/// Anything that must be consistent under contention goes through
/// [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn account(&self, user: UserId) -> StoreResult<Option<Account>>;
    async fn accounts(&self) -> StoreResult<Vec<Account>>;
    async fn response(&self, order: OrderId, executor: UserId) -> StoreResult<Option<Response>>;
    async fn responses_for(&self, order: OrderId) -> StoreResult<Vec<Response>>;

    async fn response_count(&self, order: OrderId) -> StoreResult<usize> {
        Ok(self.responses_for(order).await?.len())
    }

    /// Timestamp of the executor's most recent attempt, successful or not.
    async fn last_attempt_at(&self, executor: UserId) -> StoreResult<Option<DateTime<Utc>>>;
    /// The successful attempt recorded under `key`, if any.
    async fn successful_attempt(&self, key: &str) -> StoreResult<Option<AttemptLogEntry>>;
    /// The whole attempt log, oldest first.
    async fn attempts(&self) -> StoreResult<Vec<AttemptLogEntry>>;
    async fn attempts_for_executor(&self, executor: UserId) -> StoreResult<Vec<AttemptLogEntry>>;

    /// Appends to the attempt log in its own unit of work, so the entry
    /// survives the rollback of whatever transaction produced it.
    async fn append_attempt(&self, entry: AttemptLogEntry) -> StoreResult<()>;

    /// Acquires every row lock in `scope` and opens a unit of work.
    ///
    /// Locks are held until the transaction is committed or dropped.
    /// Dropping without committing discards all buffered writes.
    async fn begin(&self, scope: LockScope) -> StoreResult<LedgerTransactionBox>;
}

/// A lock-holding unit of work. Reads see the transaction's own buffered writes.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;
    async fn account(&mut self, user: UserId) -> StoreResult<Option<Account>>;
    async fn response(&mut self, order: OrderId, executor: UserId)
    -> StoreResult<Option<Response>>;
    async fn response_count(&mut self, order: OrderId) -> StoreResult<usize>;
    async fn successful_attempt(&mut self, key: &str) -> StoreResult<Option<AttemptLogEntry>>;

    fn put_order(&mut self, order: Order);
    fn put_account(&mut self, account: Account);
    fn insert_response(&mut self, response: Response);
    fn append_attempt(&mut self, entry: AttemptLogEntry);

    /// Applies all buffered writes atomically and releases the locks.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type LedgerTransactionBox = Box<dyn LedgerTransaction>;
pub type LedgerStoreFactory = Box<dyn Fn() -> LedgerStoreBox + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_scope_orders_keys_globally() {
        let scope = LockScope::new()
            .account(1)
            .order(9)
            .idempotency_key(Some("abc"));
        let keys: Vec<_> = scope.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                LockKey::IdempotencyKey("abc".into()),
                LockKey::Order(9),
                LockKey::Account(1),
            ]
        );
    }

    #[test]
    fn test_lock_scope_ignores_absent_key() {
        let scope = LockScope::new().order(1).idempotency_key(None);
        assert_eq!(scope.keys().count(), 1);
    }
}
