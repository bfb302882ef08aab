use super::unit_of_work::{HeldLocks, PendingWrites, RowLocks};
use crate::domain::account::Account;
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::order::{Order, OrderId, Response, UserId};
use crate::domain::ports::{LedgerStore, LedgerTransaction, LedgerTransactionBox, LockScope};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for account rows, keyed by user id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for order rows, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for responses, keyed by `order ++ executor`.
pub const CF_RESPONSES: &str = "responses";
/// Column Family for the attempt log, keyed by `executor ++ millis ++ entry id`.
pub const CF_ATTEMPTS: &str = "attempts";
/// Column Family mapping an idempotency key to its successful attempt.
pub const CF_IDEMPOTENCY: &str = "idempotency";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_ACCOUNTS,
    CF_ORDERS,
    CF_RESPONSES,
    CF_ATTEMPTS,
    CF_IDEMPOTENCY,
];

/// A persistent ledger backed by RocksDB.
///
/// Each entity lives in its own Column Family as JSON. Row locks are held
/// in-process, which matches RocksDB's single-process ownership of the
/// database directory; a transaction's writes go out as one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    locks: RowLocks,
}

fn response_key(order: OrderId, executor: UserId) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&order.to_be_bytes());
    key[4..].copy_from_slice(&executor.to_be_bytes());
    key
}

fn attempt_key(entry: &AttemptLogEntry) -> Vec<u8> {
    let millis = u64::try_from(entry.created_at.timestamp_millis()).unwrap_or(0);
    let mut key = Vec::with_capacity(28);
    key.extend_from_slice(&entry.executor.to_be_bytes());
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(entry.id.as_bytes());
    key
}

impl RocksDbLedger {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: RowLocks::new(),
        })
    }

    fn cf(&self, name: &'static str) -> StoreResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or(StoreError::MissingColumnFamily(name))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> StoreResult<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Values of every key starting with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, cf: &'static str, prefix: &[u8]) -> StoreResult<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));
        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &'static str,
        key: &[u8],
        value: &T,
    ) -> StoreResult<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn batch_attempt(&self, batch: &mut WriteBatch, entry: &AttemptLogEntry) -> StoreResult<()> {
        self.put_json(batch, CF_ATTEMPTS, &attempt_key(entry), entry)?;
        if entry.success
            && let Some(key) = &entry.idempotency_key
        {
            self.put_json(batch, CF_IDEMPOTENCY, key.as_bytes(), entry)?;
        }
        Ok(())
    }

    fn write_pending(&self, pending: PendingWrites) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for order in pending.orders.values() {
            self.put_json(&mut batch, CF_ORDERS, &order.id.to_be_bytes(), order)?;
        }
        for account in pending.accounts.values() {
            self.put_json(&mut batch, CF_ACCOUNTS, &account.user.to_be_bytes(), account)?;
        }
        for response in &pending.responses {
            let key = response_key(response.order, response.executor);
            self.put_json(&mut batch, CF_RESPONSES, &key, response)?;
        }
        for entry in &pending.attempts {
            self.batch_attempt(&mut batch, entry)?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        self.get_json(CF_ORDERS, &id.to_be_bytes())
    }

    async fn account(&self, user: UserId) -> StoreResult<Option<Account>> {
        self.get_json(CF_ACCOUNTS, &user.to_be_bytes())
    }

    async fn accounts(&self) -> StoreResult<Vec<Account>> {
        self.scan_prefix(CF_ACCOUNTS, &[])
    }

    async fn response(&self, order: OrderId, executor: UserId) -> StoreResult<Option<Response>> {
        self.get_json(CF_RESPONSES, &response_key(order, executor))
    }

    async fn responses_for(&self, order: OrderId) -> StoreResult<Vec<Response>> {
        let mut responses: Vec<Response> = self.scan_prefix(CF_RESPONSES, &order.to_be_bytes())?;
        responses.sort_by_key(|r| r.created_at);
        Ok(responses)
    }

    async fn last_attempt_at(&self, executor: UserId) -> StoreResult<Option<DateTime<Utc>>> {
        let prefix = executor.to_be_bytes();
        let mut upper = prefix.to_vec();
        upper.extend_from_slice(&[0xff; 24]);

        let mut iter = self
            .db
            .iterator_cf(self.cf(CF_ATTEMPTS)?, IteratorMode::From(upper.as_slice(), Direction::Reverse));
        match iter.next() {
            Some(item) => {
                let (key, value) = item?;
                if !key.starts_with(&prefix) {
                    return Ok(None);
                }
                let entry: AttemptLogEntry = serde_json::from_slice(&value)?;
                Ok(Some(entry.created_at))
            }
            None => Ok(None),
        }
    }

    async fn successful_attempt(&self, key: &str) -> StoreResult<Option<AttemptLogEntry>> {
        self.get_json(CF_IDEMPOTENCY, key.as_bytes())
    }

    async fn attempts(&self) -> StoreResult<Vec<AttemptLogEntry>> {
        let mut attempts: Vec<AttemptLogEntry> = self.scan_prefix(CF_ATTEMPTS, &[])?;
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }

    async fn attempts_for_executor(&self, executor: UserId) -> StoreResult<Vec<AttemptLogEntry>> {
        self.scan_prefix(CF_ATTEMPTS, &executor.to_be_bytes())
    }

    async fn append_attempt(&self, entry: AttemptLogEntry) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        self.batch_attempt(&mut batch, &entry)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn begin(&self, scope: LockScope) -> StoreResult<LedgerTransactionBox> {
        let locks = self.locks.acquire(&scope).await;
        Ok(Box::new(RocksDbTransaction {
            ledger: self.clone(),
            _locks: locks,
            pending: PendingWrites::default(),
        }))
    }
}

struct RocksDbTransaction {
    ledger: RocksDbLedger,
    _locks: HeldLocks,
    pending: PendingWrites,
}

#[async_trait]
impl LedgerTransaction for RocksDbTransaction {
    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        match self.pending.order(id) {
            Some(order) => Ok(Some(order.clone())),
            None => self.ledger.order(id).await,
        }
    }

    async fn account(&mut self, user: UserId) -> StoreResult<Option<Account>> {
        match self.pending.account(user) {
            Some(account) => Ok(Some(account.clone())),
            None => self.ledger.account(user).await,
        }
    }

    async fn response(
        &mut self,
        order: OrderId,
        executor: UserId,
    ) -> StoreResult<Option<Response>> {
        match self.pending.response(order, executor) {
            Some(response) => Ok(Some(response.clone())),
            None => self.ledger.response(order, executor).await,
        }
    }

    async fn response_count(&mut self, order: OrderId) -> StoreResult<usize> {
        let committed = self.ledger.response_count(order).await?;
        Ok(committed + self.pending.responses_for(order))
    }

    async fn successful_attempt(&mut self, key: &str) -> StoreResult<Option<AttemptLogEntry>> {
        match self.pending.successful_attempt(key) {
            Some(entry) => Ok(Some(entry.clone())),
            None => self.ledger.successful_attempt(key).await,
        }
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
        let RocksDbTransaction {
            ledger,
            _locks,
            pending,
        } = *self;
        ledger.write_pending(pending)
    }
}
