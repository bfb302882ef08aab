//! Building blocks shared by every `LedgerStore` backend: an in-process row
//! lock table and the write buffer a transaction fills before commit.

use crate::domain::account::Account;
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::order::{Order, OrderId, Response, UserId};
use crate::domain::ports::{LockKey, LockScope};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = Arc<StdMutex<HashMap<LockKey, Arc<Mutex<()>>>>>;

/// One mutex per locked row, created on first use and evicted once the last
/// transaction holding or waiting on it lets go.
///
/// Cloning shares the table, so every transaction opened against the same
/// store contends on the same rows.
#[derive(Default, Clone)]
pub struct RowLocks {
    table: LockTable,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every row in `scope`, in the scope's global order.
    pub async fn acquire(&self, scope: &LockScope) -> HeldLocks {
        let mut held = HeldLocks {
            table: Arc::clone(&self.table),
            rows: Vec::new(),
        };
        for key in scope.keys() {
            let row = {
                let mut table = lock_table(&self.table);
                table.entry(key.clone()).or_default().clone()
            };
            // Registered before awaiting so a cancelled acquire still cleans up.
            held.rows.push((key.clone(), None));
            let guard = row.lock_owned().await;
            if let Some(slot) = held.rows.last_mut() {
                slot.1 = Some(guard);
            }
        }
        held
    }

    /// Rows currently tracked, held or awaited.
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_table(table: &LockTable) -> MutexGuard<'_, HashMap<LockKey, Arc<Mutex<()>>>> {
    // Only single map operations run under this lock; a poisoned table is still consistent.
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Row locks owned by an open transaction. Released on drop.
pub struct HeldLocks {
    table: LockTable,
    rows: Vec<(LockKey, Option<OwnedMutexGuard<()>>)>,
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        let rows = std::mem::take(&mut self.rows);
        let keys: Vec<LockKey> = rows.into_iter().map(|(key, _guard)| key).collect();

        let mut table = lock_table(&self.table);
        for key in keys {
            // Clones are only taken under the table lock, so a count of one
            // means nobody else holds or awaits this row.
            if table.get(&key).is_some_and(|row| Arc::strong_count(row) == 1) {
                table.remove(&key);
            }
        }
    }
}

/// Writes buffered by a transaction until commit.
#[derive(Debug, Default)]
pub struct PendingWrites {
    pub orders: BTreeMap<OrderId, Order>,
    pub accounts: BTreeMap<UserId, Account>,
    pub responses: Vec<Response>,
    pub attempts: Vec<AttemptLogEntry>,
}

impl PendingWrites {
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn account(&self, user: UserId) -> Option<&Account> {
        self.accounts.get(&user)
    }

    pub fn response(&self, order: OrderId, executor: UserId) -> Option<&Response> {
        self.responses
            .iter()
            .find(|r| r.order == order && r.executor == executor)
    }

    pub fn responses_for(&self, order: OrderId) -> usize {
        self.responses.iter().filter(|r| r.order == order).count()
    }

    pub fn successful_attempt(&self, key: &str) -> Option<&AttemptLogEntry> {
        self.attempts
            .iter()
            .find(|a| a.success && a.idempotency_key.as_deref() == Some(key))
    }
}
