use crate::domain::order::{OrderId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason recorded when the executor layer finds an existing response.
pub const DUPLICATE_CLAIM: &str = "duplicate claim";

/// Immutable record of one claim attempt.
///
/// The log is append-only and doubles as the idempotency index: for any
/// key at most one entry has `success == true`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AttemptLogEntry {
    pub id: Uuid,
    /// `None` when the attempt named an order that does not exist.
    pub order: Option<OrderId>,
    pub executor: UserId,
    pub idempotency_key: Option<String>,
    pub success: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttemptLogEntry {
    pub fn succeeded(
        order: OrderId,
        executor: UserId,
        idempotency_key: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order: Some(order),
            executor,
            idempotency_key,
            success: true,
            reason: None,
            created_at,
        }
    }

    pub fn failed(
        order: Option<OrderId>,
        executor: UserId,
        idempotency_key: Option<String>,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            executor,
            idempotency_key,
            success: false,
            reason: Some(reason.into()),
            created_at,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
