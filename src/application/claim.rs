use crate::domain::account::Balance;
use crate::domain::order::{Order, OrderId, Response, UserId};

/// An executor's request to take a slot on an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRequest {
    pub order: OrderId,
    pub executor: UserId,
    pub message: Option<String>,
    /// Opaque caller token that makes retries safe.
    pub idempotency_key: Option<String>,
}

impl ClaimRequest {
    pub fn new(order: OrderId, executor: UserId) -> Self {
        Self {
            order,
            executor,
            message: None,
            idempotency_key: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A request that passed every advisory check, with the snapshot it was checked against.
#[derive(Debug, Clone)]
pub struct AdmittedClaim {
    pub request: ClaimRequest,
    pub order: Order,
    pub fee: Balance,
}

/// How the winning executor reaches the customer.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerContact {
    pub customer: UserId,
    pub full_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimReceipt {
    pub response: Response,
    pub owner_contact: OwnerContact,
    pub fee_charged: Balance,
    /// The executor already held a response; nothing was charged this time.
    pub duplicate: bool,
}
