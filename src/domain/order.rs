use crate::error::MarketError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type OrderId = u32;
pub type UserId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Active => "active",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A job posted by a customer.
///
/// The number of responses is not stored here; it is always counted from
/// the response rows so it cannot drift.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub customer: UserId,
    pub description: String,
    pub budget: Option<Decimal>,
    pub deadline: NaiveDate,
    /// Phone shown to executors whose claim is accepted.
    pub phone: String,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(id: OrderId, customer: UserId, deadline: NaiveDate) -> Self {
        Self {
            id,
            customer,
            description: String::new(),
            budget: None,
            deadline,
            phone: String::new(),
            status: OrderStatus::Active,
        }
    }

    pub fn with_budget(mut self, budget: Decimal) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.deadline < today
    }

    /// `active -> completed`
    pub fn complete(&mut self) -> Result<(), MarketError> {
        self.transition(OrderStatus::Active, OrderStatus::Completed)
    }

    /// `active -> cancelled`
    pub fn cancel(&mut self) -> Result<(), MarketError> {
        self.transition(OrderStatus::Active, OrderStatus::Cancelled)
    }

    /// `completed -> active`. Reopens the order for claims; cancelled orders stay closed.
    pub fn reactivate(&mut self) -> Result<(), MarketError> {
        self.transition(OrderStatus::Completed, OrderStatus::Active)
    }

    fn transition(&mut self, from: OrderStatus, to: OrderStatus) -> Result<(), MarketError> {
        if self.status != from {
            return Err(MarketError::InvalidState {
                status: self.status,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// One executor's accepted claim on an order. Never updated once written.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Response {
    pub id: Uuid,
    pub order: OrderId,
    pub executor: UserId,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn new(
        order: OrderId,
        executor: UserId,
        message: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            executor,
            message,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order::new(1, 10, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
    }

    #[test]
    fn test_complete_then_reactivate() {
        let mut order = order();
        order.complete().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        order.reactivate().unwrap();
        assert_eq!(order.status, OrderStatus::Active);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut order = order();
        order.cancel().unwrap();
        for result in [order.complete(), order.reactivate(), order.cancel()] {
            assert!(matches!(
                result,
                Err(MarketError::InvalidState {
                    status: OrderStatus::Cancelled
                })
            ));
        }
    }

    #[test]
    fn test_reactivate_requires_completed() {
        let mut order = order();
        assert!(order.reactivate().is_err());
        assert_eq!(order.status, OrderStatus::Active);
    }

    #[test]
    fn test_deadline_today_is_not_expired() {
        let order = order();
        assert!(!order.is_expired(order.deadline));
        assert!(order.is_expired(order.deadline.succ_opt().unwrap()));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
    }
}
