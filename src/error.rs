use crate::domain::account::Balance;
use crate::domain::order::{OrderId, OrderStatus, UserId};
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by the storage layer.
///
/// Every variant is an infrastructure problem; callers see them as a
/// retryable [`MarketError::Storage`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Column family not found: {0}")]
    MissingColumnFamily(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Order(OrderId),
    Account(UserId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Order(id) => write!(f, "order {id}"),
            Missing::Account(id) => write!(f, "account {id}"),
        }
    }
}

/// Outcome taxonomy for every marketplace operation.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("order deadline has passed")]
    Expired,
    #[error("order is not active (current status: {status})")]
    InvalidState { status: OrderStatus },
    #[error("customers cannot claim their own orders")]
    SelfClaimForbidden,
    #[error("executor has already claimed this order")]
    AlreadyClaimed,
    #[error("too many attempts, retry after the cooldown")]
    RateLimited,
    #[error("order has reached its response capacity of {capacity}")]
    CapacityExceeded { capacity: usize },
    #[error("insufficient funds: fee {required}, balance {available}, short by {shortfall}")]
    InsufficientFunds {
        required: Balance,
        available: Balance,
        shortfall: Balance,
    },
    /// The idempotency key belongs to a claim that already succeeded.
    #[error("idempotency key already used by a completed claim")]
    Conflict { response_id: Option<Uuid> },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl MarketError {
    /// Text recorded in the attempt log for this outcome.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// HTTP status a REST binding would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            MarketError::NotFound(_) => 404,
            MarketError::Forbidden(_) | MarketError::SelfClaimForbidden => 403,
            MarketError::Conflict { .. } => 409,
            MarketError::Storage(_) => 503,
            MarketError::Expired
            | MarketError::InvalidState { .. }
            | MarketError::AlreadyClaimed
            | MarketError::RateLimited
            | MarketError::CapacityExceeded { .. }
            | MarketError::InsufficientFunds { .. }
            | MarketError::Validation(_) => 400,
        }
    }

    /// Only infrastructure failures are worth retrying with the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
