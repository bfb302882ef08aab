use crate::domain::order::UserId;
use crate::domain::ports::LedgerStore;
use crate::error::StoreResult;
use chrono::{DateTime, Duration, Utc};

/// Per-executor cooldown derived from the attempt log.
///
/// Nothing is cached: every call reads the latest attempt timestamp, so
/// concurrent requests never act on a stale window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// True if the executor attempted anything within the cooldown before `now`.
    pub async fn is_limited(
        &self,
        store: &dyn LedgerStore,
        executor: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(match store.last_attempt_at(executor).await? {
            Some(last) => now.signed_duration_since(last) < self.cooldown,
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attempt::AttemptLogEntry;
    use crate::infrastructure::in_memory::InMemoryLedger;

    #[tokio::test]
    async fn test_cooldown_window() {
        let ledger = InMemoryLedger::new();
        let limiter = RateLimiter::new(Duration::seconds(5));
        let t0 = Utc::now();

        assert!(!limiter.is_limited(&ledger, 1, t0).await.unwrap());

        ledger
            .append_attempt(AttemptLogEntry::failed(Some(1), 1, None, "x", t0))
            .await
            .unwrap();

        assert!(limiter.is_limited(&ledger, 1, t0 + Duration::seconds(3)).await.unwrap());
        assert!(!limiter.is_limited(&ledger, 1, t0 + Duration::seconds(5)).await.unwrap());
        assert!(!limiter.is_limited(&ledger, 2, t0).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_cooldown_never_limits() {
        let ledger = InMemoryLedger::new();
        let limiter = RateLimiter::new(Duration::zero());
        let t0 = Utc::now();
        ledger
            .append_attempt(AttemptLogEntry::succeeded(1, 1, None, t0))
            .await
            .unwrap();
        assert!(!limiter.is_limited(&ledger, 1, t0).await.unwrap());
    }
}
