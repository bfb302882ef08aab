use super::claim::ClaimRequest;
use crate::domain::attempt::AttemptLogEntry;
use crate::domain::order::OrderId;
use crate::domain::ports::LedgerStore;
use crate::error::MarketError;
use chrono::{DateTime, Utc};

/// Appends a failed attempt for `err` and hands the error back for surfacing.
///
/// The entry is written in its own unit of work. If the log itself cannot be
/// written the caller gets the storage failure instead, since the rejection
/// would otherwise go unrecorded.
pub(crate) async fn record_rejection(
    store: &dyn LedgerStore,
    request: &ClaimRequest,
    order: Option<OrderId>,
    err: MarketError,
    now: DateTime<Utc>,
) -> MarketError {
    tracing::warn!(
        order = request.order,
        executor = request.executor,
        reason = %err,
        "claim rejected"
    );

    let entry = AttemptLogEntry::failed(
        order,
        request.executor,
        request.idempotency_key.clone(),
        err.reason(),
        now,
    );
    match store.append_attempt(entry).await {
        Ok(()) => err,
        Err(log_err) => {
            tracing::error!(
                order = request.order,
                executor = request.executor,
                error = %log_err,
                "failed to append rejected attempt to the audit log"
            );
            if err.is_retryable() {
                err
            } else {
                MarketError::Storage(log_err)
            }
        }
    }
}
