//! Application layer containing the claim pipeline orchestration.
//!
//! `Marketplace` is the primary entry point. A claim passes through the
//! advisory `AdmissionGuard` and then the transactional `AdmissionExecutor`;
//! both consult the attempt log, which also backs the `RateLimiter`.

mod audit;
pub mod claim;
pub mod engine;
pub mod executor;
pub mod guard;
pub mod rate_limiter;
