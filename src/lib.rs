//! Admission control and fee ledger for a gig marketplace.
//!
//! Customers post orders; executors pay a fee to claim one of a limited
//! number of slots on each order. [`application::engine::Marketplace`] is the
//! entry point: it runs the advisory [`application::guard`] checks, then the
//! lock-holding [`application::executor`], and records every attempt in the
//! append-only attempt log.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
