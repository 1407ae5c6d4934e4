//! Resilience machinery for the execution engine.
//!
//! This module provides:
//! - Exponential backoff with jitter
//! - Retry decisions from evaluations and fail codes
//! - Cost budgets and the append-only attempt ledger

mod budget;
mod retry;

pub use budget::CostBudget;
pub use retry::{
    RemediationAction, RetryAttempt, RetryDecision, RetryManager, RetryPolicy,
    REASON_MAX_ATTEMPTS, REASON_VALIDATION_FAILED,
};
