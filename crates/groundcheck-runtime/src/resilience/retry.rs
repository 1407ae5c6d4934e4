//! Retry policy and the quality-driven retry manager.
//!
//! Two layers with different jobs:
//! - [`RetryPolicy`] retries one operation against transient failure:
//!   capped exponential backoff, optional jitter, last error re-raised.
//! - [`RetryManager`] decides whether a whole task deserves another
//!   attempt, from the fail-code taxonomy, the attempt count, and the
//!   cost budget. Safety and infrastructure codes always terminate.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use groundcheck_core::{FailCode, RetryConfig};

use super::budget::CostBudget;
use crate::hosts::EvaluationResult;

pub const REASON_VALIDATION_FAILED: &str = "validation_failed";
pub const REASON_MAX_ATTEMPTS: &str = "max_attempts_reached";

/// Backoff schedule for retrying a single operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
        }
    }

    /// Delay before attempt `attempt + 1`.
    ///
    /// `min(max_delay, base_delay * 2^(attempt-1))`, scaled by a factor in
    /// [0.5, 1.5) when jitter is enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = self.base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delay = if self.jitter {
            capped * (0.5 + rand_simple())
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }

    /// Run `op` until it succeeds or attempts are exhausted, sleeping the
    /// scheduled delay between attempts. The last error is re-raised.
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "operation failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Retry decision from an evaluation verdict.
    pub fn decide(&self, evaluation: &EvaluationResult, attempt: u32) -> RetryDecision {
        if evaluation.ok {
            return RetryDecision {
                should_retry: false,
                reason: String::new(),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision {
                should_retry: false,
                reason: REASON_MAX_ATTEMPTS.to_string(),
            };
        }
        RetryDecision {
            should_retry: true,
            reason: REASON_VALIDATION_FAILED.to_string(),
        }
    }
}

/// Outcome of a [`RetryPolicy::decide`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub reason: String,
}

/// Simple pseudo-random for jitter (avoid heavy rand dependency)
fn rand_simple() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    (hasher.finish() as f64) / (u64::MAX as f64)
}

/// Remediation strategy attached to a retryable fail code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Run an additional evidence search.
    AddSearch,
    /// Extract locators for existing citations.
    ExtractLocators,
    /// Broaden the evidence search.
    ExpandSearch,
    /// Rewrite over-assertive language with hedges.
    SoftenLanguage,
}

impl RemediationAction {
    pub fn for_code(code: FailCode) -> Option<Self> {
        match code {
            FailCode::CitationMissing => Some(Self::AddSearch),
            FailCode::LocatorMissing => Some(Self::ExtractLocators),
            FailCode::EvidenceWeak => Some(Self::ExpandSearch),
            FailCode::AssertionDanger => Some(Self::SoftenLanguage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddSearch => "add_search",
            Self::ExtractLocators => "extract_locators",
            Self::ExpandSearch => "expand_search",
            Self::SoftenLanguage => "soften_language",
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the attempt ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    pub attempt: u32,
    /// Remediations applied going into this attempt.
    pub changes: Vec<String>,
    /// Whether this attempt had fewer blocking findings than the last.
    pub improved: bool,
    pub cost: f64,
    pub time_ms: u64,
}

/// Quality-driven retry gate with an append-only attempt ledger.
pub struct RetryManager {
    max_retries: u32,
    budget: CostBudget,
    ledger: RwLock<Vec<RetryAttempt>>,
}

impl RetryManager {
    pub fn new(max_retries: u32, cost_limit: f64) -> Self {
        Self {
            max_retries,
            budget: CostBudget::new(cost_limit),
            ledger: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.cost_limit)
    }

    /// Whether another attempt is allowed for these fail codes.
    ///
    /// Terminal codes (safety, infrastructure) refuse immediately; anything
    /// else needs attempt headroom, budget headroom, and at least one code
    /// with a known remediation.
    pub fn should_retry(&self, fail_codes: &[FailCode], attempt: u32) -> bool {
        if fail_codes.iter().any(|code| code.is_terminal()) {
            return false;
        }
        attempt < self.max_retries
            && !self.budget.exhausted()
            && fail_codes.iter().any(|code| code.is_retryable())
    }

    /// Distinct remediations for these codes, in code order.
    pub fn remediations(&self, fail_codes: &[FailCode]) -> Vec<RemediationAction> {
        let mut actions = Vec::new();
        for code in fail_codes {
            if let Some(action) = RemediationAction::for_code(*code) {
                if !actions.contains(&action) {
                    actions.push(action);
                }
            }
        }
        actions
    }

    /// Append to the ledger and charge the budget.
    pub fn record_attempt(&self, attempt: RetryAttempt) {
        self.budget.record(attempt.cost);
        self.ledger.write().push(attempt);
    }

    pub fn total_cost(&self) -> f64 {
        self.budget.spent()
    }

    pub fn attempts(&self) -> Vec<RetryAttempt> {
        self.ledger.read().clone()
    }
}
