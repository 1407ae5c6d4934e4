//! # groundcheck-runtime
//!
//! Async execution runtime for groundcheck.
//!
//! This crate wires the deterministic checks from `groundcheck-core` into
//! a task lifecycle: it calls a host-supplied Router for answer attempts,
//! recomputes statuses from objective checks, and drives a bounded retry
//! loop under attempt and cost budgets.
//!
//! ## Important
//!
//! The runtime produces no content itself. The Router, Planner, and
//! Evaluator are external collaborators, and everything they return is
//! treated as untrusted input.
//!
//! ## Suspension points
//!
//! Only two places block: the Router call (network/LLM latency) and the
//! inter-attempt backoff sleep. Validation and the quality gate are pure,
//! synchronous, and CPU-only.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use groundcheck_core::{EvidenceStore, Policy, Task, TaskInput};
//! use groundcheck_runtime::ExecutionEngine;
//!
//! let engine = ExecutionEngine::builder()
//!     .store(store)
//!     .policy(Policy::default())
//!     .router(Arc::new(my_router))
//!     .build()?;
//!
//! let mut task = Task::new("t1", TaskInput::Research {
//!     question: "Where is CD73 expressed?".into(),
//! });
//! let report = engine.execute(&mut task).await?;
//! ```

pub mod engine;
pub mod hosts;
pub mod resilience;

// Re-export main types at crate root
pub use engine::{EngineError, ExecutionEngine, ExecutionEngineBuilder, PlanOutcome, TaskReport};
pub use hosts::{EvaluationResult, Evaluator, HostError, Planner, Router};
pub use resilience::{
    CostBudget, RemediationAction, RetryAttempt, RetryDecision, RetryManager, RetryPolicy,
};
