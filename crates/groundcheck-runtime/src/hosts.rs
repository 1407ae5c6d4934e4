//! External collaborator traits.
//!
//! The runtime never produces answers or plans itself; it drives a Router
//! and optionally a Planner and an Evaluator supplied by the host. Whatever
//! they return is untrusted input: the engine recomputes every status from
//! objective checks.

use async_trait::async_trait;
use thiserror::Error;

use groundcheck_core::{AgentResult, Task};

/// Infrastructure failures from host collaborators.
///
/// These are the only failures that propagate as errors out of the engine;
/// everything quality-related travels as statuses and warnings.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("transport failure: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Produces one answer attempt for a task.
///
/// Called once per attempt. May block on network/LLM latency; wall-clock
/// timeouts are the Router's own responsibility.
#[async_trait]
pub trait Router: Send + Sync {
    async fn run(&self, task: &Task) -> Result<AgentResult, HostError>;
}

/// Decomposes a root task into ordered subtasks. Called once per root task.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, root: &Task) -> Result<Vec<Task>, HostError>;
}

/// Verdict from a host-supplied evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl EvaluationResult {
    pub fn ok() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self { ok: false, errors }
    }
}

/// Optional host-supplied acceptance check over an agent result.
///
/// Pure and synchronous; runs after the objective checks each attempt.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, result: &AgentResult) -> EvaluationResult;
}
