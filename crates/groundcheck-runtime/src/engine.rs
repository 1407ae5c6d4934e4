//! Task execution engine.
//!
//! The engine drives one task through the attempt loop: Router call,
//! citation validation, quality gate, optional host evaluation, retry
//! decision. The agent's own status report never decides anything; it can
//! only lower confidence in an otherwise-valid result. Quality problems are
//! carried as statuses and warnings; only infrastructure failures surface
//! as errors.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use thiserror::Error;

use groundcheck_core::{
    AgentResult, Citation, CitationValidator, EventKind, EvidenceStore, Policy, ProposedStatus,
    QualityGateVerifier, ResolvedStatus, Severity, StatusError, Task, TaskStatus, VerifyResult,
};

use crate::hosts::{EvaluationResult, Evaluator, HostError, Planner, Router};
use crate::resilience::{RetryAttempt, RetryManager, RetryPolicy};

/// Errors from the execution engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("router not configured")]
    RouterNotConfigured,

    #[error("evidence store not configured")]
    StoreNotConfigured,

    #[error("host collaborator failed: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Status(#[from] StatusError),
}

/// Final report for one executed task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task_id: String,
    /// Final lifecycle status (Done or Failed).
    pub status: TaskStatus,
    /// Engine-computed status of the last attempt.
    pub resolved: ResolvedStatus,
    /// Quality warnings accumulated on the last attempt.
    pub warnings: Vec<String>,
    /// Gate verdict of the last attempt.
    pub verify: VerifyResult,
    /// Citations that survived validation on the last attempt.
    pub citations: Vec<Citation>,
    pub attempts: u32,
}

/// Report for a planned sequence of subtasks.
#[derive(Debug)]
pub struct PlanOutcome {
    /// All subtasks, including any left Blocked after an upstream failure.
    pub tasks: Vec<Task>,
    /// Reports for the subtasks that actually ran, in plan order.
    pub reports: Vec<TaskReport>,
}

/// Result of recomputing an attempt's status from objective checks.
#[derive(Debug, Clone)]
struct Outcome {
    status: ResolvedStatus,
    citations: Vec<Citation>,
    warnings: Vec<String>,
}

/// Recompute an attempt's status, never trusting the proposed one.
///
/// Decision order is fixed: a blank answer fails outright; otherwise the
/// validator decides between Success and Partial; a producer-proposed Fail
/// can then floor a valid result at Partial but never override it to Fail.
fn resolve_outcome(result: &AgentResult, validator: &CitationValidator) -> Outcome {
    if result.answer.trim().is_empty() {
        return Outcome {
            status: ResolvedStatus::Fail,
            citations: Vec::new(),
            warnings: vec!["empty_answer".to_string()],
        };
    }

    let (citations, mut warnings) = validator.validate(&result.answer, &result.citations);
    let mut status = if citations.is_empty() {
        if result.citations.is_empty() {
            warnings.push("no_valid_citations".to_string());
        }
        ResolvedStatus::Partial
    } else {
        ResolvedStatus::Success
    };

    if result.status == ProposedStatus::Fail {
        status = ResolvedStatus::Partial;
        warnings.push("agent_reported_fail_but_output_valid".to_string());
    }

    Outcome {
        status,
        citations,
        warnings,
    }
}

/// Orchestrates the attempt loop for tasks.
///
/// All collaborators are injected at construction; one engine instance owns
/// one task sequence. Independent root tasks run on separate engines.
pub struct ExecutionEngine {
    router: Arc<dyn Router>,
    evaluator: Option<Arc<dyn Evaluator>>,
    validator: CitationValidator,
    gate: QualityGateVerifier,
    policy: RetryPolicy,
    manager: RetryManager,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("evaluator", &self.evaluator.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    pub fn builder() -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new()
    }

    /// Execute one task to completion.
    ///
    /// The task moves Pending -> Running, loops through attempts, and ends
    /// Done or Failed. A Failed task always carries at least one warning or
    /// fail reason in its final report and history.
    pub async fn execute(&self, task: &mut Task) -> Result<TaskReport, EngineError> {
        task.transition(TaskStatus::Running)?;
        task.record(
            EventKind::Start,
            json!({ "category": task.category(), "priority": task.priority }),
        );
        tracing::info!(task = %task.id, category = task.category(), "task started");

        let mut attempt: u32 = 1;
        let mut previous_errors: Option<usize> = None;

        let (outcome, verify, evaluation) = loop {
            let started = Instant::now();
            let result = {
                let frozen: &Task = task;
                self.policy.execute(|| self.router.run(frozen)).await?
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let outcome = resolve_outcome(&result, &self.validator);
            let verify = match outcome.status {
                // A blank answer is terminal for the attempt; the gate is
                // skipped and the attempt is marked unverified.
                ResolvedStatus::Fail => VerifyResult::unverified(),
                _ => self
                    .gate
                    .verify(&result.answer, &outcome.citations, None, None),
            };

            let evaluation = match &self.evaluator {
                Some(evaluator) => evaluator.evaluate(&result),
                None => EvaluationResult {
                    ok: verify.gate_passed && outcome.status != ResolvedStatus::Fail,
                    errors: Vec::new(),
                },
            };

            let error_count = verify
                .fail_reasons
                .iter()
                .filter(|r| r.severity == Severity::Error)
                .count();
            let codes = verify.fail_codes();
            let remediations = self.manager.remediations(&codes);
            self.manager.record_attempt(RetryAttempt {
                attempt,
                changes: remediations.iter().map(|r| r.as_str().to_string()).collect(),
                improved: previous_errors.map(|prev| error_count < prev).unwrap_or(false),
                cost: result.cost(),
                time_ms: elapsed_ms,
            });
            previous_errors = Some(error_count);

            let decision = self.policy.decide(&evaluation, attempt);
            if !(decision.should_retry && self.manager.should_retry(&codes, attempt)) {
                break (outcome, verify, evaluation);
            }

            task.record(
                EventKind::Retry,
                json!({
                    "attempt": attempt,
                    "reason": decision.reason,
                    "fail_codes": &codes,
                    "remediations": &remediations,
                    "warnings": &outcome.warnings,
                }),
            );
            let delay = self.policy.delay_for_attempt(attempt);
            tracing::info!(
                task = %task.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                ?remediations,
                "retrying task"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        let ok = evaluation.ok;
        let mut warnings = outcome.warnings.clone();
        if !ok {
            warnings.extend(evaluation.errors.iter().cloned());
            let explained = !warnings.is_empty()
                || verify
                    .fail_reasons
                    .iter()
                    .any(|r| r.severity == Severity::Error);
            if !explained {
                // Silent downgrades are disallowed; name the cause.
                warnings.push("evaluation_failed".to_string());
            }
        }

        task.transition(if ok { TaskStatus::Done } else { TaskStatus::Failed })?;
        task.record(
            EventKind::Complete,
            json!({
                "agent_status": outcome.status,
                "quality_warnings": &warnings,
                "attempts": attempt,
                "gate_passed": verify.gate_passed,
            }),
        );
        tracing::info!(task = %task.id, status = ?task.status, attempts = attempt, "task finished");

        Ok(TaskReport {
            task_id: task.id.clone(),
            status: task.status,
            resolved: outcome.status,
            warnings,
            verify,
            citations: outcome.citations,
            attempts: attempt,
        })
    }

    /// Plan a root task and execute its subtasks in order.
    ///
    /// Subtasks run strictly sequentially. After a subtask fails, the
    /// remaining pending subtasks are marked Blocked and sequencing stops.
    pub async fn execute_plan(
        &self,
        planner: &dyn Planner,
        root: &Task,
    ) -> Result<PlanOutcome, EngineError> {
        let mut tasks = planner.plan(root).await?;
        let mut reports = Vec::new();
        let mut halted = false;

        for task in &mut tasks {
            if halted {
                if task.status == TaskStatus::Pending {
                    task.transition(TaskStatus::Blocked)?;
                    task.record(EventKind::Blocked, json!({ "cause": "upstream_failure" }));
                }
                continue;
            }
            let report = self.execute(task).await?;
            if report.status == TaskStatus::Failed {
                tracing::warn!(task = %report.task_id, "subtask failed, blocking remainder of plan");
                halted = true;
            }
            reports.push(report);
        }

        Ok(PlanOutcome { tasks, reports })
    }

    pub fn total_cost(&self) -> f64 {
        self.manager.total_cost()
    }

    pub fn attempts(&self) -> Vec<RetryAttempt> {
        self.manager.attempts()
    }
}

/// Builder for [`ExecutionEngine`].
pub struct ExecutionEngineBuilder {
    store: Option<Arc<EvidenceStore>>,
    policy: Policy,
    router: Option<Arc<dyn Router>>,
    evaluator: Option<Arc<dyn Evaluator>>,
}

impl ExecutionEngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            policy: Policy::default(),
            router: None,
            evaluator: None,
        }
    }

    pub fn store(mut self, store: Arc<EvidenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn build(self) -> Result<ExecutionEngine, EngineError> {
        let store = self.store.ok_or(EngineError::StoreNotConfigured)?;
        let router = self.router.ok_or(EngineError::RouterNotConfigured)?;
        Ok(ExecutionEngine {
            router,
            evaluator: self.evaluator,
            validator: CitationValidator::new(store, &self.policy.relevance),
            gate: QualityGateVerifier::new(self.policy.gate.clone()),
            policy: RetryPolicy::from_config(&self.policy.retry),
            manager: RetryManager::from_config(&self.policy.retry),
        })
    }
}

impl Default for ExecutionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
