//! Shared data model for groundcheck.
//!
//! Everything that crosses a component boundary lives here: citations and
//! their fail-code taxonomy, agent results, verification verdicts, and the
//! task lifecycle. Wire names are stable; external tooling matches on them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed vocabulary of failure conditions.
///
/// Shared by the quality gate, the retry manager, and external tooling.
/// Wire names are SCREAMING_SNAKE_CASE and must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailCode {
    /// Answer cites no evidence although citations are required.
    CitationMissing,
    /// One or more citations lack a locator.
    LocatorMissing,
    /// Claim/evidence coverage fell below the configured floor.
    EvidenceWeak,
    /// Over-assertive language detected in the answer.
    AssertionDanger,
    /// Personally identifiable information detected in the answer.
    PiiDetected,
    /// Upstream fetch failed (infrastructure).
    FetchFail,
    /// Required index is absent (infrastructure).
    IndexMissing,
    /// A cost or attempt budget was exhausted (infrastructure).
    BudgetExceeded,
    /// The gate was bypassed entirely; the result is unverified.
    VerifyNotRun,
}

impl FailCode {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailCode::CitationMissing => "CITATION_MISSING",
            FailCode::LocatorMissing => "LOCATOR_MISSING",
            FailCode::EvidenceWeak => "EVIDENCE_WEAK",
            FailCode::AssertionDanger => "ASSERTION_DANGER",
            FailCode::PiiDetected => "PII_DETECTED",
            FailCode::FetchFail => "FETCH_FAIL",
            FailCode::IndexMissing => "INDEX_MISSING",
            FailCode::BudgetExceeded => "BUDGET_EXCEEDED",
            FailCode::VerifyNotRun => "VERIFY_NOT_RUN",
        }
    }

    /// Whether a remediation strategy exists for this code.
    ///
    /// Retryable codes are the structural/grounding and quality classes;
    /// they can be fixed by gathering more evidence or rewriting content.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailCode::CitationMissing
                | FailCode::LocatorMissing
                | FailCode::EvidenceWeak
                | FailCode::AssertionDanger
        )
    }

    /// Whether this code terminates the retry loop regardless of budget.
    ///
    /// Safety findings and infrastructure failures are never retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FailCode::PiiDetected
                | FailCode::FetchFail
                | FailCode::IndexMissing
                | FailCode::BudgetExceeded
                | FailCode::VerifyNotRun
        )
    }
}

impl std::fmt::Display for FailCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a gate finding. Only `Error` blocks the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A single classified failure produced by the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailReason {
    pub code: FailCode,
    pub message: String,
    pub severity: Severity,
}

impl FailReason {
    pub fn error(code: FailCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(code: FailCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Verdict of one quality-gate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// True iff no fail reason carries `Severity::Error`.
    pub gate_passed: bool,
    pub fail_reasons: Vec<FailReason>,
    /// Named measurements (citation_count, locator_coverage, ...).
    /// BTreeMap for deterministic iteration and serialization order.
    pub metrics: BTreeMap<String, f64>,
    /// False only when the gate itself was skipped.
    pub verified: bool,
}

impl VerifyResult {
    /// Build a verdict from collected reasons, deriving `gate_passed`.
    ///
    /// This is the only construction path for verified results, so the
    /// `gate_passed == !any(error)` invariant holds by construction.
    pub fn from_reasons(fail_reasons: Vec<FailReason>, metrics: BTreeMap<String, f64>) -> Self {
        let gate_passed = !fail_reasons
            .iter()
            .any(|r| r.severity == Severity::Error);
        Self {
            gate_passed,
            fail_reasons,
            metrics,
            verified: true,
        }
    }

    /// Verdict for a run where the gate was bypassed entirely.
    ///
    /// Always a hard failure: an unverified answer never passes.
    pub fn unverified() -> Self {
        Self {
            gate_passed: false,
            fail_reasons: vec![FailReason::error(
                FailCode::VerifyNotRun,
                "quality gate was not run",
            )],
            metrics: BTreeMap::new(),
            verified: false,
        }
    }

    /// Codes of all recorded fail reasons, in rule order.
    pub fn fail_codes(&self) -> Vec<FailCode> {
        self.fail_reasons.iter().map(|r| r.code).collect()
    }
}

/// An agent's claim that a specific chunk supports part of its answer.
///
/// `source`, `locator`, and `quote` are producer-supplied and untrusted;
/// the validator rewrites all three from the resolved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub chunk_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub locator: String,
    #[serde(default)]
    pub quote: String,
}

impl Citation {
    pub fn new(chunk_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            source: String::new(),
            locator: String::new(),
            quote: String::new(),
        }
    }
}

/// A discrete assertion extracted from an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub text: String,
}

/// A link asserting that a chunk supports a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub claim_id: String,
    pub chunk_id: String,
}

/// Status as reported by the producing agent. Advisory only: it can lower
/// confidence in an otherwise-valid result but never raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposedStatus {
    Success,
    Partial,
    Fail,
}

/// Status as recomputed by the engine from objective checks. Authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedStatus {
    Success,
    Partial,
    Fail,
}

/// Output of one Router invocation. Always treated as untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub status: ProposedStatus,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl AgentResult {
    /// Cost reported by the producer in `meta.cost`, or 0.0.
    pub fn cost(&self) -> f64 {
        self.meta
            .get("cost")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
    Blocked,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Rejected task status transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal status transition: {from:?} -> {to:?}")]
pub struct StatusError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Per-category task input.
///
/// Tagged variants instead of an open map: each category names its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum TaskInput {
    /// Answer a question from the evidence base.
    Research { question: String },
    /// Synthesize an answer over a fixed set of chunks.
    Synthesis {
        instruction: String,
        chunk_ids: Vec<String>,
    },
    /// Re-check an existing draft answer.
    Review { draft: String },
}

impl TaskInput {
    pub fn category(&self) -> &'static str {
        match self {
            TaskInput::Research { .. } => "research",
            TaskInput::Synthesis { .. } => "synthesis",
            TaskInput::Review { .. } => "review",
        }
    }
}

/// Kind of a task history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Retry,
    Complete,
    Blocked,
}

/// One entry in a task's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub status: TaskStatus,
    pub payload: serde_json::Value,
}

/// A unit of work executed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub input: TaskInput,
    pub status: TaskStatus,
    /// Append-only ordered event log. Never rewritten.
    pub history: Vec<HistoryEvent>,
    pub priority: u8,
}

impl Task {
    pub fn new(id: impl Into<String>, input: TaskInput) -> Self {
        Self {
            id: id.into(),
            input,
            status: TaskStatus::Pending,
            history: Vec::new(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn category(&self) -> &'static str {
        self.input.category()
    }

    /// Apply a status transition, rejecting anything non-monotonic.
    ///
    /// Allowed: Pending -> Running | Blocked, Blocked -> Running,
    /// Running -> Done | Failed. Done and Failed are terminal.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), StatusError> {
        let ok = matches!(
            (self.status, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Blocked)
                | (TaskStatus::Blocked, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Done)
                | (TaskStatus::Running, TaskStatus::Failed)
        );
        if !ok {
            return Err(StatusError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Append an event carrying the task's current status.
    pub fn record(&mut self, kind: EventKind, payload: serde_json::Value) {
        self.history.push(HistoryEvent {
            at: Utc::now(),
            kind,
            status: self.status,
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fail_code_wire_names_are_stable() {
        let codes = [
            (FailCode::CitationMissing, "CITATION_MISSING"),
            (FailCode::LocatorMissing, "LOCATOR_MISSING"),
            (FailCode::EvidenceWeak, "EVIDENCE_WEAK"),
            (FailCode::AssertionDanger, "ASSERTION_DANGER"),
            (FailCode::PiiDetected, "PII_DETECTED"),
            (FailCode::FetchFail, "FETCH_FAIL"),
            (FailCode::IndexMissing, "INDEX_MISSING"),
            (FailCode::BudgetExceeded, "BUDGET_EXCEEDED"),
            (FailCode::VerifyNotRun, "VERIFY_NOT_RUN"),
        ];
        for (code, wire) in codes {
            assert_eq!(code.as_str(), wire);
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", wire));
        }
    }

    #[test]
    fn retryable_and_terminal_never_overlap() {
        let all = [
            FailCode::CitationMissing,
            FailCode::LocatorMissing,
            FailCode::EvidenceWeak,
            FailCode::AssertionDanger,
            FailCode::PiiDetected,
            FailCode::FetchFail,
            FailCode::IndexMissing,
            FailCode::BudgetExceeded,
            FailCode::VerifyNotRun,
        ];
        for code in all {
            assert!(!(code.is_retryable() && code.is_terminal()), "{code}");
        }
    }

    #[test]
    fn unverified_is_always_a_hard_failure() {
        let v = VerifyResult::unverified();
        assert!(!v.gate_passed);
        assert!(!v.verified);
        assert_eq!(v.fail_codes(), vec![FailCode::VerifyNotRun]);
        assert_eq!(v.fail_reasons[0].severity, Severity::Error);
    }

    #[test]
    fn task_happy_path_transitions() {
        let mut task = Task::new("t1", TaskInput::Research {
            question: "q".into(),
        });
        assert_eq!(task.status, TaskStatus::Pending);
        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Done).unwrap();
        assert!(task.transition(TaskStatus::Running).is_err());
        assert!(task.transition(TaskStatus::Pending).is_err());
    }

    #[test]
    fn blocked_can_resume_but_terminal_cannot() {
        let mut task = Task::new("t2", TaskInput::Review { draft: "d".into() });
        task.transition(TaskStatus::Blocked).unwrap();
        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Failed).unwrap();
        assert!(task.transition(TaskStatus::Blocked).is_err());
    }

    #[test]
    fn history_is_append_only_and_ordered() {
        let mut task = Task::new("t3", TaskInput::Research {
            question: "q".into(),
        });
        task.transition(TaskStatus::Running).unwrap();
        task.record(EventKind::Start, serde_json::json!({}));
        task.record(EventKind::Retry, serde_json::json!({ "attempt": 1 }));
        task.transition(TaskStatus::Done).unwrap();
        task.record(EventKind::Complete, serde_json::json!({}));

        let kinds: Vec<EventKind> = task.history.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Start, EventKind::Retry, EventKind::Complete]);
        assert!(task.history.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn agent_result_cost_parses_meta() {
        let mut meta = BTreeMap::new();
        meta.insert("cost".to_string(), "2.5".to_string());
        let result = AgentResult {
            answer: "a".into(),
            citations: vec![],
            status: ProposedStatus::Success,
            meta,
        };
        assert_eq!(result.cost(), 2.5);

        let no_meta = AgentResult {
            answer: "a".into(),
            citations: vec![],
            status: ProposedStatus::Success,
            meta: BTreeMap::new(),
        };
        assert_eq!(no_meta.cost(), 0.0);
    }

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Running),
            Just(TaskStatus::Done),
            Just(TaskStatus::Failed),
            Just(TaskStatus::Blocked),
        ]
    }

    proptest! {
        /// A terminal task never changes status again, whatever is thrown at it.
        #[test]
        fn terminal_status_is_sticky(attempts in proptest::collection::vec(arb_status(), 0..16)) {
            let mut task = Task::new("p", TaskInput::Review { draft: "d".into() });
            task.transition(TaskStatus::Running).unwrap();
            task.transition(TaskStatus::Done).unwrap();
            for to in attempts {
                prop_assert!(task.transition(to).is_err());
                prop_assert_eq!(task.status, TaskStatus::Done);
            }
        }

        /// gate_passed is exactly "no error-severity reason", for any mix.
        #[test]
        fn gate_passed_matches_severities(errors in 0usize..4, warnings in 0usize..4) {
            let mut reasons = Vec::new();
            for _ in 0..errors {
                reasons.push(FailReason::error(FailCode::PiiDetected, "e"));
            }
            for _ in 0..warnings {
                reasons.push(FailReason::warning(FailCode::AssertionDanger, "w"));
            }
            let v = VerifyResult::from_reasons(reasons, BTreeMap::new());
            prop_assert_eq!(v.gate_passed, errors == 0);
            prop_assert!(v.verified);
        }
    }
}
