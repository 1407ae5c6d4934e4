//! # groundcheck-core
//!
//! Deterministic citation grounding and quality-gate verification.
//!
//! This crate decides whether an agent-produced answer is actually
//! supported by the evidence it cites, answering:
//! - Does every citation resolve to real, stored evidence?
//! - Does the cited evidence lexically support the answer?
//! - Does the answer clear the structural/quality/safety gate?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No LLM calls**: All checks are rule-based
//! 3. **Untrusting**: Producer-supplied citation fields and statuses are
//!    advisory; everything user-visible is recomputed from the store
//! 4. **Data, not exceptions**: Validation outcomes are statuses and
//!    warnings, never errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use groundcheck_core::{Citation, EvidenceStore, Groundcheck, Policy};
//!
//! let store = Arc::new(EvidenceStore::new());
//! let id = store.add_chunk("paper.pdf", "sec:3", "CD73 is expressed on regulatory T cells.");
//!
//! let checker = Groundcheck::new(store, &Policy::default());
//! let report = checker.assess("CD73 is expressed on T cells", &[Citation::new(id)], None, None);
//!
//! assert!(report.verify.gate_passed);
//! ```

pub mod evidence;
pub mod gate;
pub mod policy;
pub mod types;
pub mod validator;

// Re-export main types at crate root
pub use evidence::{chunk_id, Chunk, EvidenceStore};
pub use gate::{assertion_patterns, pii_patterns, GateConfig, PhrasePattern, QualityGateVerifier};
pub use policy::{Policy, PolicyError, RelevanceConfig, RetryConfig};
pub use types::{
    AgentResult, Citation, Claim, EvidenceLink, EventKind, FailCode, FailReason, HistoryEvent,
    ProposedStatus, ResolvedStatus, Severity, StatusError, Task, TaskInput, TaskStatus,
    VerifyResult,
};
pub use validator::CitationValidator;

use std::sync::Arc;

/// Combined validator + gate verdict for one answer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Assessment {
    /// Citations that survived validation, fields rewritten from the store.
    pub citations: Vec<Citation>,
    /// One warning per dropped citation.
    pub warnings: Vec<String>,
    /// The quality-gate verdict over the surviving citations.
    pub verify: VerifyResult,
}

/// Convenience pipeline: citation validation followed by the quality gate.
///
/// This is the main entry point for hosts that only need the verdict and
/// not the task lifecycle; the execution engine wires the same two stages
/// into its retry loop.
pub struct Groundcheck {
    validator: CitationValidator,
    gate: QualityGateVerifier,
}

impl Groundcheck {
    pub fn new(store: Arc<EvidenceStore>, policy: &Policy) -> Self {
        Self {
            validator: CitationValidator::new(store, &policy.relevance),
            gate: QualityGateVerifier::new(policy.gate.clone()),
        }
    }

    /// Validate citations and run the gate over the survivors.
    pub fn assess(
        &self,
        answer: &str,
        citations: &[Citation],
        claims: Option<&[Claim]>,
        evidence: Option<&[EvidenceLink]>,
    ) -> Assessment {
        let (valid, warnings) = self.validator.validate(answer, citations);
        let verify = self.gate.verify(answer, &valid, claims, evidence);
        Assessment {
            citations: valid,
            warnings,
            verify,
        }
    }

    pub fn validator(&self) -> &CitationValidator {
        &self.validator
    }

    pub fn gate(&self) -> &QualityGateVerifier {
        &self.gate
    }
}
