//! Rule-based quality gate.
//!
//! The gate runs a fixed, ordered rule list over an answer and its
//! validated citations and classifies every finding into the closed
//! [`FailCode`] taxonomy. The pass/fail decision is strict and
//! non-configurable: any error-severity finding fails the gate.

mod patterns;

pub use patterns::{assertion_patterns, pii_patterns, PhrasePattern};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Citation, Claim, EvidenceLink, FailCode, FailReason, VerifyResult};

/// Gate configuration. Loaded from the policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Fail with CITATION_MISSING when the answer cites nothing.
    #[serde(default = "default_require_citations")]
    pub require_citations: bool,
    /// Fail with LOCATOR_MISSING when any citation lacks a locator.
    #[serde(default)]
    pub require_locators: bool,
    /// Claim coverage floor for EVIDENCE_WEAK, in [0, 1].
    #[serde(default = "default_min_evidence_coverage")]
    pub min_evidence_coverage: f64,
}

fn default_require_citations() -> bool {
    true
}

fn default_min_evidence_coverage() -> f64 {
    0.6
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            require_citations: true,
            require_locators: false,
            min_evidence_coverage: 0.6,
        }
    }
}

/// The quality-gate rule engine.
///
/// Pattern tables are injected at construction and scanned in order;
/// the verifier itself is pure, synchronous, and reusable across tasks.
pub struct QualityGateVerifier {
    config: GateConfig,
    assertion: Vec<PhrasePattern>,
    pii: Vec<PhrasePattern>,
}

impl QualityGateVerifier {
    /// Verifier with the default pattern tables.
    pub fn new(config: GateConfig) -> Self {
        Self::with_patterns(config, assertion_patterns(), pii_patterns())
    }

    /// Verifier with caller-supplied pattern tables.
    pub fn with_patterns(
        config: GateConfig,
        assertion: Vec<PhrasePattern>,
        pii: Vec<PhrasePattern>,
    ) -> Self {
        Self {
            config,
            assertion,
            pii,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run the gate over an answer and its validated citations.
    ///
    /// `claims` and `evidence` are optional; coverage is only checked when
    /// both are supplied. Rule order is fixed: citations, locators,
    /// assertion language, PII, coverage.
    pub fn verify(
        &self,
        answer: &str,
        citations: &[Citation],
        claims: Option<&[Claim]>,
        evidence: Option<&[EvidenceLink]>,
    ) -> VerifyResult {
        let mut reasons = Vec::new();
        let mut metrics = BTreeMap::new();

        metrics.insert("citation_count".to_string(), citations.len() as f64);
        if self.config.require_citations && citations.is_empty() {
            reasons.push(FailReason::error(
                FailCode::CitationMissing,
                "answer cites no evidence",
            ));
        }

        if self.config.require_locators && !citations.is_empty() {
            let missing = citations
                .iter()
                .filter(|c| c.locator.trim().is_empty())
                .count();
            metrics.insert(
                "locator_coverage".to_string(),
                1.0 - missing as f64 / citations.len() as f64,
            );
            if missing > 0 {
                reasons.push(FailReason::error(
                    FailCode::LocatorMissing,
                    format!("{missing} citation(s) lack a locator"),
                ));
            }
        }

        let assertion_count = self.scan(&self.assertion, answer, &mut reasons);
        metrics.insert("assertion_count".to_string(), assertion_count as f64);

        let pii_count = self.scan(&self.pii, answer, &mut reasons);
        metrics.insert("pii_count".to_string(), pii_count as f64);

        if let (Some(claims), Some(evidence)) = (claims, evidence) {
            if !claims.is_empty() {
                let known: BTreeSet<&str> = claims.iter().map(|c| c.id.as_str()).collect();
                let covered: BTreeSet<&str> = evidence
                    .iter()
                    .map(|link| link.claim_id.as_str())
                    .filter(|id| known.contains(id))
                    .collect();
                let coverage = covered.len() as f64 / claims.len() as f64;
                metrics.insert("evidence_coverage".to_string(), coverage);
                if coverage < self.config.min_evidence_coverage {
                    reasons.push(FailReason::error(
                        FailCode::EvidenceWeak,
                        format!(
                            "evidence covers {:.0}% of claims, floor is {:.0}%",
                            coverage * 100.0,
                            self.config.min_evidence_coverage * 100.0
                        ),
                    ));
                }
            }
        }

        VerifyResult::from_reasons(reasons, metrics)
    }

    /// Scan one pattern table in order, emitting a reason per matched
    /// pattern. Returns the total match count.
    fn scan(&self, table: &[PhrasePattern], answer: &str, reasons: &mut Vec<FailReason>) -> usize {
        let mut total = 0;
        for entry in table {
            let hits = entry.pattern.find_iter(answer).count();
            if hits == 0 {
                continue;
            }
            total += hits;
            tracing::warn!(code = %entry.code, label = entry.label, hits, "gate pattern matched");
            reasons.push(FailReason {
                code: entry.code,
                message: format!("{} ({hits} occurrence(s))", entry.label),
                severity: entry.severity,
            });
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use proptest::prelude::*;

    fn cited(locator: &str) -> Citation {
        Citation {
            chunk_id: "c1".into(),
            source: "paper.pdf".into(),
            locator: locator.into(),
            quote: "quoted text".into(),
        }
    }

    #[test]
    fn missing_citations_fail_when_required() {
        let gate = QualityGateVerifier::new(GateConfig::default());
        let result = gate.verify("an answer", &[], None, None);
        assert!(!result.gate_passed);
        assert!(result.fail_codes().contains(&FailCode::CitationMissing));
        assert_eq!(result.metrics["citation_count"], 0.0);
    }

    #[test]
    fn missing_citations_pass_when_not_required() {
        let config = GateConfig {
            require_citations: false,
            ..GateConfig::default()
        };
        let gate = QualityGateVerifier::new(config);
        let result = gate.verify("an answer", &[], None, None);
        assert!(result.gate_passed);
    }

    #[test]
    fn locator_coverage_counts_missing_locators() {
        let config = GateConfig {
            require_locators: true,
            ..GateConfig::default()
        };
        let gate = QualityGateVerifier::new(config);
        let citations = vec![cited("sec:1"), cited(""), cited("sec:3"), cited("  ")];
        let result = gate.verify("an answer", &citations, None, None);
        assert!(!result.gate_passed);
        assert!(result.fail_codes().contains(&FailCode::LocatorMissing));
        assert_eq!(result.metrics["locator_coverage"], 0.5);
    }

    #[test]
    fn over_assertion_warns_but_passes_the_gate() {
        // Scenario: an over-assertive answer with an otherwise clean citation.
        let gate = QualityGateVerifier::new(GateConfig {
            require_locators: true,
            ..GateConfig::default()
        });
        let result = gate.verify("This is definitely proven", &[cited("sec:2")], None, None);

        let assertion = result
            .fail_reasons
            .iter()
            .find(|r| r.code == FailCode::AssertionDanger)
            .expect("assertion finding");
        assert_eq!(assertion.severity, Severity::Warning);
        assert!(result.gate_passed);
        assert!(result.metrics["assertion_count"] >= 1.0);
    }

    #[test]
    fn pii_always_blocks() {
        let gate = QualityGateVerifier::new(GateConfig::default());
        let result = gate.verify(
            "Contact the author at jane.doe@example.com",
            &[cited("sec:2")],
            None,
            None,
        );
        assert!(!result.gate_passed);
        let pii = result
            .fail_reasons
            .iter()
            .find(|r| r.code == FailCode::PiiDetected)
            .expect("pii finding");
        assert_eq!(pii.severity, Severity::Error);
        assert_eq!(result.metrics["pii_count"], 1.0);
    }

    #[test]
    fn weak_coverage_fails_strong_coverage_passes() {
        let gate = QualityGateVerifier::new(GateConfig::default());
        let claims = vec![
            Claim { id: "cl1".into(), text: "claim one".into() },
            Claim { id: "cl2".into(), text: "claim two".into() },
        ];
        let one_link = vec![EvidenceLink { claim_id: "cl1".into(), chunk_id: "c1".into() }];

        let weak = gate.verify("answer", &[cited("sec:1")], Some(&claims), Some(&one_link));
        assert!(!weak.gate_passed);
        assert!(weak.fail_codes().contains(&FailCode::EvidenceWeak));
        assert_eq!(weak.metrics["evidence_coverage"], 0.5);

        let both = vec![
            EvidenceLink { claim_id: "cl1".into(), chunk_id: "c1".into() },
            EvidenceLink { claim_id: "cl2".into(), chunk_id: "c2".into() },
        ];
        let strong = gate.verify("answer", &[cited("sec:1")], Some(&claims), Some(&both));
        assert!(strong.gate_passed);
        assert_eq!(strong.metrics["evidence_coverage"], 1.0);
    }

    #[test]
    fn links_to_unknown_claims_do_not_inflate_coverage() {
        let gate = QualityGateVerifier::new(GateConfig::default());
        let claims = vec![Claim { id: "cl1".into(), text: "t".into() }];
        let links = vec![
            EvidenceLink { claim_id: "ghost".into(), chunk_id: "c1".into() },
            EvidenceLink { claim_id: "cl1".into(), chunk_id: "c2".into() },
        ];
        let result = gate.verify("answer", &[cited("sec:1")], Some(&claims), Some(&links));
        assert_eq!(result.metrics["evidence_coverage"], 1.0);
    }

    #[test]
    fn coverage_skipped_without_claims_or_evidence() {
        let gate = QualityGateVerifier::new(GateConfig::default());
        let result = gate.verify("answer", &[cited("sec:1")], None, None);
        assert!(!result.metrics.contains_key("evidence_coverage"));
        assert!(result.gate_passed);
    }

    proptest! {
        /// The gate invariant holds for arbitrary answers and citation sets.
        #[test]
        fn gate_decision_matches_error_severities(
            answer in ".{0,120}",
            n_citations in 0usize..4,
        ) {
            let gate = QualityGateVerifier::new(GateConfig::default());
            let citations: Vec<Citation> = (0..n_citations).map(|i| cited(&format!("sec:{i}"))).collect();
            let result = gate.verify(&answer, &citations, None, None);
            let has_error = result.fail_reasons.iter().any(|r| r.severity == Severity::Error);
            prop_assert_eq!(result.gate_passed, !has_error);
            prop_assert!(result.verified);
        }
    }
}
