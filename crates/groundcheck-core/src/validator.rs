//! Citation validation against the evidence store.
//!
//! Agent-supplied citations are untrusted: the chunk id is the only field
//! that is believed, and only after it resolves in the store. Source,
//! locator, and quote are always rewritten from the stored chunk. A
//! citation that resolves but does not lexically overlap the answer is
//! dropped as irrelevant, which is a warning, never an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::evidence::EvidenceStore;
use crate::policy::RelevanceConfig;
use crate::types::Citation;

/// Resolves citations and scores answer relevance.
pub struct CitationValidator {
    store: Arc<EvidenceStore>,
    threshold: f64,
    quote_max_len: usize,
}

impl CitationValidator {
    pub fn new(store: Arc<EvidenceStore>, config: &RelevanceConfig) -> Self {
        Self {
            store,
            threshold: config.threshold,
            quote_max_len: config.quote_max_len,
        }
    }

    /// Validate a citation list against the store, in input order.
    ///
    /// Returns the surviving citations (fields rewritten from the store)
    /// and one warning per dropped citation. Zero survivors is a normal
    /// outcome; the caller decides what it means for the task.
    pub fn validate(&self, answer: &str, citations: &[Citation]) -> (Vec<Citation>, Vec<String>) {
        let answer_tokens = tokenize(answer);
        let mut valid = Vec::new();
        let mut warnings = Vec::new();

        for citation in citations {
            if citation.chunk_id.trim().is_empty() {
                warnings.push("citation_missing_chunk_id".to_string());
                continue;
            }

            let Some(chunk) = self.store.get_chunk(&citation.chunk_id) else {
                tracing::warn!(chunk_id = %citation.chunk_id, "cited chunk not in evidence store");
                warnings.push(format!("chunk_not_in_evidence_store:{}", citation.chunk_id));
                continue;
            };

            let score = overlap(&answer_tokens, &tokenize(&chunk.text));
            if score < self.threshold {
                tracing::warn!(
                    chunk_id = %chunk.id,
                    score,
                    threshold = self.threshold,
                    "cited chunk is not relevant to the answer"
                );
                warnings.push(format!("citation_not_relevant:{}", chunk.id));
                continue;
            }

            // Agent-supplied source/locator/quote are discarded here.
            valid.push(Citation {
                chunk_id: chunk.id.clone(),
                source: chunk.source.clone(),
                locator: chunk.locator.clone(),
                quote: self
                    .store
                    .get_quote(&chunk.id, self.quote_max_len)
                    .unwrap_or_default(),
            });
        }

        (valid, warnings)
    }

    /// Relevance score between an answer and a chunk text.
    pub fn relevance(&self, answer: &str, text: &str) -> f64 {
        overlap(&tokenize(answer), &tokenize(text))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Case-folded whitespace tokenization with edge punctuation trimmed.
///
/// Unbroken CJK runs come through as whole tokens; no word segmentation
/// is attempted.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Shared-token count over the union of the two token sets.
fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.union(b).count();
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn validator_with(chunks: &[(&str, &str, &str)]) -> (CitationValidator, Vec<String>) {
        let store = Arc::new(EvidenceStore::new());
        let ids = chunks
            .iter()
            .map(|(s, l, t)| store.add_chunk(s, l, t))
            .collect();
        let validator = CitationValidator::new(store, &RelevanceConfig::default());
        (validator, ids)
    }

    #[test]
    fn tokenize_folds_case_and_trims_punctuation() {
        let tokens = tokenize("CD73 is expressed on regulatory T cells.");
        assert!(tokens.contains("cd73"));
        assert!(tokens.contains("cells"));
        assert!(!tokens.contains("cells."));
    }

    #[test]
    fn relevant_citation_survives_with_rewritten_fields() {
        let (validator, ids) = validator_with(&[(
            "immunology-review.pdf",
            "sec:3.1",
            "CD73 is expressed on regulatory T cells.",
        )]);

        let mut citation = Citation::new(ids[0].clone());
        citation.source = "agent-invented.pdf".into();
        citation.quote = "something the agent made up".into();

        let (valid, warnings) =
            validator.validate("CD73 is expressed on T cells", &[citation]);
        assert_eq!(valid.len(), 1);
        assert!(warnings.is_empty());
        assert_eq!(valid[0].source, "immunology-review.pdf");
        assert_eq!(valid[0].locator, "sec:3.1");
        assert_eq!(valid[0].quote, "CD73 is expressed on regulatory T cells.");
    }

    #[test]
    fn empty_chunk_id_is_dropped_with_warning() {
        let (validator, _) = validator_with(&[("s", "l", "text")]);
        let (valid, warnings) = validator.validate("answer", &[Citation::new("")]);
        assert!(valid.is_empty());
        assert_eq!(warnings, vec!["citation_missing_chunk_id".to_string()]);
    }

    #[test]
    fn unresolvable_chunk_id_is_dropped_with_warning() {
        let (validator, _) = validator_with(&[("s", "l", "text")]);
        let (valid, warnings) =
            validator.validate("answer", &[Citation::new("missing-id")]);
        assert!(valid.is_empty());
        assert_eq!(
            warnings,
            vec!["chunk_not_in_evidence_store:missing-id".to_string()]
        );
    }

    #[test]
    fn irrelevant_citation_is_dropped_with_warning() {
        let (validator, ids) = validator_with(&[(
            "cookbook.pdf",
            "p:12",
            "Simmer the onions until translucent before adding stock.",
        )]);
        let (valid, warnings) = validator.validate(
            "CD73 is expressed on T cells",
            &[Citation::new(ids[0].clone())],
        );
        assert!(valid.is_empty());
        assert_eq!(warnings, vec![format!("citation_not_relevant:{}", ids[0])]);
    }

    #[test]
    fn drops_and_survivors_mix_in_input_order() {
        let (validator, ids) = validator_with(&[
            ("paper.pdf", "sec:2", "CD73 is expressed on regulatory T cells."),
            ("paper.pdf", "sec:9", "Acknowledgements and funding statements."),
        ]);
        let citations = vec![
            Citation::new(ids[0].clone()),
            Citation::new("bogus"),
            Citation::new(ids[1].clone()),
        ];
        let (valid, warnings) =
            validator.validate("CD73 is expressed on T cells", &citations);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].chunk_id, ids[0]);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn zero_citations_is_a_normal_outcome() {
        let (validator, _) = validator_with(&[("s", "l", "text")]);
        let (valid, warnings) = validator.validate("answer", &[]);
        assert!(valid.is_empty());
        assert!(warnings.is_empty());
    }

    proptest! {
        /// Every survivor resolves in the store and meets the threshold.
        #[test]
        fn survivors_resolve_and_overlap(
            answer in "[a-z]{2,8}( [a-z]{2,8}){0,6}",
            texts in proptest::collection::vec("[a-z]{2,8}( [a-z]{2,8}){0,6}", 1..4),
        ) {
            let store = Arc::new(EvidenceStore::new());
            let citations: Vec<Citation> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| Citation::new(store.add_chunk("s", &format!("l{i}"), t)))
                .collect();
            let validator = CitationValidator::new(store.clone(), &RelevanceConfig::default());

            let (valid, _) = validator.validate(&answer, &citations);
            for citation in valid {
                prop_assert!(store.has_chunk(&citation.chunk_id));
                let chunk = store.get_chunk(&citation.chunk_id).unwrap();
                prop_assert!(validator.relevance(&answer, &chunk.text) >= validator.threshold());
            }
        }
    }
}
