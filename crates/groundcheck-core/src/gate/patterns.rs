//! Detection patterns for the quality gate.
//!
//! Two ordered tables: over-assertive language (advisory) and PII
//! (blocking). The severity split is policy: hedging is a suggestion,
//! exposure is a stop. Tables are built once and injected into the
//! verifier at construction; nothing reads them through globals.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{FailCode, Severity};

/// One entry in a gate pattern table.
#[derive(Debug, Clone)]
pub struct PhrasePattern {
    pub pattern: Regex,
    pub code: FailCode,
    pub severity: Severity,
    /// Short name used in fail-reason messages.
    pub label: &'static str,
}

impl PhrasePattern {
    fn new(pattern: &Regex, code: FailCode, severity: Severity, label: &'static str) -> Self {
        Self {
            pattern: pattern.clone(),
            code,
            severity,
            label,
        }
    }
}

lazy_static! {
    // Over-assertion phrases. English, Spanish, and Chinese forms; the
    // list is ordered and scanned in order.
    static ref DEFINITELY: Regex = Regex::new(r"(?i)\bdefinitely\b").unwrap();
    static ref PROVES: Regex = Regex::new(r"(?i)\bprove[sdn]?\s+(that|beyond)\b").unwrap();
    static ref GUARANTEED: Regex = Regex::new(r"(?i)\bguarantee[sd]?\b").unwrap();
    static ref WITHOUT_A_DOUBT: Regex = Regex::new(r"(?i)\bwithout\s+a\s+doubt\b").unwrap();
    static ref HUNDRED_PERCENT: Regex =
        Regex::new(r"(?i)100\s*%\s*(certain|sure|proven|accurate)").unwrap();
    static ref UNDENIABLE: Regex = Regex::new(r"(?i)\bundeniabl[ye]\b").unwrap();
    static ref SIN_DUDA: Regex = Regex::new(r"(?i)\bsin\s+duda\b").unwrap();
    static ref HAOWU_YIWEN: Regex = Regex::new(r"毫无疑问").unwrap();
    static ref JUEDUI: Regex = Regex::new(r"绝对(正确|肯定|可靠)").unwrap();

    // PII patterns (email / US phone / SSN).
    static ref EMAIL: Regex =
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();
    static ref PHONE: Regex = Regex::new(
        r"(?:\+?1[-.\s]?)?(?:\([0-9]{3}\)|[0-9]{3})[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}"
    ).unwrap();
    static ref SSN: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();
}

/// Default over-assertion table, in scan order.
pub fn assertion_patterns() -> Vec<PhrasePattern> {
    use FailCode::AssertionDanger;
    use Severity::Warning;
    vec![
        PhrasePattern::new(&DEFINITELY, AssertionDanger, Warning, "definitely"),
        PhrasePattern::new(&PROVES, AssertionDanger, Warning, "proves that/beyond"),
        PhrasePattern::new(&GUARANTEED, AssertionDanger, Warning, "guaranteed"),
        PhrasePattern::new(&WITHOUT_A_DOUBT, AssertionDanger, Warning, "without a doubt"),
        PhrasePattern::new(&HUNDRED_PERCENT, AssertionDanger, Warning, "100% certain"),
        PhrasePattern::new(&UNDENIABLE, AssertionDanger, Warning, "undeniable"),
        PhrasePattern::new(&SIN_DUDA, AssertionDanger, Warning, "sin duda"),
        PhrasePattern::new(&HAOWU_YIWEN, AssertionDanger, Warning, "毫无疑问"),
        PhrasePattern::new(&JUEDUI, AssertionDanger, Warning, "绝对"),
    ]
}

/// Default PII table, in scan order.
pub fn pii_patterns() -> Vec<PhrasePattern> {
    use FailCode::PiiDetected;
    use Severity::Error;
    vec![
        PhrasePattern::new(&EMAIL, PiiDetected, Error, "email address"),
        PhrasePattern::new(&PHONE, PiiDetected, Error, "phone number"),
        PhrasePattern::new(&SSN, PiiDetected, Error, "social security number"),
    ]
}
