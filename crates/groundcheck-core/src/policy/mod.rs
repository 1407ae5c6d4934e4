//! Policy files.
//!
//! A policy is a small YAML document configuring the three tunable layers:
//! citation relevance, the quality gate, and retry budgets. Documents are
//! schema-validated before deserialization so a typo fails loudly with the
//! offending path instead of silently taking a default.

mod schema;

pub use schema::{validate_policy_schema, SchemaError};

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::GateConfig;

/// Errors from policy loading.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid policy YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Policy failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// Citation relevance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Minimum token-overlap score for a citation to count as relevant.
    ///
    /// The score is shared tokens over the union of token sets, so a short
    /// answer against a long chunk tops out well below 1.0; the default
    /// sits low on purpose.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Character budget for regenerated quotes.
    #[serde(default = "default_quote_max_len")]
    pub quote_max_len: usize,
}

fn default_threshold() -> f64 {
    0.05
}

fn default_quote_max_len() -> usize {
    200
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            quote_max_len: default_quote_max_len(),
        }
    }
}

/// Retry schedule and budget configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt ceiling for one operation (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt.
    #[serde(default = "default_base_delay", with = "duration_str")]
    pub base_delay: Duration,
    /// Hard cap on any single backoff delay.
    #[serde(default = "default_max_delay", with = "duration_str")]
    pub max_delay: Duration,
    /// Randomize delays by a factor in [0.5, 1.5).
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Quality-driven re-run ceiling per task.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Total cost budget across all attempts of a task.
    #[serde(default = "default_cost_limit")]
    pub cost_limit: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_jitter() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_cost_limit() -> f64 {
    10.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
            max_retries: default_max_retries(),
            cost_limit: default_cost_limit(),
        }
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// A complete, validated policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_version: String,
    pub name: String,
    #[serde(default)]
    pub relevance: RelevanceConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            policy_version: "1.0".to_string(),
            name: "default".to_string(),
            relevance: RelevanceConfig::default(),
            gate: GateConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Policy {
    /// Parse and schema-validate a policy from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let raw: serde_json::Value = serde_yaml::from_str(yaml)?;
        validate_policy_schema(&raw).map_err(PolicyError::Schema)?;
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a policy from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_policy_takes_defaults() {
        let policy = Policy::from_yaml(
            r#"
policy_version: "1.0"
name: "default"
"#,
        )
        .unwrap();
        assert_eq!(policy.relevance.threshold, 0.05);
        assert_eq!(policy.gate.require_citations, true);
        assert_eq!(policy.retry.max_attempts, 3);
        assert_eq!(policy.retry.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn full_policy_round_trips() {
        let policy = Policy::from_yaml(
            r#"
policy_version: "1.2"
name: "strict"
relevance:
  threshold: 0.15
  quote_max_len: 160
gate:
  require_citations: true
  require_locators: true
  min_evidence_coverage: 0.8
retry:
  max_attempts: 4
  base_delay: "250ms"
  max_delay: "10s"
  jitter: false
  max_retries: 2
  cost_limit: 3.5
"#,
        )
        .unwrap();
        assert_eq!(policy.name, "strict");
        assert_eq!(policy.relevance.threshold, 0.15);
        assert!(policy.gate.require_locators);
        assert_eq!(policy.retry.base_delay, Duration::from_millis(250));
        assert_eq!(policy.retry.max_delay, Duration::from_secs(10));
        assert!(!policy.retry.jitter);

        let yaml = serde_yaml::to_string(&policy).unwrap();
        let reparsed = Policy::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed, policy);
    }

    #[test]
    fn unknown_field_is_rejected_by_schema() {
        let err = Policy::from_yaml(
            r#"
policy_version: "1.0"
name: "default"
verbosity: high
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Schema(_)));
    }

    #[test]
    fn bad_duration_string_is_rejected() {
        let err = Policy::from_yaml(
            r#"
policy_version: "1.0"
name: "default"
retry:
  base_delay: "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn default_policy_is_schema_valid() {
        let yaml = serde_yaml::to_string(&Policy::default()).unwrap();
        assert!(Policy::from_yaml(&yaml).is_ok());
    }
}
