//! Extraction pass output
//!
//! One [`ExtractionResult`] is produced per transcript, consumed once by the
//! session evaluator, then dropped.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Severity attached to a weakness or missing element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "LOW", alias = "Low", alias = "minor")]
    Low,
    #[serde(alias = "MEDIUM", alias = "Medium", alias = "moderate")]
    Medium,
    #[serde(alias = "HIGH", alias = "High", alias = "major", alias = "critical")]
    High,
}

/// Boolean or severity qualifier on an evidence item
///
/// Meaning depends on the bucket: for metrics `Flag(true)` means the metric
/// was quantified, for claims it means the claim was supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Qualifier {
    Flag(bool),
    Severity(Severity),
}

/// One verbatim quote tagged with a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub quote: String,
    #[serde(default)]
    pub category: String,
    #[serde(
        default,
        deserialize_with = "lenient_qualifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub qualifier: Option<Qualifier>,
}

/// Accept booleans, boolean-like strings and severity words; anything else
/// is dropped rather than failing the whole extraction
fn lenient_qualifier<'de, D>(deserializer: D) -> Result<Option<Qualifier>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Bool(flag) => Some(Qualifier::Flag(flag)),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(Qualifier::Flag(true)),
            "false" | "no" => Some(Qualifier::Flag(false)),
            other => serde_json::from_value::<Severity>(Value::String(other.to_string()))
                .ok()
                .map(Qualifier::Severity),
        },
        _ => None,
    }))
}

/// Categorized evidence distilled from one transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionResult {
    pub frameworks: Vec<EvidenceItem>,
    pub metrics: Vec<EvidenceItem>,
    pub claims: Vec<EvidenceItem>,
    pub weaknesses: Vec<EvidenceItem>,
    pub strengths: Vec<EvidenceItem>,
    pub hedging: Vec<EvidenceItem>,
    pub structure_signals: Vec<EvidenceItem>,
    pub missing_elements: Vec<EvidenceItem>,
}

impl ExtractionResult {
    /// Buckets in prompt order, with their display names
    pub fn buckets(&self) -> [(&'static str, &[EvidenceItem]); 8] {
        [
            ("Frameworks", self.frameworks.as_slice()),
            ("Metrics", self.metrics.as_slice()),
            ("Claims", self.claims.as_slice()),
            ("Strengths", self.strengths.as_slice()),
            ("Weaknesses", self.weaknesses.as_slice()),
            ("Hedging", self.hedging.as_slice()),
            ("Structure signals", self.structure_signals.as_slice()),
            ("Missing elements", self.missing_elements.as_slice()),
        ]
    }

    pub fn total_items(&self) -> usize {
        self.buckets().iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}
