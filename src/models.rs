//! Data models for the lab report reviewer.
//!
//! This module contains the core data structures shared by the store,
//! the analysis engine, the note composer and the HTTP service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Processing status of a lab report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    /// Waiting to be picked up.
    Pending,
    /// Picked up by a clinician but not yet reviewed.
    #[serde(rename = "In-progress")]
    InProgress,
    /// Reviewed and a note has been drafted. Terminal.
    Processed,
}

impl ReportStatus {
    /// Whether a report with this status belongs in the pending queue.
    pub fn is_pending(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::InProgress)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "Pending"),
            ReportStatus::InProgress => write!(f, "In-progress"),
            ReportStatus::Processed => write!(f, "Processed"),
        }
    }
}

/// Raw measurement payload of a report.
///
/// Laboratory panels carry named numeric values; imaging studies carry
/// free-form narrative text. On the wire this is either a JSON object or
/// a JSON string. Structured values keep their key order and number
/// representation exactly as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawData {
    Structured(Map<String, Value>),
    Narrative(String),
}

impl RawData {
    /// Build a structured payload from a JSON object.
    ///
    /// Anything other than an object is kept as narrative text.
    pub fn structured(values: Value) -> Self {
        match values {
            Value::Object(map) => RawData::Structured(map),
            other => RawData::Narrative(other.to_string()),
        }
    }

    /// Build a narrative payload.
    pub fn narrative(text: impl Into<String>) -> Self {
        RawData::Narrative(text.into())
    }

    /// Render the payload for inclusion in a prompt.
    ///
    /// Structured values are emitted as JSON, narrative text verbatim.
    pub fn to_prompt_text(&self) -> String {
        match self {
            RawData::Structured(values) => {
                serde_json::to_string(values).unwrap_or_else(|_| format!("{:?}", values))
            }
            RawData::Narrative(text) => text.clone(),
        }
    }
}

/// Coarse triage category assigned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum RiskLevel {
    #[default]
    Routine,
    Urgent,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Routine => write!(f, "Routine"),
            RiskLevel::Urgent => write!(f, "Urgent"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

impl From<&str> for RiskLevel {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "urgent" => RiskLevel::Urgent,
            "critical" => RiskLevel::Critical,
            _ => RiskLevel::Routine,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(s: String) -> Self {
        RiskLevel::from(s.as_str())
    }
}

/// Accepts any JSON value: strings are matched leniently, everything
/// else (null, numbers, objects) becomes `Routine`.
impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::String(s)) => RiskLevel::from(s.as_str()),
            _ => RiskLevel::Routine,
        })
    }
}

impl RiskLevel {
    /// Returns the icon used on the recommended-action line of a note.
    pub fn icon(&self) -> &'static str {
        match self {
            RiskLevel::Routine => "✅",
            RiskLevel::Urgent => "⚠️",
            RiskLevel::Critical => "🚨",
        }
    }
}

/// Structured interpretation of a single report.
///
/// Fields missing from the model's JSON fall back to neutral defaults so a
/// partially filled object still yields a usable note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Short findings, in the order the model listed them.
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Severity label from the hospital policy, e.g. "Level 4".
    #[serde(default = "default_policy_level")]
    pub policy_level: String,
    #[serde(default = "default_summary")]
    pub summary: String,
    /// Policy line the assessment relies on, quoted verbatim.
    #[serde(default = "default_policy_citation")]
    pub policy_citation: String,
    /// Plain-language explanation for the patient.
    #[serde(default = "default_analogy")]
    pub analogy: String,
}

fn default_policy_level() -> String {
    "Standard".to_string()
}

fn default_summary() -> String {
    "Analysis complete.".to_string()
}

fn default_policy_citation() -> String {
    "Standard policy.".to_string()
}

fn default_analogy() -> String {
    "None".to_string()
}

impl Analysis {
    /// The degraded analysis produced when the model call or parsing fails.
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            findings: vec!["Error parsing AI response".to_string()],
            risk_level: RiskLevel::Routine,
            policy_level: "Error".to_string(),
            summary: "AI Failed to generate valid JSON.".to_string(),
            policy_citation: "N/A".to_string(),
            analogy: format!("System Error: {}", error),
        }
    }

    /// Whether this analysis was produced by the failure path.
    pub fn is_failure(&self) -> bool {
        self.policy_level == "Error"
    }
}

/// Analysis as attached to a report returned by the HTTP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub risk_level: RiskLevel,
    pub policy_level: String,
    pub summary: String,
    pub policy_rule: String,
    pub child_analogy: String,
    pub findings: Vec<String>,
}

impl From<&Analysis> for AiAnalysis {
    fn from(analysis: &Analysis) -> Self {
        Self {
            risk_level: analysis.risk_level,
            policy_level: analysis.policy_level.clone(),
            summary: analysis.summary.clone(),
            policy_rule: analysis.policy_citation.clone(),
            child_analogy: analysis.analogy.clone(),
            findings: analysis.findings.clone(),
        }
    }
}

/// A clinical lab report awaiting (or past) review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Unique identifier.
    pub id: String,
    #[serde(rename = "patientName")]
    pub patient_name: String,
    pub age: u32,
    /// Investigation name, e.g. "Renal Function".
    #[serde(rename = "testName")]
    pub test_name: String,
    pub status: ReportStatus,
    pub raw_data: RawData,
    /// Prior results of the same shape, when available.
    pub history: Option<RawData>,
    /// Latest analysis, attached once the report has been processed.
    #[serde(rename = "aiAnalysis", skip_serializing_if = "Option::is_none", default)]
    pub ai_analysis: Option<AiAnalysis>,
}

impl Report {
    /// Patient name with spaces replaced, as used in note filenames.
    pub fn file_safe_name(&self) -> String {
        self.patient_name.replace(' ', "_")
    }
}
