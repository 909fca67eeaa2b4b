//! Policy-bound analysis of a single lab report.
//!
//! The engine builds a two-message prompt (system + user), sends it to the
//! model and parses the JSON reply into an [`Analysis`]. Failures never
//! escape: a model or parse error yields [`Analysis::failed`].

use crate::agent::client::{ChatMessage, ClientError, ModelClient};
use crate::models::{Analysis, Report};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a model reply could not be turned into an analysis.
#[derive(Debug, Error)]
enum AnalysisError {
    #[error("{0}")]
    Model(#[from] ClientError),

    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}

/// Turns reports into structured analyses using a chat model.
#[derive(Clone)]
pub struct AnalysisEngine {
    client: Arc<dyn ModelClient>,
}

impl AnalysisEngine {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Analyze a report against the given policy text. Never fails.
    pub async fn analyze(&self, report: &Report, policy_text: &str) -> Analysis {
        info!(
            "Analyzing {} ({}) with {}",
            report.id,
            report.test_name,
            self.client.model_name()
        );

        match self.try_analyze(report, policy_text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Analysis of {} failed: {}", report.id, e);
                Analysis::failed(e)
            }
        }
    }

    async fn try_analyze(&self, report: &Report, policy_text: &str) -> Result<Analysis, AnalysisError> {
        let messages = build_messages(report, policy_text);
        let response = self.client.complete(&messages).await?;
        debug!("Model replied with {} bytes", response.len());

        Ok(parse_analysis(&response)?)
    }
}

/// Build the system and user messages for a report.
pub fn build_messages(report: &Report, policy_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_user_prompt(report, policy_text)),
    ]
}

fn build_user_prompt(report: &Report, policy_text: &str) -> String {
    let history = report
        .history
        .as_ref()
        .map(|h| h.to_prompt_text())
        .unwrap_or_else(|| "No prior history".to_string());

    let mut prompt = String::new();
    prompt.push_str("Analyze this investigation result STRICTLY based on the provided HOSPITAL POLICY.\n\n");
    prompt.push_str("HOSPITAL POLICY:\n\"\"\"\n");
    prompt.push_str(policy_text);
    prompt.push_str("\n\"\"\"\n\n");
    prompt.push_str(&format!(
        "PATIENT: {} ({} years old)\n",
        report.patient_name, report.age
    ));
    prompt.push_str(&format!("TEST: {}\n", report.test_name));
    prompt.push_str(&format!("DATA: {}\n", report.raw_data.to_prompt_text()));
    prompt.push_str(&format!("HISTORY: {}\n\n", history));
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_FORMAT);

    prompt
}

/// Remove markdown code fences the model may wrap around its JSON.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Parse a model reply into an analysis.
fn parse_analysis(response: &str) -> Result<Analysis, serde_json::Error> {
    serde_json::from_str(strip_code_fences(response))
}

const SYSTEM_PROMPT: &str = "You are a specialized Clinical AI Assistant. \
You must strictly follow the provided HOSPITAL POLICY.";

const INSTRUCTIONS: &str = r#"INSTRUCTIONS:
1. Compare the data against the "CRITICAL VALUE THRESHOLDS" in the Policy.
2. Assign the specific Policy Level (e.g., "Level 4", "Level 5").
3. Quote the exact line from the policy that applies.
4. Explain the condition like you are talking to a 5-year-old child (e.g. using superheroes, cars, gardens)."#;

const OUTPUT_FORMAT: &str = r#"OUTPUT FORMAT:
Return ONLY valid JSON: a single object with exactly these fields.
{
  "findings": ["finding 1", "finding 2"],
  "risk_level": "Routine" | "Urgent" | "Critical",
  "policy_level": "Level X",
  "summary": "Clinical summary string",
  "policy_citation": "Exact line from policy",
  "analogy": "Creative explanation for a child"
}"#;
