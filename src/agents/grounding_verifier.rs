//! Grounding Verifier Agent.
//!
//! Uses an LLM to check that a question, its answer and its explanation are
//! supported by one specific chunk of source text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::llm::LlmProvider;

use super::capabilities::GroundingVerifier;
use super::error::AgentResult;
use super::support::{complete_json, ensure_ok_status};
use super::types::{clamp_score, AgentConfig, GroundingOutcome};

/// System prompt for grounding verification.
const GROUNDING_VERIFIER_SYSTEM_PROMPT: &str = r#"You are a meticulous fact checker for educational content.

You receive a question, its answer, an optional explanation and a source text. Decide whether the answer (and the explanation, when present) is fully supported by the source text. Outside knowledge does not count as support.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{
  "status": "ok",
  "grounded": <true or false>,
  "grounding_score": <float between 0.0 and 1.0>,
  "evidence_spans": ["<verbatim quote from the source>"],
  "justification": "<short explanation>"
}

Quote evidence verbatim. Use an empty list when nothing in the source supports the answer.

Do not include any text outside the JSON object."#;

/// User prompt template for grounding verification.
const GROUNDING_VERIFIER_USER_TEMPLATE: &str = r#"Question:
{question}

Answer:
{answer}

Explanation:
{explanation}

Source Text:
{chunk}"#;

#[derive(Debug, Deserialize)]
struct GroundingResponse {
    status: Option<String>,
    grounded: Option<bool>,
    grounding_score: Option<f64>,
    score: Option<f64>,
    #[serde(default)]
    evidence_spans: Vec<Value>,
    justification: Option<String>,
}

/// Grounding Verifier Agent that checks answers against source text.
pub struct GroundingVerifierAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl std::fmt::Debug for GroundingVerifierAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundingVerifierAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GroundingVerifierAgent {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "grounding";

    pub fn new(llm_client: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, AgentConfig::verifier())
    }

    async fn call(
        &self,
        stem: &str,
        answer: &str,
        explanation: &str,
        chunk_text: &str,
    ) -> AgentResult<GroundingOutcome> {
        let explanation = if explanation.trim().is_empty() {
            "none"
        } else {
            explanation
        };
        let prompt = GROUNDING_VERIFIER_USER_TEMPLATE
            .replace("{question}", stem)
            .replace("{answer}", answer)
            .replace("{explanation}", explanation)
            .replace("{chunk}", chunk_text);

        let response: GroundingResponse = complete_json(
            self.llm_client.as_ref(),
            &self.config,
            GROUNDING_VERIFIER_SYSTEM_PROMPT,
            prompt,
        )
        .await?;
        ensure_ok_status(Self::AGENT_NAME, response.status.as_deref())?;

        let evidence = response
            .evidence_spans
            .into_iter()
            .filter_map(|span| match span {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .collect();

        Ok(GroundingOutcome {
            grounded: response.grounded.unwrap_or(false),
            score: clamp_score(response.grounding_score.or(response.score)),
            evidence,
            justification: response.justification,
        })
    }
}

#[async_trait]
impl GroundingVerifier for GroundingVerifierAgent {
    async fn verify_grounding(
        &self,
        stem: &str,
        answer: &str,
        explanation: &str,
        chunk_text: &str,
    ) -> AgentResult<GroundingOutcome> {
        self.call(stem, answer, explanation, chunk_text)
            .await
            .map_err(|e| e.into_verifier_failure(Self::AGENT_NAME))
    }
}
