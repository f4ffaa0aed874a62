//! Difficulty Verifier Agent.
//!
//! Uses an LLM to judge whether a question matches the requested difficulty
//! for the source text it was written from.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::LlmProvider;
use crate::question::Difficulty;

use super::capabilities::DifficultyVerifier;
use super::error::AgentResult;
use super::support::{complete_json, ensure_ok_status};
use super::types::{clamp_score, AgentConfig, VerificationOutcome};

/// System prompt for difficulty verification.
const DIFFICULTY_VERIFIER_SYSTEM_PROMPT: &str = r#"You are an expert evaluator of question difficulty for school assessments.

Difficulty Levels:
- easy: the answer is stated directly in the text and can be located in a single sentence.
- medium: the answer requires combining two or more pieces of information from the text.
- hard: the answer requires interpretation, inference or evaluation beyond what the text states outright.

Judge difficulty relative to the supplied text and the intended grade level.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{
  "status": "ok",
  "detected_difficulty": "<easy | medium | hard>",
  "match_score": <float between 0.0 and 1.0>,
  "matches_target": <true or false>,
  "justification": "<short explanation>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for difficulty verification.
const DIFFICULTY_VERIFIER_USER_TEMPLATE: &str = r#"Expected Difficulty: {difficulty}

Source Text:
{text}

Question:
{question}

Analyze this question and determine if it truly matches the {difficulty} difficulty level."#;

#[derive(Debug, Deserialize)]
struct DifficultyResponse {
    status: Option<String>,
    detected_difficulty: Option<String>,
    matches_target: Option<bool>,
    match_score: Option<f64>,
    justification: Option<String>,
}

/// Difficulty Verifier Agent that uses an LLM to assess question difficulty.
pub struct DifficultyVerifierAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl std::fmt::Debug for DifficultyVerifierAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifficultyVerifierAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DifficultyVerifierAgent {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "difficulty";

    pub fn new(llm_client: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, AgentConfig::verifier())
    }

    async fn call(
        &self,
        stem: &str,
        supporting_text: &str,
        target: Difficulty,
    ) -> AgentResult<VerificationOutcome> {
        let prompt = DIFFICULTY_VERIFIER_USER_TEMPLATE
            .replace("{difficulty}", target.as_str())
            .replace("{text}", supporting_text)
            .replace("{question}", stem);

        let response: DifficultyResponse = complete_json(
            self.llm_client.as_ref(),
            &self.config,
            DIFFICULTY_VERIFIER_SYSTEM_PROMPT,
            prompt,
        )
        .await?;
        ensure_ok_status(Self::AGENT_NAME, response.status.as_deref())?;

        Ok(VerificationOutcome {
            detected: response.detected_difficulty,
            matches: response.matches_target.unwrap_or(false),
            score: clamp_score(response.match_score),
            justification: response.justification,
        })
    }
}

#[async_trait]
impl DifficultyVerifier for DifficultyVerifierAgent {
    async fn verify_difficulty(
        &self,
        stem: &str,
        supporting_text: &str,
        target: Difficulty,
    ) -> AgentResult<VerificationOutcome> {
        self.call(stem, supporting_text, target)
            .await
            .map_err(|e| e.into_verifier_failure(Self::AGENT_NAME))
    }
}
