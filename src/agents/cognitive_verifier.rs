//! Cognitive Level Verifier Agent.
//!
//! Uses an LLM to judge whether a question stem elicits the requested
//! depth of thinking.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::LlmProvider;
use crate::question::CognitiveLevel;

use super::capabilities::CognitiveVerifier;
use super::error::AgentResult;
use super::support::{complete_json, ensure_ok_status};
use super::types::{clamp_score, AgentConfig, VerificationOutcome};

/// System prompt for cognitive level verification.
const COGNITIVE_VERIFIER_SYSTEM_PROMPT: &str = r#"You are an assessment specialist who classifies questions by the depth of thinking they require.

Cognitive Levels:
- knowledge: recall of facts, terms and basic concepts
- comprehension_application: explaining ideas in one's own words and applying them to new situations
- inference_evaluation: drawing conclusions, comparing positions and justifying judgements

Classify the question by what a student must actually do to answer it, not by the verbs it happens to use.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{
  "status": "ok",
  "detected_level": "<knowledge | comprehension_application | inference_evaluation>",
  "match_score": <float between 0.0 and 1.0>,
  "matches_target": <true or false>,
  "justification": "<short explanation>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for cognitive level verification.
const COGNITIVE_VERIFIER_USER_TEMPLATE: &str = r#"Target Cognitive Level: {level} ({description})

Question:
{question}

Does this question require the target level of thinking?"#;

#[derive(Debug, Deserialize)]
struct CognitiveResponse {
    status: Option<String>,
    detected_level: Option<String>,
    matches_target: Option<bool>,
    match_score: Option<f64>,
    justification: Option<String>,
}

/// Cognitive Level Verifier Agent that uses an LLM to classify stems.
pub struct CognitiveLevelVerifierAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl std::fmt::Debug for CognitiveLevelVerifierAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitiveLevelVerifierAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CognitiveLevelVerifierAgent {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "cognitive";

    pub fn new(llm_client: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, AgentConfig::verifier())
    }

    async fn call(&self, stem: &str, target: CognitiveLevel) -> AgentResult<VerificationOutcome> {
        let prompt = COGNITIVE_VERIFIER_USER_TEMPLATE
            .replace("{level}", target.as_str())
            .replace("{description}", target.description())
            .replace("{question}", stem);

        let response: CognitiveResponse = complete_json(
            self.llm_client.as_ref(),
            &self.config,
            COGNITIVE_VERIFIER_SYSTEM_PROMPT,
            prompt,
        )
        .await?;
        ensure_ok_status(Self::AGENT_NAME, response.status.as_deref())?;

        Ok(VerificationOutcome {
            detected: response.detected_level,
            matches: response.matches_target.unwrap_or(false),
            score: clamp_score(response.match_score),
            justification: response.justification,
        })
    }
}

#[async_trait]
impl CognitiveVerifier for CognitiveLevelVerifierAgent {
    async fn verify_cognitive(
        &self,
        stem: &str,
        target: CognitiveLevel,
    ) -> AgentResult<VerificationOutcome> {
        self.call(stem, target)
            .await
            .map_err(|e| e.into_verifier_failure(Self::AGENT_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::error::AgentError;
    use crate::llm::{Choice, GenerationRequest, GenerationResponse, Message, Usage};
    use std::sync::Mutex;

    /// Mock LLM provider for testing.
    struct MockLlmProvider {
        response: Mutex<String>,
    }

    impl MockLlmProvider {
        fn new(response: impl Into<String>) -> Self {
            Self {
                response: Mutex::new(response.into()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, crate::error::LlmError> {
            let content = self.response.lock().expect("lock not poisoned").clone();
            Ok(GenerationResponse {
                id: "mock-id".to_string(),
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage {
                    prompt_tokens: 100,
                    completion_tokens: 50,
                    total_tokens: 150,
                },
            })
        }
    }

    #[tokio::test]
    async fn test_cognitive_match() {
        let mock = Arc::new(MockLlmProvider::new(
            r#"{
                "status": "ok",
                "detected_level": "knowledge",
                "match_score": 0.92,
                "matches_target": true,
                "justification": "Asks for a date."
            }"#,
        ));
        let agent = CognitiveLevelVerifierAgent::with_defaults(mock);

        let outcome = agent
            .verify_cognitive("When did the Bastille fall?", CognitiveLevel::Knowledge)
            .await
            .unwrap();
        assert!(outcome.matches);
        assert_eq!(outcome.detected.as_deref(), Some("knowledge"));
        assert_eq!(outcome.score, Some(0.92));
    }

    #[tokio::test]
    async fn test_missing_matches_target_is_not_a_match() {
        let mock = Arc::new(MockLlmProvider::new(
            r#"{"status": "ok", "detected_level": "knowledge", "match_score": 3.0}"#,
        ));
        let agent = CognitiveLevelVerifierAgent::with_defaults(mock);

        let outcome = agent
            .verify_cognitive("Why?", CognitiveLevel::InferenceEvaluation)
            .await
            .unwrap();
        assert!(!outcome.matches);
        assert_eq!(outcome.score, Some(1.0));
    }

    #[tokio::test]
    async fn test_non_ok_status_fails() {
        let mock = Arc::new(MockLlmProvider::new(r#"{"status": "error", "reason": "unsure"}"#));
        let agent = CognitiveLevelVerifierAgent::with_defaults(mock);

        let err = agent
            .verify_cognitive("Why?", CognitiveLevel::Knowledge)
            .await
            .unwrap_err();
        match err {
            AgentError::VerifierCallFailed { verifier, .. } => assert_eq!(verifier, "cognitive"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_fails_as_verifier_error() {
        let mock = Arc::new(MockLlmProvider::new("The level is knowledge."));
        let agent = CognitiveLevelVerifierAgent::with_defaults(mock);

        let err = agent
            .verify_cognitive("Why?", CognitiveLevel::Knowledge)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::VerifierCallFailed { .. }));
    }
}
