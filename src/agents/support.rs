//! Request plumbing shared by the LLM-backed agents.

use serde::de::DeserializeOwned;

use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::utils::json_extraction::{preview, try_extract_json};

use super::error::{AgentError, AgentResult};
use super::types::AgentConfig;

/// Sends a system + user prompt pair and decodes the JSON payload of the reply.
pub(crate) async fn complete_json<T: DeserializeOwned>(
    llm: &dyn LlmProvider,
    config: &AgentConfig,
    system_prompt: &str,
    user_prompt: String,
) -> AgentResult<T> {
    let request = GenerationRequest::new(
        config.model.clone(),
        vec![Message::system(system_prompt), Message::user(user_prompt)],
    )
    .with_temperature(config.temperature)
    .with_max_tokens(config.max_tokens)
    .with_json_mode();

    let response = llm.generate(request).await?;
    let content = response
        .first_content()
        .ok_or_else(|| AgentError::ResponseParseError("Empty response from LLM".to_string()))?;

    let json = try_extract_json(content)?;
    serde_json::from_str(&json).map_err(|e| {
        AgentError::ResponseParseError(format!(
            "Invalid JSON: {} (payload starts with '{}')",
            e,
            preview(&json, 80)
        ))
    })
}

/// Fails unless a verifier answered with `"status": "ok"`.
pub(crate) fn ensure_ok_status(verifier: &str, status: Option<&str>) -> AgentResult<()> {
    match status {
        Some("ok") => Ok(()),
        other => Err(AgentError::VerifierCallFailed {
            verifier: verifier.to_string(),
            reason: format!("non-ok status: {}", other.unwrap_or("missing")),
        }),
    }
}
