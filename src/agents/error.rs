//! Error types for the question-generation agents.

use thiserror::Error;

use crate::utils::json_extraction::JsonExtractionError;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The question generator errored or returned unusable output.
    #[error("Question generation failed: {0}")]
    GenerationCallFailed(String),

    /// A verifier errored, answered with a non-ok status or returned
    /// unparseable output.
    #[error("Verifier '{verifier}' failed: {reason}")]
    VerifierCallFailed { verifier: String, reason: String },

    /// The text editor errored or returned unusable output.
    #[error("Text editing failed: {0}")]
    TextEditFailed(String),

    /// Error from the LLM provider.
    #[error("LLM error: {0}")]
    LlmError(String),

    /// Error parsing LLM response.
    #[error("Failed to parse LLM response: {0}")]
    ResponseParseError(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Re-labels any failure as a failed call to the named verifier.
    pub fn into_verifier_failure(self, verifier: &str) -> AgentError {
        match self {
            AgentError::VerifierCallFailed { .. } => self,
            other => AgentError::VerifierCallFailed {
                verifier: verifier.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<crate::error::LlmError> for AgentError {
    fn from(err: crate::error::LlmError) -> Self {
        AgentError::LlmError(err.to_string())
    }
}

impl From<JsonExtractionError> for AgentError {
    fn from(err: JsonExtractionError) -> Self {
        AgentError::ResponseParseError(err.to_string())
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_verifier_failure_keeps_existing_label() {
        let err = AgentError::VerifierCallFailed {
            verifier: "grounding".to_string(),
            reason: "status error".to_string(),
        };
        match err.into_verifier_failure("cognitive") {
            AgentError::VerifierCallFailed { verifier, .. } => assert_eq!(verifier, "grounding"),
            other => panic!("unexpected: {other:?}"),
        }

        let err = AgentError::LlmError("timeout".to_string()).into_verifier_failure("difficulty");
        assert_eq!(err.to_string(), "Verifier 'difficulty' failed: LLM error: timeout");
    }
}
