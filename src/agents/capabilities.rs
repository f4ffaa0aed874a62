//! Capability traits consumed by the generation loop.
//!
//! Each external capability is injected as a trait object so runs can be
//! driven by the LLM agents in production and by deterministic fakes in
//! tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::question::{CognitiveLevel, Difficulty};

use super::error::AgentResult;
use super::types::{
    GenerationContext, GroundingOutcome, TextEditInput, TextEditOutput, VerificationOutcome,
};

/// Produces raw candidate questions for one chunk.
///
/// Implementations return the candidates exactly as the model produced
/// them. Normalization is the caller's job.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, ctx: &GenerationContext) -> AgentResult<Vec<Value>>;
}

/// Judges whether a stem elicits the requested depth of thinking.
#[async_trait]
pub trait CognitiveVerifier: Send + Sync {
    async fn verify_cognitive(
        &self,
        stem: &str,
        target: CognitiveLevel,
    ) -> AgentResult<VerificationOutcome>;
}

/// Judges whether a stem matches the requested difficulty.
#[async_trait]
pub trait DifficultyVerifier: Send + Sync {
    async fn verify_difficulty(
        &self,
        stem: &str,
        supporting_text: &str,
        target: Difficulty,
    ) -> AgentResult<VerificationOutcome>;
}

/// Judges whether a question and its answer are supported by a chunk.
#[async_trait]
pub trait GroundingVerifier: Send + Sync {
    async fn verify_grounding(
        &self,
        stem: &str,
        answer: &str,
        explanation: &str,
        chunk_text: &str,
    ) -> AgentResult<GroundingOutcome>;
}

/// Rewrites raw text into course-ready prose.
#[async_trait]
pub trait TextEditor: Send + Sync {
    async fn edit(&self, input: &TextEditInput) -> AgentResult<TextEditOutput>;
}
