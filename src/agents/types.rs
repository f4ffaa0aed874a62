//! Core types for the generation and verification agents.
//!
//! Defines the per-call configuration, the generator's prompt context and
//! the outcome records produced by the three verifiers.

use serde::{Deserialize, Serialize};

use crate::llm::DEFAULT_MODEL;
use crate::question::{Chunk, CognitiveLevel, Difficulty, QuestionKind};

/// Model and sampling settings for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model identifier passed to the provider. Empty uses the client default.
    pub model: String,
    /// Temperature for LLM generation.
    pub temperature: f64,
    /// Maximum tokens for LLM response.
    pub max_tokens: u32,
}

impl AgentConfig {
    pub fn generator() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.8,
            max_tokens: 2000,
        }
    }

    pub fn verifier() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    pub fn editor() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::verifier()
    }
}

/// Everything the question generator sees for one call: the request
/// narrowed to a single chunk and the number of questions still missing.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContext {
    pub topic: String,
    pub subject: String,
    pub grade_level: String,
    pub big_idea: String,
    pub learning_gate: String,
    pub skills: Vec<String>,
    pub context: Option<String>,
    pub course_language: String,
    pub question_type: QuestionKind,
    pub cognitive_target: Option<CognitiveLevel>,
    pub difficulty_target: Option<Difficulty>,
    pub chunk: Chunk,
    pub num_questions: usize,
}

/// Result of the cognitive-level or difficulty verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Level or difficulty the verifier detected, in its own vocabulary.
    pub detected: Option<String>,
    /// Whether the question matches the requested target.
    pub matches: bool,
    /// Confidence in [0.0, 1.0].
    pub score: Option<f64>,
    pub justification: Option<String>,
}

/// Result of the grounding verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingOutcome {
    pub grounded: bool,
    pub score: Option<f64>,
    /// Quoted spans of the chunk that support the answer.
    #[serde(default)]
    pub evidence: Vec<String>,
    pub justification: Option<String>,
}

/// Input for the text editor.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEditInput {
    pub topic: String,
    pub subject: String,
    pub grade_level: String,
    pub big_idea: String,
    pub learning_gate: String,
    pub skills: Vec<String>,
    pub course_language: String,
    pub raw_text: String,
    pub audience: String,
    pub instruction_style: String,
    pub output_format: String,
    pub allow_formatting: bool,
}

/// Output of the text editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEditOutput {
    pub edited_text: String,
    pub justification: String,
}

/// Clamps a model-reported score into [0.0, 1.0]. NaN is discarded.
pub fn clamp_score(score: Option<f64>) -> Option<f64> {
    score.filter(|s| !s.is_nan()).map(|s| s.clamp(0.0, 1.0))
}

/// Human label for a course language code, used in prompts.
pub fn language_label(code: &str) -> String {
    let lower = code.trim().to_lowercase();
    if lower.is_empty() || lower.starts_with("he") || lower.contains("עברית") {
        "Hebrew".to_string()
    } else if lower.starts_with("en") || lower.contains("english") || lower.contains("אנגלית") {
        "English".to_string()
    } else {
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
