//! Core question types shared by the agents and the generation loop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of a candidate question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq,
    Open,
    Matching,
}

impl QuestionKind {
    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Mcq => "mcq",
            QuestionKind::Open => "open",
            QuestionKind::Matching => "matching",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcq" => Ok(QuestionKind::Mcq),
            "open" => Ok(QuestionKind::Open),
            "matching" => Ok(QuestionKind::Matching),
            other => Err(other.to_string()),
        }
    }
}

/// Intended depth of thinking a question should elicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveLevel {
    Knowledge,
    ComprehensionApplication,
    InferenceEvaluation,
}

impl CognitiveLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CognitiveLevel::Knowledge => "knowledge",
            CognitiveLevel::ComprehensionApplication => "comprehension_application",
            CognitiveLevel::InferenceEvaluation => "inference_evaluation",
        }
    }

    /// Short description used in verifier and generator prompts.
    pub fn description(&self) -> &'static str {
        match self {
            CognitiveLevel::Knowledge => "recall of facts, terms and basic concepts",
            CognitiveLevel::ComprehensionApplication => {
                "explaining ideas in one's own words and applying them to new situations"
            }
            CognitiveLevel::InferenceEvaluation => {
                "drawing conclusions, comparing positions and justifying judgements"
            }
        }
    }
}

impl fmt::Display for CognitiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target difficulty of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of source text. Grounding is always judged against a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
}

impl Chunk {
    pub fn new(chunk_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
        }
    }
}

/// A multiple-choice question. `correct_index` always indexes into `choices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub stem: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl McqQuestion {
    /// The text of the correct choice.
    pub fn correct_choice(&self) -> Option<&str> {
        self.choices.get(self.correct_index).map(String::as_str)
    }
}

/// An open-response question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub stem: String,
    pub expected_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// A `[left, right]` pair in a matching question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair(pub String, pub String);

impl MatchingPair {
    pub fn left(&self) -> &str {
        &self.0
    }

    pub fn right(&self) -> &str {
        &self.1
    }
}

/// A matching question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingQuestion {
    pub instructions: String,
    pub pairs: Vec<MatchingPair>,
    #[serde(default)]
    pub distractors: Vec<String>,
}

/// Canonical, validated question produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CandidateQuestion {
    Mcq(McqQuestion),
    Open(OpenQuestion),
    Matching(MatchingQuestion),
}

impl CandidateQuestion {
    pub fn kind(&self) -> QuestionKind {
        match self {
            CandidateQuestion::Mcq(_) => QuestionKind::Mcq,
            CandidateQuestion::Open(_) => QuestionKind::Open,
            CandidateQuestion::Matching(_) => QuestionKind::Matching,
        }
    }

    /// The learner-facing prompt. Matching questions use their instructions.
    pub fn stem(&self) -> &str {
        match self {
            CandidateQuestion::Mcq(q) => &q.stem,
            CandidateQuestion::Open(q) => &q.stem,
            CandidateQuestion::Matching(q) => &q.instructions,
        }
    }

    /// Trimmed stem, the identity used for deduplication.
    pub fn stem_key(&self) -> &str {
        self.stem().trim()
    }

    /// The answer text submitted to the grounding verifier.
    pub fn answer_text(&self) -> String {
        match self {
            CandidateQuestion::Mcq(q) => q.correct_choice().unwrap_or_default().to_string(),
            CandidateQuestion::Open(q) => q.expected_answer.clone(),
            CandidateQuestion::Matching(q) => q
                .pairs
                .iter()
                .map(|p| format!("{} -> {}", p.left(), p.right()))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Explanation or guidance text, empty when the question has none.
    pub fn explanation(&self) -> &str {
        match self {
            CandidateQuestion::Mcq(q) => q.explanation.as_deref().unwrap_or_default(),
            CandidateQuestion::Open(q) => q.guidance.as_deref().unwrap_or_default(),
            CandidateQuestion::Matching(_) => "",
        }
    }
}
