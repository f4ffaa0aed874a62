//! Request, result and state types for the generation loop.

use serde::{Deserialize, Serialize};

use crate::agents::{GenerationContext, GroundingOutcome, VerificationOutcome, VerificationTargets};
use crate::question::{CandidateQuestion, Chunk, CognitiveLevel, Difficulty, QuestionKind};

use super::summary::RunSummary;

/// Chunk id given to the pseudo chunk built from a free-form prompt.
pub const FREE_PROMPT_CHUNK_ID: &str = "free_prompt_ctx";

/// Attempt budget for a run: `max(3, 2 * target)`.
pub fn max_attempts(target: usize) -> usize {
    std::cmp::max(3, target.saturating_mul(2))
}

/// What the caller wants generated. Field names accept both snake_case and
/// the camelCase spelling used by course authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    #[serde(alias = "topicName")]
    pub topic: String,
    pub subject: String,
    #[serde(alias = "gradeLevel")]
    pub grade_level: String,
    #[serde(alias = "bigIdea")]
    pub big_idea: String,
    #[serde(alias = "learningGate")]
    pub learning_gate: String,
    pub skills: Vec<String>,
    pub context: Option<String>,
    #[serde(alias = "courseLanguage")]
    pub course_language: String,
    /// Target question count. Absent means one.
    #[serde(alias = "numQuestions")]
    pub num_questions: Option<usize>,
    /// Ordered preferences. Only the first entry is sent to the generator.
    #[serde(alias = "questionTypes")]
    pub question_types: Vec<QuestionKind>,
    #[serde(alias = "cognitiveTarget")]
    pub cognitive_target: Option<CognitiveLevel>,
    #[serde(alias = "target_difficulty", alias = "targetDifficulty")]
    pub difficulty_target: Option<Difficulty>,
    pub chunks: Vec<Chunk>,
    /// Used only when no chunk carries text.
    #[serde(alias = "freePrompt")]
    pub free_prompt: Option<String>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            topic: String::new(),
            subject: String::new(),
            grade_level: String::new(),
            big_idea: String::new(),
            learning_gate: String::new(),
            skills: Vec::new(),
            context: None,
            course_language: String::new(),
            num_questions: None,
            question_types: vec![QuestionKind::Mcq],
            cognitive_target: None,
            difficulty_target: None,
            chunks: Vec::new(),
            free_prompt: None,
        }
    }
}

impl GenerationRequest {
    pub fn target_count(&self) -> usize {
        self.num_questions.unwrap_or(1)
    }

    pub fn primary_question_type(&self) -> QuestionKind {
        self.question_types
            .first()
            .copied()
            .unwrap_or(QuestionKind::Mcq)
    }

    pub fn targets(&self) -> VerificationTargets {
        VerificationTargets {
            cognitive: self.cognitive_target,
            difficulty: self.difficulty_target,
        }
    }

    /// Chunks the loop will sweep, plus the number of blank chunks ignored.
    ///
    /// When no chunk has text, a non-blank free prompt becomes a single
    /// pseudo chunk. The result is empty when neither is available.
    pub fn usable_chunks(&self) -> (Vec<Chunk>, usize) {
        let usable: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|c| !c.text.trim().is_empty())
            .cloned()
            .collect();
        let ignored = self.chunks.len() - usable.len();
        if !usable.is_empty() {
            return (usable, ignored);
        }

        match self.free_prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => (
                vec![Chunk::new(
                    FREE_PROMPT_CHUNK_ID,
                    format!("Question topic: {}", prompt),
                )],
                ignored,
            ),
            _ => (Vec::new(), ignored),
        }
    }

    /// The request narrowed to one chunk, asking for `num_questions`.
    pub fn context_for(&self, chunk: &Chunk, num_questions: usize) -> GenerationContext {
        GenerationContext {
            topic: self.topic.clone(),
            subject: self.subject.clone(),
            grade_level: self.grade_level.clone(),
            big_idea: self.big_idea.clone(),
            learning_gate: self.learning_gate.clone(),
            skills: self.skills.clone(),
            context: self.context.clone(),
            course_language: self.course_language.clone(),
            question_type: self.primary_question_type(),
            cognitive_target: self.cognitive_target,
            difficulty_target: self.difficulty_target,
            chunk: chunk.clone(),
            num_questions,
        }
    }
}

/// A question that passed every requested verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedQuestion {
    pub question: CandidateQuestion,
    /// Trimmed stem, the identity used for deduplication.
    pub stem_key: String,
    /// Chunk the question was generated from and grounded against.
    pub chunk_id: String,
    pub cognitive: Option<VerificationOutcome>,
    pub difficulty: Option<VerificationOutcome>,
    pub grounding: Option<GroundingOutcome>,
}

/// Phases of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Collecting,
    /// The target count was reached.
    Done,
    /// The attempt budget ran out first. Partial success, not an error.
    Exhausted,
    /// The request had nothing to work with and the loop never started.
    InvalidRequest,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Collecting => write!(f, "collecting"),
            LoopState::Done => write!(f, "done"),
            LoopState::Exhausted => write!(f, "exhausted"),
            LoopState::InvalidRequest => write!(f, "invalid_request"),
        }
    }
}

/// Everything a finished run hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub state: LoopState,
    pub accepted: Vec<AcceptedQuestion>,
    pub summary: RunSummary,
    /// The chunks that were swept, after blank filtering and fallback.
    pub chunks: Vec<Chunk>,
}
