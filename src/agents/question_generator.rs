//! Question Generator Agent.
//!
//! Asks the model for a batch of questions about a single source chunk.
//! The raw question objects are handed back untouched so the generation
//! loop can normalize and validate them in one place.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::llm::LlmProvider;

use super::capabilities::QuestionGenerator;
use super::error::{AgentError, AgentResult};
use super::support::complete_json;
use super::types::{language_label, AgentConfig, GenerationContext};

/// System prompt for question generation.
const QUESTION_GENERATOR_SYSTEM_PROMPT: &str = r#"You are an experienced curriculum designer who writes assessment questions for school courses.

Every question you write must be answerable from the supplied source text alone. Do not rely on outside knowledge and never invent facts.

Question formats:
- mcq: {"type": "mcq", "stem": "<question>", "choices": ["<a>", "<b>", "<c>", "<d>"], "correct_index": <0-based index>, "explanation": "<why the answer is correct>"}
- open: {"type": "open", "stem": "<question>", "expected_answer": "<model answer>", "guidance": "<what a full answer covers>"}
- matching: {"type": "matching", "instructions": "<what to match>", "pairs": [["<left>", "<right>"]], "distractors": ["<unused right-hand option>"]}

Rules:
1. Write every question in the requested course language.
2. Each stem must be distinct from the others.
3. MCQ distractors must be plausible but clearly wrong according to the source.
4. Respect the requested cognitive level and difficulty when they are given.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{"questions": [<question objects>]}

Do not include any text outside the JSON object."#;

/// User prompt template for question generation.
const QUESTION_GENERATOR_USER_TEMPLATE: &str = r#"Write {num_questions} question(s) of type "{question_type}".

Course Information:
- Topic: {topic}
- Subject: {subject}
- Grade Level: {grade_level}
- Big Idea: {big_idea}
- Learning Gate: {learning_gate}
- Skills: {skills}
- Course Language: {course_language}

Targets:
- Cognitive Level: {cognitive_level}
- Difficulty: {difficulty}

Additional Context:
{context}

Source Text (chunk {chunk_id}):
{chunk_text}"#;

/// Accepted reply shapes: the documented wrapper or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratorResponse {
    Wrapped { questions: Vec<Value> },
    Bare(Vec<Value>),
}

impl GeneratorResponse {
    fn into_questions(self) -> Vec<Value> {
        match self {
            GeneratorResponse::Wrapped { questions } => questions,
            GeneratorResponse::Bare(questions) => questions,
        }
    }
}

/// Question Generator Agent backed by an LLM provider.
pub struct QuestionGeneratorAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl std::fmt::Debug for QuestionGeneratorAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionGeneratorAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QuestionGeneratorAgent {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "question_generator";

    pub fn new(llm_client: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, AgentConfig::generator())
    }

    fn build_prompt(&self, ctx: &GenerationContext) -> String {
        let skills = if ctx.skills.is_empty() {
            "not specified".to_string()
        } else {
            ctx.skills.join(", ")
        };

        QUESTION_GENERATOR_USER_TEMPLATE
            .replace("{num_questions}", &ctx.num_questions.to_string())
            .replace("{question_type}", ctx.question_type.as_str())
            .replace("{topic}", &ctx.topic)
            .replace("{subject}", &ctx.subject)
            .replace("{grade_level}", &ctx.grade_level)
            .replace("{big_idea}", &ctx.big_idea)
            .replace("{learning_gate}", &ctx.learning_gate)
            .replace("{skills}", &skills)
            .replace("{course_language}", &language_label(&ctx.course_language))
            .replace(
                "{cognitive_level}",
                &ctx.cognitive_target
                    .map(|l| format!("{} ({})", l, l.description()))
                    .unwrap_or_else(|| "any".to_string()),
            )
            .replace(
                "{difficulty}",
                ctx.difficulty_target.map(|d| d.as_str()).unwrap_or("any"),
            )
            .replace("{context}", ctx.context.as_deref().unwrap_or("none"))
            .replace("{chunk_id}", &ctx.chunk.chunk_id)
            .replace("{chunk_text}", &ctx.chunk.text)
    }
}

#[async_trait]
impl QuestionGenerator for QuestionGeneratorAgent {
    async fn generate(&self, ctx: &GenerationContext) -> AgentResult<Vec<Value>> {
        let prompt = self.build_prompt(ctx);
        let response: GeneratorResponse = complete_json(
            self.llm_client.as_ref(),
            &self.config,
            QUESTION_GENERATOR_SYSTEM_PROMPT,
            prompt,
        )
        .await
        .map_err(|e| AgentError::GenerationCallFailed(e.to_string()))?;

        Ok(response.into_questions())
    }
}
