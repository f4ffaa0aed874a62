//! Stage-2 service: text editing and question generation for one lesson page.
//!
//! A [`Stage2Request`] is routed by its [`Stage2Mode`]. Question generation
//! runs the [`GenerationLoop`] and saves every accepted question as a
//! `question` block. Text editing rewrites the supplied text and saves it as
//! a `paragraph` block. Both modes tag their blocks with one pipeline run id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::agents::{
    AgentError, CognitiveLevelVerifierAgent, DifficultyVerifierAgent, GroundingVerifierAgent,
    QuestionGeneratorAgent, TextEditInput, TextEditor, TextEditorAgent, VerifierPanel,
};
use crate::llm::LlmProvider;
use crate::storage::{BlockScope, BlockStore, BlockType, NewBlock, StoredBlockRef};
use crate::utils::new_pipeline_run_id;

use super::config::PipelineConfig;
use super::generation_loop::GenerationLoop;
use super::summary::RunSummary;
use super::types::{AcceptedQuestion, GenerationRequest, LoopState};

/// Errors surfaced by the stage-2 service.
///
/// Storage failures are reported in the result summary instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("edit_text mode requires non-empty text")]
    MissingText,

    #[error("Text editing failed: {0}")]
    Edit(#[from] AgentError),
}

/// What a stage-2 request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage2Mode {
    EditText,
    #[default]
    GenerateQuestions,
}

impl Stage2Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage2Mode::EditText => "edit_text",
            Stage2Mode::GenerateQuestions => "generate_questions",
        }
    }
}

impl std::fmt::Display for Stage2Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

fn default_audience() -> String {
    "students".to_string()
}

fn default_instruction_style() -> String {
    "neutral".to_string()
}

fn default_output_format() -> String {
    "plain_text".to_string()
}

/// A stage-2 request as sent by course authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Request {
    #[serde(default)]
    pub mode: Stage2Mode,
    #[serde(flatten)]
    pub generation: GenerationRequest,
    #[serde(flatten)]
    pub scope: BlockScope,

    /// Text to edit. Required in edit mode.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_true", alias = "saveToBlocks")]
    pub save_to_blocks: bool,
    #[serde(default, alias = "pipelineRunId")]
    pub pipeline_run_id: Option<String>,

    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_instruction_style", alias = "instructionStyle")]
    pub instruction_style: String,
    #[serde(default = "default_output_format", alias = "outputFormat")]
    pub output_format: String,
    #[serde(default, alias = "allowFormatting")]
    pub allow_formatting: bool,
}

impl Stage2Request {
    pub fn generate(generation: GenerationRequest) -> Self {
        Self {
            mode: Stage2Mode::GenerateQuestions,
            generation,
            scope: BlockScope::default(),
            text: None,
            save_to_blocks: true,
            pipeline_run_id: None,
            audience: default_audience(),
            instruction_style: default_instruction_style(),
            output_format: default_output_format(),
            allow_formatting: false,
        }
    }

    pub fn edit(generation: GenerationRequest, text: impl Into<String>) -> Self {
        Self {
            mode: Stage2Mode::EditText,
            text: Some(text.into()),
            ..Self::generate(generation)
        }
    }
}

/// Mode-specific summary of a stage-2 run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stage2Summary {
    Generation(RunSummary),
    Edit {
        chars: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        persistence_error: Option<String>,
    },
}

impl Stage2Summary {
    pub fn persistence_error(&self) -> Option<&str> {
        match self {
            Stage2Summary::Generation(s) => s.persistence_error.as_deref(),
            Stage2Summary::Edit {
                persistence_error, ..
            } => persistence_error.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Result {
    pub mode: Stage2Mode,
    pub pipeline_run_id: String,
    /// Final loop state. Absent in edit mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LoopState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes_summary: Vec<String>,
    pub generated: Vec<AcceptedQuestion>,
    pub saved_blocks: Vec<StoredBlockRef>,
    pub summary: Stage2Summary,
}

/// Runs stage-2 requests over injected capabilities and a block store.
#[derive(Clone)]
pub struct Stage2Service {
    generation_loop: GenerationLoop,
    text_editor: Arc<dyn TextEditor>,
    store: Arc<dyn BlockStore>,
    course_language: String,
}

impl std::fmt::Debug for Stage2Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage2Service")
            .field("generation_loop", &self.generation_loop)
            .field("course_language", &self.course_language)
            .finish_non_exhaustive()
    }
}

impl Stage2Service {
    pub fn new(
        generation_loop: GenerationLoop,
        text_editor: Arc<dyn TextEditor>,
        store: Arc<dyn BlockStore>,
    ) -> Self {
        Self {
            generation_loop,
            text_editor,
            store,
            course_language: "he".to_string(),
        }
    }

    /// Language used when a request leaves `course_language` blank.
    pub fn with_course_language(mut self, language: impl Into<String>) -> Self {
        self.course_language = language.into();
        self
    }

    /// Wires the LLM agents from configuration.
    pub fn from_config(
        llm: Arc<dyn LlmProvider>,
        config: &PipelineConfig,
        store: Arc<dyn BlockStore>,
    ) -> Self {
        let verifier = config.verifier_agent();
        let panel = VerifierPanel::new(
            Arc::new(CognitiveLevelVerifierAgent::new(llm.clone(), verifier.clone())),
            Arc::new(DifficultyVerifierAgent::new(llm.clone(), verifier.clone())),
            Arc::new(GroundingVerifierAgent::new(llm.clone(), verifier)),
        );
        let generator = Arc::new(QuestionGeneratorAgent::new(
            llm.clone(),
            config.generator_agent(),
        ));
        let generation_loop = GenerationLoop::new(generator, panel)
            .with_shuffle_seed(config.shuffle_seed)
            .with_max_target(config.max_questions);
        let editor = Arc::new(TextEditorAgent::new(llm, config.editor_agent()));

        Self::new(generation_loop, editor, store).with_course_language(&config.course_language)
    }

    /// Runs one request. A run id is assigned when the request carries none.
    pub async fn run(&self, request: &Stage2Request) -> Result<Stage2Result, PipelineError> {
        let run_id = request
            .pipeline_run_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_pipeline_run_id);

        let span = info_span!("stage2", run_id = %run_id, mode = %request.mode);
        async {
            match request.mode {
                Stage2Mode::GenerateQuestions => Ok(self.generate_questions(request, run_id).await),
                Stage2Mode::EditText => self.edit_text(request, run_id).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn generate_questions(&self, request: &Stage2Request, run_id: String) -> Stage2Result {
        let generation = self.with_language(&request.generation);
        let outcome = self.generation_loop.run(&generation).await;
        let mut summary = outcome.summary;
        let mut saved_blocks = Vec::new();

        if request.save_to_blocks && !outcome.accepted.is_empty() {
            match self
                .save_questions(&run_id, &generation, &request.scope, &outcome.accepted)
                .await
            {
                Ok(refs) => {
                    info!(saved = refs.len(), "Question blocks saved");
                    saved_blocks = refs;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to save question blocks");
                    summary.persistence_error = Some(e.to_string());
                }
            }
        }

        Stage2Result {
            mode: Stage2Mode::GenerateQuestions,
            pipeline_run_id: run_id,
            state: Some(outcome.state),
            edited_text: None,
            changes_summary: Vec::new(),
            generated: outcome.accepted,
            saved_blocks,
            summary: Stage2Summary::Generation(summary),
        }
    }

    async fn edit_text(
        &self,
        request: &Stage2Request,
        run_id: String,
    ) -> Result<Stage2Result, PipelineError> {
        let text = request
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(PipelineError::MissingText)?;

        let generation = self.with_language(&request.generation);
        let input = TextEditInput {
            topic: generation.topic.clone(),
            subject: generation.subject.clone(),
            grade_level: generation.grade_level.clone(),
            big_idea: generation.big_idea.clone(),
            learning_gate: generation.learning_gate.clone(),
            skills: generation.skills.clone(),
            course_language: generation.course_language.clone(),
            raw_text: text.to_string(),
            audience: request.audience.clone(),
            instruction_style: request.instruction_style.clone(),
            output_format: request.output_format.clone(),
            allow_formatting: request.allow_formatting,
        };

        let output = self.text_editor.edit(&input).await?;
        let changes_summary: Vec<String> = output
            .justification
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(
            chars = output.edited_text.chars().count(),
            changes = changes_summary.len(),
            "Text edited"
        );

        let mut saved_blocks = Vec::new();
        let mut persistence_error = None;
        if request.save_to_blocks {
            let block = NewBlock {
                block_type: BlockType::Paragraph,
                content: json!({ "text": output.edited_text }),
                metadata: json!({
                    "purpose": "Refined Text",
                    "topic": generation.topic,
                    "course_language": generation.course_language,
                }),
                scope: request.scope.clone(),
                identity: output.edited_text.clone(),
            };
            match self.store.bulk_upsert(&run_id, vec![block]).await {
                Ok(refs) => saved_blocks = refs,
                Err(e) => {
                    warn!(error = %e, "Failed to save paragraph block");
                    persistence_error = Some(e.to_string());
                }
            }
        }

        Ok(Stage2Result {
            mode: Stage2Mode::EditText,
            pipeline_run_id: run_id,
            state: None,
            summary: Stage2Summary::Edit {
                chars: output.edited_text.chars().count(),
                persistence_error,
            },
            edited_text: Some(output.edited_text),
            changes_summary,
            generated: Vec::new(),
            saved_blocks,
        })
    }

    async fn save_questions(
        &self,
        run_id: &str,
        request: &GenerationRequest,
        scope: &BlockScope,
        accepted: &[AcceptedQuestion],
    ) -> Result<Vec<StoredBlockRef>, crate::error::StorageError> {
        let blocks = accepted
            .iter()
            .map(|q| question_block(request, scope, q))
            .collect::<Result<Vec<_>, _>>()?;
        self.store.bulk_upsert(run_id, blocks).await
    }

    fn with_language(&self, request: &GenerationRequest) -> GenerationRequest {
        let mut request = request.clone();
        if request.course_language.trim().is_empty() {
            request.course_language = self.course_language.clone();
        }
        request
    }
}

/// Builds the persisted record for one accepted question.
fn question_block(
    request: &GenerationRequest,
    scope: &BlockScope,
    accepted: &AcceptedQuestion,
) -> Result<NewBlock, serde_json::Error> {
    let content = json!({
        "question": serde_json::to_value(&accepted.question)?,
        "metadata": {
            "topic": request.topic,
            "subject": request.subject,
            "grade_level": request.grade_level,
            "big_idea": request.big_idea,
            "learning_gate": request.learning_gate,
            "course_language": request.course_language,
            "bloom_level": request.cognitive_target.map(|c| c.as_str()),
            "difficulty": request.difficulty_target.map(|d| d.as_str()),
            "chunk_ids": [accepted.chunk_id],
        },
    });
    let metadata = json!({
        "question_type": accepted.question.kind().as_str(),
        "verification": {
            "cognitive": optional_value(&accepted.cognitive)?,
            "difficulty": optional_value(&accepted.difficulty)?,
            "grounding": optional_value(&accepted.grounding)?,
        },
    });

    Ok(NewBlock {
        block_type: BlockType::Question,
        content,
        metadata,
        scope: scope.clone(),
        identity: accepted.stem_key.clone(),
    })
}

fn optional_value<T: Serialize>(value: &Option<T>) -> Result<Value, serde_json::Error> {
    match value {
        Some(v) => serde_json::to_value(v),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{GroundingOutcome, VerificationOutcome};
    use crate::question::{CandidateQuestion, CognitiveLevel, OpenQuestion};

    fn accepted() -> AcceptedQuestion {
        AcceptedQuestion {
            question: CandidateQuestion::Open(OpenQuestion {
                stem: "Why did the revolution start?".to_string(),
                expected_answer: "Debt".to_string(),
                guidance: None,
            }),
            stem_key: "Why did the revolution start?".to_string(),
            chunk_id: "c1".to_string(),
            cognitive: Some(VerificationOutcome {
                detected: Some("knowledge".to_string()),
                matches: true,
                score: Some(0.9),
                justification: None,
            }),
            difficulty: None,
            grounding: Some(GroundingOutcome {
                grounded: true,
                score: Some(1.0),
                evidence: vec!["debt crisis".to_string()],
                justification: None,
            }),
        }
    }

    #[test]
    fn test_question_block_shape() {
        let request = GenerationRequest {
            topic: "Revolution".to_string(),
            cognitive_target: Some(CognitiveLevel::Knowledge),
            ..Default::default()
        };
        let scope = BlockScope {
            page_id: Some("p1".to_string()),
            ..Default::default()
        };

        let block = question_block(&request, &scope, &accepted()).unwrap();
        assert_eq!(block.block_type, BlockType::Question);
        assert_eq!(block.identity, "Why did the revolution start?");
        assert_eq!(block.content["question"]["type"], "open");
        assert_eq!(block.content["metadata"]["topic"], "Revolution");
        assert_eq!(block.content["metadata"]["bloom_level"], "knowledge");
        assert!(block.content["metadata"]["difficulty"].is_null());
        assert_eq!(block.content["metadata"]["chunk_ids"], json!(["c1"]));
        assert_eq!(block.metadata["question_type"], "open");
        assert_eq!(block.metadata["verification"]["grounding"]["grounded"], true);
        assert!(block.metadata["verification"]["difficulty"].is_null());
        assert_eq!(block.scope.page_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_request_defaults_and_flattened_fields() {
        let req: Stage2Request = serde_json::from_value(json!({
            "mode": "edit_text",
            "topicName": "Revolution",
            "numQuestions": 2,
            "pageId": "p9",
            "text": "Some text"
        }))
        .unwrap();

        assert_eq!(req.mode, Stage2Mode::EditText);
        assert_eq!(req.generation.topic, "Revolution");
        assert_eq!(req.generation.num_questions, Some(2));
        assert_eq!(req.scope.page_id.as_deref(), Some("p9"));
        assert!(req.save_to_blocks);
        assert_eq!(req.audience, "students");
        assert_eq!(req.instruction_style, "neutral");
        assert_eq!(req.output_format, "plain_text");
        assert!(!req.allow_formatting);
    }

    #[test]
    fn test_mode_defaults_to_generation() {
        let req: Stage2Request = serde_json::from_value(json!({"topic": "x"})).unwrap();
        assert_eq!(req.mode, Stage2Mode::GenerateQuestions);
        assert_eq!(Stage2Mode::EditText.to_string(), "edit_text");
    }

    #[test]
    fn test_edit_summary_serializes_chars() {
        let summary = Stage2Summary::Edit {
            chars: 12,
            persistence_error: None,
        };
        assert_eq!(serde_json::to_value(&summary).unwrap(), json!({"chars": 12}));
        assert!(summary.persistence_error().is_none());
    }
}
