//! Text Editor Agent.
//!
//! Rewrites author-supplied text into course-ready prose for the target
//! audience and language, reporting what it changed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::LlmProvider;

use super::capabilities::TextEditor;
use super::error::{AgentError, AgentResult};
use super::support::complete_json;
use super::types::{language_label, AgentConfig, TextEditInput, TextEditOutput};

/// System prompt for text editing.
const TEXT_EDITOR_SYSTEM_PROMPT: &str = r#"You are a professional editor of school learning materials.

Edit the supplied text so it is clear, accurate and appropriate for the audience and grade level. Keep the author's meaning and every fact. Fix grammar and spelling, simplify convoluted sentences and keep terminology consistent. Write in the requested course language.

When no changes are needed, return the text unchanged and say so in the justification.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{
  "status": "ok",
  "edited_text": "<the revised text>",
  "justification": "<one line per change, or 'No changes needed'>"
}

Do not include any text outside the JSON object."#;

/// User prompt template for text editing.
const TEXT_EDITOR_USER_TEMPLATE: &str = r#"Course Information:
- Topic: {topic}
- Subject: {subject}
- Grade Level: {grade_level}
- Big Idea: {big_idea}
- Learning Gate: {learning_gate}
- Skills: {skills}
- Course Language: {course_language} ({course_language_label})

Editing Parameters:
- Audience: {audience}
- Instruction Style: {instruction_style}
- Output Format: {output_format}
- Allow Formatting: {allow_formatting}

Text to edit:
{raw_text}"#;

#[derive(Debug, Deserialize)]
struct TextEditResponse {
    status: Option<String>,
    edited_text: Option<String>,
    justification: Option<String>,
}

/// Text Editor Agent backed by an LLM provider.
pub struct TextEditorAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl std::fmt::Debug for TextEditorAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEditorAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TextEditorAgent {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "text_editor";

    pub fn new(llm_client: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, AgentConfig::editor())
    }

    fn build_prompt(&self, input: &TextEditInput) -> String {
        TEXT_EDITOR_USER_TEMPLATE
            .replace("{topic}", &input.topic)
            .replace("{subject}", &input.subject)
            .replace("{grade_level}", &input.grade_level)
            .replace("{big_idea}", &input.big_idea)
            .replace("{learning_gate}", &input.learning_gate)
            .replace("{skills}", &input.skills.join(", "))
            .replace("{course_language}", &input.course_language)
            .replace(
                "{course_language_label}",
                &language_label(&input.course_language),
            )
            .replace("{audience}", &input.audience)
            .replace("{instruction_style}", &input.instruction_style)
            .replace("{output_format}", &input.output_format)
            .replace("{allow_formatting}", &input.allow_formatting.to_string())
            .replace("{raw_text}", &input.raw_text)
    }
}

#[async_trait]
impl TextEditor for TextEditorAgent {
    async fn edit(&self, input: &TextEditInput) -> AgentResult<TextEditOutput> {
        let prompt = self.build_prompt(input);
        let response: TextEditResponse = complete_json(
            self.llm_client.as_ref(),
            &self.config,
            TEXT_EDITOR_SYSTEM_PROMPT,
            prompt,
        )
        .await
        .map_err(|e| AgentError::TextEditFailed(e.to_string()))?;

        if response.status.as_deref() != Some("ok") {
            return Err(AgentError::TextEditFailed(format!(
                "non-ok status: {}",
                response.status.as_deref().unwrap_or("missing")
            )));
        }
        let edited_text = response
            .edited_text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AgentError::TextEditFailed("missing edited_text".to_string()))?;

        Ok(TextEditOutput {
            edited_text,
            justification: response.justification.unwrap_or_default(),
        })
    }
}
