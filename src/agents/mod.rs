//! LLM-backed question generation and verification agents.

pub mod capabilities;
pub mod cognitive_verifier;
pub mod difficulty_verifier;
pub mod error;
pub mod grounding_verifier;
pub mod question_generator;
mod support;
pub mod text_editor;
pub mod types;
pub mod verifier_panel;

pub use capabilities::{
    CognitiveVerifier, DifficultyVerifier, GroundingVerifier, QuestionGenerator, TextEditor,
};
pub use cognitive_verifier::CognitiveLevelVerifierAgent;
pub use difficulty_verifier::DifficultyVerifierAgent;
pub use error::{AgentError, AgentResult};
pub use grounding_verifier::GroundingVerifierAgent;
pub use question_generator::QuestionGeneratorAgent;
pub use text_editor::TextEditorAgent;
pub use types::{
    clamp_score, language_label, AgentConfig, GenerationContext, GroundingOutcome, TextEditInput,
    TextEditOutput, VerificationOutcome,
};
pub use verifier_panel::{AxisVerdict, PanelVerdict, VerificationTargets, VerifierPanel};
