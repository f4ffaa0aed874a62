//! Deterministic fakes for the generation and verification capabilities.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lessonforge::agents::{
    AgentError, AgentResult, CognitiveVerifier, DifficultyVerifier, GenerationContext,
    GroundingOutcome, GroundingVerifier, QuestionGenerator, TextEditInput, TextEditOutput,
    TextEditor, VerificationOutcome, VerifierPanel,
};
use lessonforge::pipeline::{GenerationLoop, GenerationRequest};
use lessonforge::question::{Chunk, CognitiveLevel, Difficulty};
use serde_json::{json, Value};

pub const REVOLUTION_TEXT: &str =
    "The causes of the revolution included a royal debt crisis, poor harvests and new ideas \
     about citizenship.";

/// Generator that replays scripted batches, then repeats `fallback` forever.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<AgentResult<Vec<Value>>>>,
    fallback: Vec<Value>,
    calls: AtomicUsize,
    requested: Mutex<Vec<usize>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<AgentResult<Vec<Value>>>) -> Arc<Self> {
        Self::with_fallback(script, Vec::new())
    }

    pub fn with_fallback(script: Vec<AgentResult<Vec<Value>>>, fallback: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(&self, ctx: &GenerationContext) -> AgentResult<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(ctx.num_questions);
        match self.script.lock().unwrap().pop_front() {
            Some(batch) => batch,
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Verifier for all three axes with per-axis switches and call recording.
#[derive(Default)]
pub struct FakeVerifiers {
    pub cognitive_matches: bool,
    pub difficulty_matches: bool,
    pub fail_cognitive: bool,
    pub fail_difficulty: bool,
    pub fail_grounding: bool,
    /// Stems the grounding verifier reports as unsupported.
    pub ungrounded: Vec<String>,
    pub cognitive_calls: AtomicUsize,
    pub difficulty_calls: AtomicUsize,
    pub grounded_stems: Mutex<Vec<String>>,
}

impl FakeVerifiers {
    /// Accepts every candidate on every axis.
    pub fn accepting() -> Self {
        Self {
            cognitive_matches: true,
            difficulty_matches: true,
            ..Default::default()
        }
    }

    pub fn grounding_calls_for(&self, stem: &str) -> usize {
        self.grounded_stems
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == stem)
            .count()
    }

    fn failure(verifier: &str) -> AgentError {
        AgentError::VerifierCallFailed {
            verifier: verifier.to_string(),
            reason: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl CognitiveVerifier for FakeVerifiers {
    async fn verify_cognitive(
        &self,
        _stem: &str,
        target: CognitiveLevel,
    ) -> AgentResult<VerificationOutcome> {
        self.cognitive_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_cognitive {
            return Err(Self::failure("cognitive"));
        }
        Ok(VerificationOutcome {
            detected: Some(target.to_string()),
            matches: self.cognitive_matches,
            score: Some(0.8),
            justification: Some("fake".to_string()),
        })
    }
}

#[async_trait]
impl DifficultyVerifier for FakeVerifiers {
    async fn verify_difficulty(
        &self,
        _stem: &str,
        _supporting_text: &str,
        target: Difficulty,
    ) -> AgentResult<VerificationOutcome> {
        self.difficulty_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_difficulty {
            return Err(Self::failure("difficulty"));
        }
        Ok(VerificationOutcome {
            detected: Some(target.to_string()),
            matches: self.difficulty_matches,
            score: Some(0.7),
            justification: None,
        })
    }
}

#[async_trait]
impl GroundingVerifier for FakeVerifiers {
    async fn verify_grounding(
        &self,
        stem: &str,
        _answer: &str,
        _explanation: &str,
        _chunk_text: &str,
    ) -> AgentResult<GroundingOutcome> {
        self.grounded_stems.lock().unwrap().push(stem.to_string());
        if self.fail_grounding {
            return Err(Self::failure("grounding"));
        }
        Ok(GroundingOutcome {
            grounded: !self.ungrounded.iter().any(|s| s == stem),
            score: Some(1.0),
            evidence: vec!["debt crisis".to_string()],
            justification: None,
        })
    }
}

/// Editor that returns a fixed rewrite, or fails when `fail` is set.
pub struct FakeEditor {
    pub edited_text: String,
    pub justification: String,
    pub fail: bool,
    pub last_input: Mutex<Option<TextEditInput>>,
}

impl FakeEditor {
    pub fn new(edited_text: &str, justification: &str) -> Arc<Self> {
        Arc::new(Self {
            edited_text: edited_text.to_string(),
            justification: justification.to_string(),
            fail: false,
            last_input: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            edited_text: String::new(),
            justification: String::new(),
            fail: true,
            last_input: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TextEditor for FakeEditor {
    async fn edit(&self, input: &TextEditInput) -> AgentResult<TextEditOutput> {
        *self.last_input.lock().unwrap() = Some(input.clone());
        if self.fail {
            return Err(AgentError::TextEditFailed("model refused".to_string()));
        }
        Ok(TextEditOutput {
            edited_text: self.edited_text.clone(),
            justification: self.justification.clone(),
        })
    }
}

pub fn panel(verifiers: Arc<FakeVerifiers>) -> VerifierPanel {
    VerifierPanel::new(verifiers.clone(), verifiers.clone(), verifiers)
}

pub fn generation_loop(
    generator: Arc<ScriptedGenerator>,
    verifiers: Arc<FakeVerifiers>,
) -> GenerationLoop {
    GenerationLoop::new(generator, panel(verifiers)).with_shuffle_seed(Some(42))
}

pub fn mcq(stem: &str) -> Value {
    json!({
        "type": "mcq",
        "stem": stem,
        "choices": ["Debt", "Weather", "Music", "Sport"],
        "correct_index": 0,
        "explanation": "The text names the debt crisis."
    })
}

pub fn revolution_request(target: usize, chunks: usize) -> GenerationRequest {
    GenerationRequest {
        topic: "Causes of a revolution".to_string(),
        subject: "History".to_string(),
        grade_level: "9".to_string(),
        num_questions: Some(target),
        chunks: (0..chunks)
            .map(|i| Chunk::new(format!("c{}", i + 1), REVOLUTION_TEXT))
            .collect(),
        ..Default::default()
    }
}
