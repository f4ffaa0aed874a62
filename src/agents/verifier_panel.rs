//! The three-verifier acceptance panel.
//!
//! A candidate is accepted iff every requested axis matches and the
//! grounding verifier reports the answer as grounded. An axis without a
//! target is skipped and counts as a pass. A verifier that errors on a
//! requested axis counts as a failure.

use std::sync::Arc;

use tracing::warn;

use crate::question::{CandidateQuestion, Chunk, CognitiveLevel, Difficulty};

use super::capabilities::{CognitiveVerifier, DifficultyVerifier, GroundingVerifier};
use super::error::AgentResult;
use super::types::{GroundingOutcome, VerificationOutcome};

/// Verdict on one axis of the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisVerdict<T> {
    /// No target was requested, so the verifier was not called.
    Skipped,
    Passed(T),
    Failed(T),
    /// The verifier call itself failed.
    Errored(String),
}

impl<T> AxisVerdict<T> {
    fn from_result(result: AgentResult<T>, passes: impl FnOnce(&T) -> bool) -> Self {
        match result {
            Ok(outcome) if passes(&outcome) => AxisVerdict::Passed(outcome),
            Ok(outcome) => AxisVerdict::Failed(outcome),
            Err(e) => AxisVerdict::Errored(e.to_string()),
        }
    }

    pub fn passes(&self) -> bool {
        matches!(self, AxisVerdict::Skipped | AxisVerdict::Passed(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AxisVerdict::Errored(_))
    }

    /// True when the verifier answered cleanly with a non-match.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, AxisVerdict::Failed(_))
    }

    pub fn outcome(&self) -> Option<&T> {
        match self {
            AxisVerdict::Passed(o) | AxisVerdict::Failed(o) => Some(o),
            AxisVerdict::Skipped | AxisVerdict::Errored(_) => None,
        }
    }

    pub fn into_outcome(self) -> Option<T> {
        match self {
            AxisVerdict::Passed(o) | AxisVerdict::Failed(o) => Some(o),
            AxisVerdict::Skipped | AxisVerdict::Errored(_) => None,
        }
    }
}

/// Combined verdict of the three verifiers for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelVerdict {
    pub cognitive: AxisVerdict<VerificationOutcome>,
    pub difficulty: AxisVerdict<VerificationOutcome>,
    pub grounding: AxisVerdict<GroundingOutcome>,
}

impl PanelVerdict {
    pub fn accepted(&self) -> bool {
        self.cognitive.passes() && self.difficulty.passes() && self.grounding.passes()
    }

    /// Names of the axes that caused a rejection, in panel order.
    pub fn failed_axes(&self) -> Vec<&'static str> {
        let mut axes = Vec::new();
        if !self.cognitive.passes() {
            axes.push("cognitive");
        }
        if !self.difficulty.passes() {
            axes.push("difficulty");
        }
        if !self.grounding.passes() {
            axes.push("grounding");
        }
        axes
    }

    pub fn error_count(&self) -> usize {
        [
            self.cognitive.is_error(),
            self.difficulty.is_error(),
            self.grounding.is_error(),
        ]
        .into_iter()
        .filter(|e| *e)
        .count()
    }
}

/// Requested targets. `None` skips that axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationTargets {
    pub cognitive: Option<CognitiveLevel>,
    pub difficulty: Option<Difficulty>,
}

/// The three verifier capabilities evaluated together.
#[derive(Clone)]
pub struct VerifierPanel {
    cognitive: Arc<dyn CognitiveVerifier>,
    difficulty: Arc<dyn DifficultyVerifier>,
    grounding: Arc<dyn GroundingVerifier>,
}

impl std::fmt::Debug for VerifierPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierPanel").finish_non_exhaustive()
    }
}

impl VerifierPanel {
    pub fn new(
        cognitive: Arc<dyn CognitiveVerifier>,
        difficulty: Arc<dyn DifficultyVerifier>,
        grounding: Arc<dyn GroundingVerifier>,
    ) -> Self {
        Self {
            cognitive,
            difficulty,
            grounding,
        }
    }

    /// Runs the requested verifiers for one candidate against one chunk.
    ///
    /// The three calls are independent and run concurrently. Failures are
    /// folded into the verdict and never returned as errors.
    pub async fn evaluate(
        &self,
        question: &CandidateQuestion,
        chunk: &Chunk,
        targets: &VerificationTargets,
    ) -> PanelVerdict {
        let stem = question.stem();
        let answer = question.answer_text();
        let explanation = question.explanation();

        let cognitive = async {
            match targets.cognitive {
                None => AxisVerdict::Skipped,
                Some(target) => AxisVerdict::from_result(
                    self.cognitive.verify_cognitive(stem, target).await,
                    |o| o.matches,
                ),
            }
        };
        let difficulty = async {
            match targets.difficulty {
                None => AxisVerdict::Skipped,
                Some(target) => AxisVerdict::from_result(
                    self.difficulty
                        .verify_difficulty(stem, &chunk.text, target)
                        .await,
                    |o| o.matches,
                ),
            }
        };
        let grounding = async {
            AxisVerdict::from_result(
                self.grounding
                    .verify_grounding(stem, &answer, explanation, &chunk.text)
                    .await,
                |o| o.grounded,
            )
        };

        let (cognitive, difficulty, grounding) = tokio::join!(cognitive, difficulty, grounding);

        for (verifier, error) in [
            ("cognitive", error_text(&cognitive)),
            ("difficulty", error_text(&difficulty)),
            ("grounding", error_text(&grounding)),
        ] {
            if let Some(error) = error {
                warn!(verifier, chunk_id = %chunk.chunk_id, error, "Verifier call failed");
            }
        }

        PanelVerdict {
            cognitive,
            difficulty,
            grounding,
        }
    }
}

fn error_text<T>(verdict: &AxisVerdict<T>) -> Option<&str> {
    match verdict {
        AxisVerdict::Errored(e) => Some(e.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::error::AgentError;
    use crate::question::McqQuestion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Verifier fake answering every axis from fixed settings.
    struct FakeVerifier {
        matches: bool,
        grounded: bool,
        fail: bool,
        calls: AtomicUsize,
        last_answer: Mutex<String>,
    }

    impl FakeVerifier {
        fn new(matches: bool, grounded: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                matches,
                grounded,
                fail,
                calls: AtomicUsize::new(0),
                last_answer: Mutex::new(String::new()),
            })
        }

        fn outcome(&self) -> AgentResult<VerificationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AgentError::VerifierCallFailed {
                    verifier: "fake".to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(VerificationOutcome {
                detected: Some("knowledge".to_string()),
                matches: self.matches,
                score: Some(0.5),
                justification: None,
            })
        }
    }

    #[async_trait]
    impl CognitiveVerifier for FakeVerifier {
        async fn verify_cognitive(
            &self,
            _stem: &str,
            _target: CognitiveLevel,
        ) -> AgentResult<VerificationOutcome> {
            self.outcome()
        }
    }

    #[async_trait]
    impl DifficultyVerifier for FakeVerifier {
        async fn verify_difficulty(
            &self,
            _stem: &str,
            _supporting_text: &str,
            _target: Difficulty,
        ) -> AgentResult<VerificationOutcome> {
            self.outcome()
        }
    }

    #[async_trait]
    impl GroundingVerifier for FakeVerifier {
        async fn verify_grounding(
            &self,
            _stem: &str,
            answer: &str,
            _explanation: &str,
            _chunk_text: &str,
        ) -> AgentResult<GroundingOutcome> {
            *self.last_answer.lock().unwrap() = answer.to_string();
            self.outcome().map(|_| GroundingOutcome {
                grounded: self.grounded,
                score: Some(1.0),
                evidence: vec![],
                justification: None,
            })
        }
    }

    fn question() -> CandidateQuestion {
        CandidateQuestion::Mcq(McqQuestion {
            stem: "Capital?".to_string(),
            choices: vec!["Madrid".to_string(), "Paris".to_string()],
            correct_index: 1,
            explanation: None,
        })
    }

    fn panel(
        cognitive: Arc<FakeVerifier>,
        difficulty: Arc<FakeVerifier>,
        grounding: Arc<FakeVerifier>,
    ) -> VerifierPanel {
        VerifierPanel::new(cognitive, difficulty, grounding)
    }

    #[tokio::test]
    async fn test_untargeted_axes_are_skipped() {
        let rejecting = FakeVerifier::new(false, false, false);
        let grounding = FakeVerifier::new(true, true, false);
        let panel = panel(rejecting.clone(), rejecting.clone(), grounding.clone());

        let verdict = panel
            .evaluate(&question(), &Chunk::new("c1", "text"), &VerificationTargets::default())
            .await;
        assert!(verdict.accepted());
        assert_eq!(verdict.cognitive, AxisVerdict::Skipped);
        assert_eq!(rejecting.calls.load(Ordering::SeqCst), 0);
        assert_eq!(grounding.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*grounding.last_answer.lock().unwrap(), "Paris");
    }

    #[tokio::test]
    async fn test_requested_axis_mismatch_rejects() {
        let panel = panel(
            FakeVerifier::new(false, true, false),
            FakeVerifier::new(true, true, false),
            FakeVerifier::new(true, true, false),
        );
        let targets = VerificationTargets {
            cognitive: Some(CognitiveLevel::InferenceEvaluation),
            difficulty: Some(Difficulty::Easy),
        };

        let verdict = panel.evaluate(&question(), &Chunk::new("c1", "t"), &targets).await;
        assert!(!verdict.accepted());
        assert!(verdict.cognitive.is_mismatch());
        assert_eq!(verdict.failed_axes(), vec!["cognitive"]);
    }

    #[tokio::test]
    async fn test_verifier_error_on_requested_axis_rejects() {
        let panel = panel(
            FakeVerifier::new(true, true, false),
            FakeVerifier::new(true, true, true),
            FakeVerifier::new(true, true, false),
        );
        let targets = VerificationTargets {
            cognitive: None,
            difficulty: Some(Difficulty::Medium),
        };

        let verdict = panel.evaluate(&question(), &Chunk::new("c1", "t"), &targets).await;
        assert!(!verdict.accepted());
        assert!(verdict.difficulty.is_error());
        assert_eq!(verdict.error_count(), 1);
        assert!(verdict.difficulty.outcome().is_none());
    }

    #[tokio::test]
    async fn test_ungrounded_or_failed_grounding_rejects() {
        let ungrounded = panel(
            FakeVerifier::new(true, true, false),
            FakeVerifier::new(true, true, false),
            FakeVerifier::new(true, false, false),
        );
        let verdict = ungrounded
            .evaluate(&question(), &Chunk::new("c1", "t"), &VerificationTargets::default())
            .await;
        assert!(!verdict.accepted());
        assert_eq!(verdict.failed_axes(), vec!["grounding"]);

        let failing = panel(
            FakeVerifier::new(true, true, false),
            FakeVerifier::new(true, true, false),
            FakeVerifier::new(true, true, true),
        );
        let verdict = failing
            .evaluate(&question(), &Chunk::new("c1", "t"), &VerificationTargets::default())
            .await;
        assert!(!verdict.accepted());
        assert!(verdict.grounding.is_error());
    }
}
