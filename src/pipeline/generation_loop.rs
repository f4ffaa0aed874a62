//! The stage-2 question generation loop.
//!
//! One run sweeps every chunk per attempt, asking the generator only for
//! the questions still missing, and pushes each candidate through
//! normalization, deduplication and the verifier panel in the order the
//! generator returned them. The run stops as soon as the target is met
//! or the attempt budget of `max(3, 2 * target)` is spent.
//!
//! Nothing inside a run escapes as an error. Malformed candidates, failed
//! generator calls and failed verifier calls are counted in the
//! [`RunSummary`] and the loop carries on.

use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::agents::{PanelVerdict, QuestionGenerator, VerificationTargets, VerifierPanel};
use crate::question::{
    normalize_with_default, shuffle_rng, shuffle_with_rng, CandidateQuestion, Chunk, DedupStatus,
    DeduplicationTracker, MalformedQuestion, QuestionKind,
};

use super::summary::RunSummary;
use super::types::{
    max_attempts, AcceptedQuestion, GenerationOutcome, GenerationRequest, LoopState,
};

/// Ephemeral state owned by one run.
#[derive(Debug)]
struct GenerationRunState {
    accepted: Vec<AcceptedQuestion>,
    tracker: DeduplicationTracker,
    attempts: usize,
    target: usize,
    max_attempts: usize,
    /// Index of the chunk being swept in the current attempt.
    chunk_cursor: usize,
}

impl GenerationRunState {
    fn new(target: usize) -> Self {
        Self {
            accepted: Vec::with_capacity(target),
            tracker: DeduplicationTracker::new(),
            attempts: 0,
            target,
            max_attempts: max_attempts(target),
            chunk_cursor: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.target.saturating_sub(self.accepted.len())
    }

    fn phase(&self) -> LoopState {
        if self.accepted.len() >= self.target {
            LoopState::Done
        } else if self.attempts >= self.max_attempts {
            LoopState::Exhausted
        } else {
            LoopState::Collecting
        }
    }
}

/// Drives generation runs over injected capabilities.
#[derive(Clone)]
pub struct GenerationLoop {
    generator: Arc<dyn QuestionGenerator>,
    panel: VerifierPanel,
    shuffle_seed: Option<u64>,
    max_target: usize,
}

impl std::fmt::Debug for GenerationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationLoop")
            .field("shuffle_seed", &self.shuffle_seed)
            .field("max_target", &self.max_target)
            .finish_non_exhaustive()
    }
}

impl GenerationLoop {
    /// Default cap on a request's target count.
    pub const DEFAULT_MAX_TARGET: usize = 20;

    pub fn new(generator: Arc<dyn QuestionGenerator>, panel: VerifierPanel) -> Self {
        Self {
            generator,
            panel,
            shuffle_seed: None,
            max_target: Self::DEFAULT_MAX_TARGET,
        }
    }

    /// Seeds the choice shuffler so runs are reproducible.
    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    pub fn with_max_target(mut self, max_target: usize) -> Self {
        self.max_target = max_target;
        self
    }

    /// Runs the loop to completion for one request.
    #[instrument(skip(self, request), fields(topic = %request.topic))]
    pub async fn run(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut summary = RunSummary::default();
        let target = request.target_count();
        summary.requested = target;

        let (chunks, ignored) = request.usable_chunks();
        summary.ignored_blank_chunks = ignored;
        summary.num_chunks = chunks.len();

        if target == 0 || target > self.max_target {
            return Self::invalid(
                summary,
                chunks,
                format!(
                    "num_questions must be between 1 and {}, got {}",
                    self.max_target, target
                ),
            );
        }
        if chunks.is_empty() {
            return Self::invalid(
                summary,
                chunks,
                "no chunk text and no free prompt supplied".to_string(),
            );
        }

        let mut state = GenerationRunState::new(target);
        summary.max_attempts = state.max_attempts;
        let mut rng = shuffle_rng(self.shuffle_seed);
        let default_kind = request.primary_question_type();
        let targets = request.targets();

        info!(
            target_count = target,
            chunks = chunks.len(),
            max_attempts = state.max_attempts,
            question_type = %default_kind,
            "Starting question generation"
        );

        while state.phase() == LoopState::Collecting {
            for (cursor, chunk) in chunks.iter().enumerate() {
                let remaining = state.remaining();
                if remaining == 0 {
                    break;
                }
                state.chunk_cursor = cursor;

                let ctx = request.context_for(chunk, remaining);
                summary.generation_calls += 1;
                let candidates = match self.generator.generate(&ctx).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        summary.generation_failures += 1;
                        warn!(
                            attempt = state.attempts,
                            chunk_id = %chunk.chunk_id,
                            error = %e,
                            "Generation call failed"
                        );
                        continue;
                    }
                };
                debug!(
                    attempt = state.attempts,
                    chunk_id = %chunk.chunk_id,
                    requested = remaining,
                    returned = candidates.len(),
                    "Generator returned candidates"
                );

                for raw in candidates {
                    summary.candidates_seen += 1;
                    self.consider(
                        raw,
                        chunk,
                        default_kind,
                        &targets,
                        &mut state,
                        &mut rng,
                        &mut summary,
                    )
                    .await;
                    if state.remaining() == 0 {
                        break;
                    }
                }
            }
            state.attempts += 1;
            debug!(
                attempt = state.attempts,
                accepted = state.accepted.len(),
                "Attempt finished"
            );
        }

        let final_state = state.phase();
        summary.attempts = state.attempts;
        summary.total_questions = state.accepted.len();
        summary.distinct_accepted_stems = state.tracker.accepted_count();
        summary.distinct_rejected_stems = state.tracker.rejected_count();

        info!(
            state = %final_state,
            accepted = summary.total_questions,
            attempts = summary.attempts,
            rejected = summary.rejected_by_verifiers,
            skipped = summary.total_skipped(),
            "Question generation finished"
        );

        GenerationOutcome {
            state: final_state,
            accepted: state.accepted,
            summary,
            chunks,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn consider(
        &self,
        raw: Value,
        chunk: &Chunk,
        default_kind: QuestionKind,
        targets: &VerificationTargets,
        state: &mut GenerationRunState,
        rng: &mut ChaCha8Rng,
        summary: &mut RunSummary,
    ) {
        let question = match normalize_with_default(&raw, default_kind) {
            Ok(q) => q,
            Err(e) => {
                match e {
                    MalformedQuestion::NotAnObject => summary.skipped_not_object += 1,
                    MalformedQuestion::UnsupportedKind(_) => summary.skipped_unsupported_kind += 1,
                    MalformedQuestion::MissingStem => summary.skipped_blank_stem += 1,
                    _ => summary.skipped_malformed += 1,
                }
                debug!(chunk_id = %chunk.chunk_id, reason = %e, "Skipping malformed candidate");
                return;
            }
        };
        let question = match question {
            CandidateQuestion::Mcq(_) => shuffle_with_rng(question, rng),
            other => other,
        };

        let stem = question.stem_key().to_string();

        match state.tracker.check(&stem) {
            DedupStatus::Fresh => {}
            DedupStatus::Duplicate => {
                summary.skipped_duplicate += 1;
                debug!(stem = %stem, "Skipping duplicate stem");
                return;
            }
            DedupStatus::PreviouslyRejected => {
                summary.skipped_previously_rejected += 1;
                debug!(stem = %stem, "Skipping previously rejected stem");
                return;
            }
        }

        let verdict = self.panel.evaluate(&question, chunk, targets).await;
        summary.verifier_errors += verdict.error_count();

        if !verdict.accepted() {
            record_rejection(&verdict, summary);
            state.tracker.record_rejected(&stem);
            info!(
                stem = %stem,
                chunk_id = %chunk.chunk_id,
                failed = ?verdict.failed_axes(),
                "Candidate rejected by verifiers"
            );
            return;
        }

        state.tracker.record_accepted(&stem);
        let PanelVerdict {
            cognitive,
            difficulty,
            grounding,
        } = verdict;
        state.accepted.push(AcceptedQuestion {
            question,
            stem_key: stem.clone(),
            chunk_id: chunk.chunk_id.clone(),
            cognitive: cognitive.into_outcome(),
            difficulty: difficulty.into_outcome(),
            grounding: grounding.into_outcome(),
        });
        debug!(
            stem = %stem,
            cursor = state.chunk_cursor,
            accepted = state.accepted.len(),
            "Candidate accepted"
        );
    }

    fn invalid(mut summary: RunSummary, chunks: Vec<Chunk>, reason: String) -> GenerationOutcome {
        warn!(reason = %reason, "Invalid generation request");
        summary.invalid_request = Some(reason);
        GenerationOutcome {
            state: LoopState::InvalidRequest,
            accepted: Vec::new(),
            summary,
            chunks,
        }
    }
}

fn record_rejection(verdict: &PanelVerdict, summary: &mut RunSummary) {
    summary.rejected_by_verifiers += 1;
    if verdict.cognitive.is_mismatch() {
        summary.cognitive_mismatches += 1;
    }
    if verdict.difficulty.is_mismatch() {
        summary.difficulty_mismatches += 1;
    }
    if verdict.grounding.is_mismatch() {
        summary.ungrounded += 1;
    }
}
