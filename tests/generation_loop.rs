//! End-to-end behaviour of the generation loop over deterministic fakes.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{generation_loop, mcq, revolution_request, FakeVerifiers, ScriptedGenerator};
use lessonforge::pipeline::{max_attempts, LoopState, FREE_PROMPT_CHUNK_ID};
use lessonforge::question::{CandidateQuestion, CognitiveLevel, Difficulty};
use serde_json::json;

#[tokio::test]
async fn test_two_distinct_questions_finish_in_one_attempt() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1"), mcq("Q2")])]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator.clone(), verifiers);

    let outcome = lp.run(&revolution_request(2, 1)).await;

    assert_eq!(outcome.state, LoopState::Done);
    assert_eq!(outcome.summary.attempts, 1);
    assert_eq!(generator.calls(), 1);
    let stems: Vec<&str> = outcome.accepted.iter().map(|q| q.question.stem()).collect();
    assert_eq!(stems, vec!["Q1", "Q2"]);
    assert!(outcome.accepted.iter().all(|q| q.chunk_id == "c1"));
    assert_eq!(outcome.summary.total_questions, 2);
    assert_eq!(outcome.summary.distinct_accepted_stems, 2);
}

#[tokio::test]
async fn test_loop_stops_after_attempt_budget() {
    let generator = ScriptedGenerator::new(vec![]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator.clone(), verifiers);

    let outcome = lp.run(&revolution_request(3, 4)).await;

    assert_eq!(outcome.state, LoopState::Exhausted);
    assert_eq!(outcome.summary.attempts, 6);
    assert_eq!(outcome.summary.max_attempts, max_attempts(3));
    assert_eq!(generator.calls(), 6 * 4);
    assert!(outcome.accepted.is_empty());
}

#[tokio::test]
async fn test_always_malformed_is_partial_success_not_error() {
    let generator = ScriptedGenerator::with_fallback(vec![], vec![json!({"choices": ["A", "B"]})]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator, verifiers.clone());

    let outcome = lp.run(&revolution_request(5, 1)).await;

    assert_eq!(outcome.state, LoopState::Exhausted);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.summary.attempts, outcome.summary.max_attempts);
    assert_eq!(outcome.summary.attempts, 10);
    assert_eq!(outcome.summary.total_skipped(), 10);
    assert!(verifiers.grounded_stems.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_cognitive_target_skips_that_axis() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1")])]);
    let verifiers = Arc::new(FakeVerifiers {
        cognitive_matches: false,
        difficulty_matches: true,
        ..Default::default()
    });
    let lp = generation_loop(generator, verifiers.clone());

    let outcome = lp.run(&revolution_request(1, 1)).await;

    assert_eq!(outcome.state, LoopState::Done);
    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(verifiers.cognitive_calls.load(Ordering::SeqCst), 0);
    assert!(outcome.accepted[0].cognitive.is_none());
}

#[tokio::test]
async fn test_cognitive_mismatch_rejects_when_target_is_set() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1")])]);
    let verifiers = Arc::new(FakeVerifiers {
        cognitive_matches: false,
        difficulty_matches: true,
        ..Default::default()
    });
    let lp = generation_loop(generator, verifiers.clone());
    let mut request = revolution_request(1, 1);
    request.cognitive_target = Some(CognitiveLevel::InferenceEvaluation);

    let outcome = lp.run(&request).await;

    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.summary.cognitive_mismatches, 1);
    assert_eq!(outcome.summary.rejected_by_verifiers, 1);
    assert_eq!(verifiers.cognitive_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_verifier_failure_on_requested_axis_rejects() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1"), mcq("Q2")])]);
    let verifiers = Arc::new(FakeVerifiers {
        fail_difficulty: true,
        ..FakeVerifiers::accepting()
    });
    let lp = generation_loop(generator, verifiers);
    let mut request = revolution_request(1, 1);
    request.difficulty_target = Some(Difficulty::Medium);

    let outcome = lp.run(&request).await;

    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.summary.rejected_by_verifiers, 2);
    assert_eq!(outcome.summary.verifier_errors, 2);
    assert_eq!(outcome.summary.difficulty_mismatches, 0);
    assert_eq!(outcome.state, LoopState::Exhausted);
}

#[tokio::test]
async fn test_grounding_failure_rejects_without_targets() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1")])]);
    let verifiers = Arc::new(FakeVerifiers {
        fail_grounding: true,
        ..FakeVerifiers::accepting()
    });
    let lp = generation_loop(generator, verifiers);

    let outcome = lp.run(&revolution_request(1, 1)).await;

    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.summary.verifier_errors, 1);
    assert_eq!(outcome.summary.ungrounded, 0);
}

#[tokio::test]
async fn test_rejected_stem_is_never_verified_twice() {
    let generator = ScriptedGenerator::with_fallback(vec![], vec![mcq("X")]);
    let verifiers = Arc::new(FakeVerifiers {
        ungrounded: vec!["X".to_string()],
        ..FakeVerifiers::accepting()
    });
    let lp = generation_loop(generator.clone(), verifiers.clone());

    let outcome = lp.run(&revolution_request(1, 1)).await;

    assert_eq!(outcome.state, LoopState::Exhausted);
    assert_eq!(generator.calls(), 3);
    assert_eq!(verifiers.grounding_calls_for("X"), 1);
    assert_eq!(outcome.summary.ungrounded, 1);
    assert_eq!(outcome.summary.skipped_previously_rejected, 2);
    assert_eq!(outcome.summary.distinct_rejected_stems, 1);
    assert_eq!(outcome.summary.distinct_accepted_stems, 0);
}

#[tokio::test]
async fn test_accepted_mcq_keeps_its_correct_answer() {
    let batch: Vec<_> = (1..=4).map(|i| mcq(&format!("Q{i}"))).collect();
    let generator = ScriptedGenerator::new(vec![Ok(batch)]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator, verifiers);

    let outcome = lp.run(&revolution_request(4, 1)).await;

    assert_eq!(outcome.accepted.len(), 4);
    for accepted in &outcome.accepted {
        match &accepted.question {
            CandidateQuestion::Mcq(q) => {
                assert_eq!(q.choices.len(), 4);
                assert_eq!(q.choices[q.correct_index], "Debt");
            }
            other => panic!("expected mcq, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_same_seed_gives_same_choice_order() {
    let run = || async {
        let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1"), mcq("Q2")])]);
        let verifiers = Arc::new(FakeVerifiers::accepting());
        generation_loop(generator, verifiers)
            .run(&revolution_request(2, 1))
            .await
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first.accepted, second.accepted);
}

#[tokio::test]
async fn test_free_prompt_stands_in_for_missing_chunks() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![mcq("Q1")])]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator, verifiers);
    let mut request = revolution_request(1, 0);
    request.free_prompt = Some("causes of the revolution".to_string());

    let outcome = lp.run(&request).await;

    assert_eq!(outcome.state, LoopState::Done);
    assert_eq!(outcome.accepted[0].chunk_id, FREE_PROMPT_CHUNK_ID);
    assert_eq!(
        outcome.chunks[0].text,
        "Question topic: causes of the revolution"
    );
}

#[tokio::test]
async fn test_request_without_source_is_flagged_invalid() {
    let generator = ScriptedGenerator::new(vec![]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator.clone(), verifiers);
    let mut request = revolution_request(2, 0);
    request.chunks.push(lessonforge::question::Chunk::new("blank", "   "));

    let outcome = lp.run(&request).await;

    assert_eq!(outcome.state, LoopState::InvalidRequest);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.summary.ignored_blank_chunks, 1);
    assert!(outcome.summary.invalid_request.is_some());
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_open_and_matching_candidates_use_their_own_stems() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![
        json!({"type": "open", "prompt": "Explain the debt crisis.", "ideal_answer": "Wars cost money."}),
        json!({"instructions": "Match each cause to its effect.", "pairs": [["Debt", "Taxes"], {"left": "Harvest", "right": "Bread prices"}]}),
    ])]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator, verifiers.clone());

    let outcome = lp.run(&revolution_request(2, 1)).await;

    assert_eq!(outcome.state, LoopState::Done);
    assert_eq!(outcome.accepted[0].stem_key, "Explain the debt crisis.");
    assert_eq!(outcome.accepted[1].stem_key, "Match each cause to its effect.");
    assert_eq!(verifiers.grounding_calls_for("Match each cause to its effect."), 1);
}

#[tokio::test]
async fn test_blank_open_and_matching_stems_are_skipped() {
    let generator = ScriptedGenerator::new(vec![Ok(vec![
        json!({"type": "open", "stem": "   ", "expected_answer": "x"}),
        json!({"type": "matching", "instructions": "  ", "pairs": [["a", "b"]]}),
    ])]);
    let verifiers = Arc::new(FakeVerifiers::accepting());
    let lp = generation_loop(generator, verifiers.clone());

    let outcome = lp.run(&revolution_request(2, 1)).await;

    assert_eq!(outcome.state, LoopState::Exhausted);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.summary.skipped_blank_stem, 2);
    assert_eq!(outcome.summary.skipped_malformed, 0);
    assert!(verifiers.grounded_stems.lock().unwrap().is_empty());
}
