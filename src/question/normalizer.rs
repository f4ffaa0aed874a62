//! Canonicalization of raw generator output.
//!
//! Generators return loosely shaped JSON: snake_case or camelCase keys,
//! legacy field names, numbers where strings belong. [`normalize`] is the
//! single boundary where those shapes are repaired and validated. Everything
//! downstream works with [`CandidateQuestion`] only.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{
    CandidateQuestion, MatchingPair, MatchingQuestion, McqQuestion, OpenQuestion, QuestionKind,
};

/// Structural validation failures raised by the normalizer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MalformedQuestion {
    #[error("Candidate is not a JSON object")]
    NotAnObject,

    #[error("Unsupported question type '{0}'")]
    UnsupportedKind(String),

    #[error("MCQ must include a non-empty 'choices' list")]
    MissingChoices,

    #[error("MCQ choice at position {index} is not a string")]
    InvalidChoice { index: usize },

    #[error("MCQ must include 'correct_index' (or 'correctIndex')")]
    MissingCorrectIndex,

    #[error("MCQ 'correct_index' must be an integer, got {0}")]
    NonIntegerCorrectIndex(String),

    #[error("MCQ 'correct_index' {index} is out of range for {len} choices")]
    CorrectIndexOutOfRange { index: i64, len: usize },

    #[error("Question must include a non-empty 'stem' or 'instructions'")]
    MissingStem,

    #[error("Open question must include a string 'expected_answer'")]
    MissingExpectedAnswer,

    #[error("Matching question must include string 'instructions'")]
    MissingInstructions,

    #[error("Matching question must include a non-empty 'pairs' list")]
    MissingPairs,

    #[error("Matching pair at position {index} must be [left, right] or {{left, right}}")]
    InvalidPair { index: usize },
}

/// Determines the question kind of a raw candidate.
///
/// An explicit `type` wins. Without one, an object carrying `instructions`
/// and `pairs` is a matching question, and anything else takes `default`.
pub fn detect_kind(
    raw: &Map<String, Value>,
    default: QuestionKind,
) -> Result<QuestionKind, MalformedQuestion> {
    match raw.get("type") {
        Some(Value::String(s)) => s.parse().map_err(MalformedQuestion::UnsupportedKind),
        Some(Value::Null) | None => {
            if raw.contains_key("instructions") && raw.contains_key("pairs") {
                Ok(QuestionKind::Matching)
            } else {
                Ok(default)
            }
        }
        Some(other) => Err(MalformedQuestion::UnsupportedKind(other.to_string())),
    }
}

/// Normalizes a raw candidate, treating untyped input as multiple-choice.
pub fn normalize(raw: &Value) -> Result<CandidateQuestion, MalformedQuestion> {
    normalize_with_default(raw, QuestionKind::Mcq)
}

/// Normalizes a raw candidate, using `default` when it carries no `type`.
pub fn normalize_with_default(
    raw: &Value,
    default: QuestionKind,
) -> Result<CandidateQuestion, MalformedQuestion> {
    let obj = raw.as_object().ok_or(MalformedQuestion::NotAnObject)?;
    let kind = detect_kind(obj, default)?;
    normalize_as(obj, kind)
}

/// Normalizes a raw candidate whose kind has already been decided.
pub fn normalize_as(
    raw: &Map<String, Value>,
    kind: QuestionKind,
) -> Result<CandidateQuestion, MalformedQuestion> {
    match kind {
        QuestionKind::Mcq => normalize_mcq(raw).map(CandidateQuestion::Mcq),
        QuestionKind::Open => Ok(CandidateQuestion::Open(normalize_open(raw)?)),
        QuestionKind::Matching => Ok(CandidateQuestion::Matching(normalize_matching(raw)?)),
    }
}

fn normalize_mcq(raw: &Map<String, Value>) -> Result<McqQuestion, MalformedQuestion> {
    let choices = match raw.get("choices") {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(index, item)| scalar_to_string(item).ok_or(MalformedQuestion::InvalidChoice { index }))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(MalformedQuestion::MissingChoices),
    };

    let raw_index = non_null(raw, "correct_index")
        .or_else(|| non_null(raw, "correctIndex"))
        .ok_or(MalformedQuestion::MissingCorrectIndex)?;
    let index = parse_index(raw_index)?;
    if index < 0 || index as usize >= choices.len() {
        return Err(MalformedQuestion::CorrectIndexOutOfRange {
            index,
            len: choices.len(),
        });
    }

    let stem = match raw.get("stem") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(MalformedQuestion::MissingStem),
    };

    Ok(McqQuestion {
        stem,
        choices,
        correct_index: index as usize,
        explanation: optional_text(raw, "explanation"),
    })
}

fn normalize_open(raw: &Map<String, Value>) -> Result<OpenQuestion, MalformedQuestion> {
    let stem = non_blank_text(raw, "stem")
        .or_else(|| non_blank_text(raw, "prompt"))
        .ok_or(MalformedQuestion::MissingStem)?;

    let expected_answer = text_field(raw, "expected_answer")
        .or_else(|| text_field(raw, "ideal_answer"))
        .ok_or(MalformedQuestion::MissingExpectedAnswer)?;

    Ok(OpenQuestion {
        stem,
        expected_answer,
        guidance: optional_text(raw, "guidance"),
    })
}

fn normalize_matching(raw: &Map<String, Value>) -> Result<MatchingQuestion, MalformedQuestion> {
    let instructions =
        text_field(raw, "instructions").ok_or(MalformedQuestion::MissingInstructions)?;
    let instructions = instructions.trim();
    if instructions.is_empty() {
        return Err(MalformedQuestion::MissingStem);
    }

    let pairs = match raw.get("pairs") {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_pair(item).ok_or(MalformedQuestion::InvalidPair { index }))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(MalformedQuestion::MissingPairs),
    };

    let distractors = match raw.get("distractors") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    };

    Ok(MatchingQuestion {
        instructions: instructions.to_string(),
        pairs,
        distractors,
    })
}

fn non_blank_text(raw: &Map<String, Value>, key: &str) -> Option<String> {
    text_field(raw, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn non_null<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|v| !v.is_null())
}

fn text_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Optional text: null, absent or blank values are dropped.
fn optional_text(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_index(value: &Value) -> Result<i64, MalformedQuestion> {
    let invalid = || MalformedQuestion::NonIntegerCorrectIndex(value.to_string());
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                    _ => Err(invalid()),
                }
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_pair(value: &Value) -> Option<MatchingPair> {
    match value {
        Value::Array(items) if items.len() == 2 => Some(MatchingPair(
            scalar_to_string(&items[0])?,
            scalar_to_string(&items[1])?,
        )),
        Value::Object(obj) => Some(MatchingPair(
            obj.get("left").and_then(scalar_to_string)?,
            obj.get("right").and_then(scalar_to_string)?,
        )),
        _ => None,
    }
}

/// Builds the shuffling RNG: seeded when `seed` is given, entropy otherwise.
pub fn shuffle_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    }
}

/// Permutes MCQ choices, tracking the correct answer through the permutation.
///
/// Precondition: `question` came out of [`normalize`]. Non-MCQ questions and
/// MCQs with fewer than two choices are returned unchanged.
pub fn shuffle(question: CandidateQuestion, seed: Option<u64>) -> CandidateQuestion {
    let mut rng = shuffle_rng(seed);
    shuffle_with_rng(question, &mut rng)
}

/// [`shuffle`] drawing from a caller-owned RNG, so one run can reuse a stream.
pub fn shuffle_with_rng(question: CandidateQuestion, rng: &mut ChaCha8Rng) -> CandidateQuestion {
    let CandidateQuestion::Mcq(mcq) = question else {
        return question;
    };
    if mcq.choices.len() < 2 {
        return CandidateQuestion::Mcq(mcq);
    }

    let mut order: Vec<usize> = (0..mcq.choices.len()).collect();
    order.shuffle(rng);

    let correct_index = order
        .iter()
        .position(|&orig| orig == mcq.correct_index)
        .unwrap_or(mcq.correct_index);
    let choices = order.iter().map(|&orig| mcq.choices[orig].clone()).collect();

    CandidateQuestion::Mcq(McqQuestion {
        choices,
        correct_index,
        ..mcq
    })
}

/// True iff both stems are non-blank and equal after trimming.
pub fn stems_match(a: &str, b: &str) -> bool {
    let a = a.trim();
    !a.is_empty() && a == b.trim()
}

/// Exact-stem duplicate test. No fuzzy or semantic matching.
pub fn is_duplicate(a: &CandidateQuestion, b: &CandidateQuestion) -> bool {
    stems_match(a.stem(), b.stem())
}
