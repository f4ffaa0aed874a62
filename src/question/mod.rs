//! Question model, normalization and per-run deduplication.

pub mod dedup;
pub mod normalizer;
pub mod types;

pub use dedup::{DedupStatus, DeduplicationTracker};
pub use normalizer::{
    detect_kind, is_duplicate, normalize, normalize_as, normalize_with_default, shuffle,
    shuffle_rng, shuffle_with_rng, stems_match, MalformedQuestion,
};
pub use types::{
    CandidateQuestion, Chunk, CognitiveLevel, Difficulty, MatchingPair, MatchingQuestion,
    McqQuestion, OpenQuestion, QuestionKind,
};
