//! Run summary counters.
//!
//! Every skip and reject in a run is counted here so a caller can tell
//! "nothing to do" from "tried and failed" without reading logs.

use serde::{Deserialize, Serialize};

/// Diagnostic counters for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Chunks swept per attempt, after blank filtering and fallback.
    pub num_chunks: usize,
    pub ignored_blank_chunks: usize,
    pub requested: usize,
    /// Accepted questions.
    pub total_questions: usize,
    pub attempts: usize,
    pub max_attempts: usize,

    pub generation_calls: usize,
    pub generation_failures: usize,
    pub candidates_seen: usize,

    pub skipped_not_object: usize,
    pub skipped_unsupported_kind: usize,
    pub skipped_malformed: usize,
    pub skipped_blank_stem: usize,
    pub skipped_duplicate: usize,
    pub skipped_previously_rejected: usize,

    pub rejected_by_verifiers: usize,
    pub cognitive_mismatches: usize,
    pub difficulty_mismatches: usize,
    pub ungrounded: usize,
    pub verifier_errors: usize,

    /// Distinct stems the tracker holds at the end of the run.
    pub distinct_accepted_stems: usize,
    pub distinct_rejected_stems: usize,

    /// Set when the request had no usable source material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_request: Option<String>,
    /// Set when the accepted questions could not be saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

impl RunSummary {
    /// Candidates dropped before reaching the verifiers.
    pub fn total_skipped(&self) -> usize {
        self.skipped_not_object
            + self.skipped_unsupported_kind
            + self.skipped_malformed
            + self.skipped_blank_stem
            + self.skipped_duplicate
            + self.skipped_previously_rejected
    }
}
