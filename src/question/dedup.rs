//! Per-run stem tracking.
//!
//! The tracker remembers every stem that was accepted or rejected during a
//! single generation run so the loop never pays for verifying the same
//! question twice.

use std::collections::HashSet;

/// Result of checking a stem against the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStatus {
    /// Never seen in this run.
    Fresh,
    /// Matches an already accepted question.
    Duplicate,
    /// Failed verification earlier in this run.
    PreviouslyRejected,
}

/// Stem sets for one generation run. Stems are compared after trimming.
#[derive(Debug, Default, Clone)]
pub struct DeduplicationTracker {
    accepted: HashSet<String>,
    rejected: HashSet<String>,
}

impl DeduplicationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a stem. An accepted match takes priority over a rejected one.
    pub fn check(&self, stem: &str) -> DedupStatus {
        let key = stem.trim();
        if self.accepted.contains(key) {
            DedupStatus::Duplicate
        } else if self.rejected.contains(key) {
            DedupStatus::PreviouslyRejected
        } else {
            DedupStatus::Fresh
        }
    }

    pub fn record_accepted(&mut self, stem: &str) {
        self.accepted.insert(stem.trim().to_string());
    }

    pub fn record_rejected(&mut self, stem: &str) {
        self.rejected.insert(stem.trim().to_string());
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_then_duplicate() {
        let mut tracker = DeduplicationTracker::new();
        assert_eq!(tracker.check("Why?"), DedupStatus::Fresh);

        tracker.record_accepted("Why?");
        assert_eq!(tracker.check("  Why?  "), DedupStatus::Duplicate);
        assert_eq!(tracker.accepted_count(), 1);
    }

    #[test]
    fn test_rejected_stems_are_remembered() {
        let mut tracker = DeduplicationTracker::new();
        tracker.record_rejected("Bad stem");
        tracker.record_rejected("Bad stem ");
        assert_eq!(tracker.check("Bad stem"), DedupStatus::PreviouslyRejected);
        assert_eq!(tracker.rejected_count(), 1);
    }

    #[test]
    fn test_duplicate_takes_priority() {
        let mut tracker = DeduplicationTracker::new();
        tracker.record_rejected("Q");
        tracker.record_accepted("Q");
        assert_eq!(tracker.check("Q"), DedupStatus::Duplicate);
    }
}
