//! Run identifiers and deterministic block keys.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generates a pipeline run identifier: `run_YYYYMMDD_HHMMSS_<8 hex>` (UTC).
pub fn new_pipeline_run_id() -> String {
    let now = Utc::now().format("%Y%m%d_%H%M%S");
    let uid = Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", now, &uid[..8])
}

/// Deterministic upsert key for a block within a run.
///
/// Two blocks with the same run, type and identity text map to the same key,
/// so re-saving a run overwrites instead of duplicating.
pub fn block_key(run_id: &str, block_type: &str, identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(block_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(identity.trim().as_bytes());
    hex::encode(hasher.finalize())
}
