//! Shared utility functions for lessonforge.

pub mod ids;
pub mod json_extraction;

pub use ids::{block_key, new_pipeline_run_id};
pub use json_extraction::{preview, try_extract_json, JsonExtractionError};
