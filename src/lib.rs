//! lessonforge: verified lesson question generation.
//!
//! This library turns source text chunks into multiple-choice, open and
//! matching questions, checks each one for cognitive level, difficulty and
//! grounding, and saves the accepted ones as lesson blocks.

pub mod agents;
pub mod cli;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod question;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{LlmError, StorageError};
