//! Error types for lessonforge operations.
//!
//! Defines the error types shared across subsystems:
//! - LLM API interactions
//! - Block persistence
//!
//! Agent, normalizer, configuration and pipeline errors live next to the
//! code that raises them.

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while persisting or reading blocks.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection to the document store failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Serialization/deserialization of a block payload failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A block read back from the store is missing required data.
    #[error("Corrupt block '{id}': {reason}")]
    CorruptBlock { id: String, reason: String },
}
