//! LLM integration for lessonforge.
//!
//! All agents depend on the [`LlmProvider`] trait rather than on a concrete
//! client, so capabilities are injected explicitly:
//!
//! ```ignore
//! use lessonforge::llm::{LiteLlmClient, LlmProvider};
//! use std::sync::Arc;
//!
//! let client: Arc<dyn LlmProvider> = Arc::new(LiteLlmClient::from_env()?);
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_MODEL,
};
