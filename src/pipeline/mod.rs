//! Stage-2 pipeline: the question generation loop and the service around it.
//!
//! # Flow
//!
//! 1. **Request**: a [`Stage2Request`] names a topic, source chunks and targets
//! 2. **Generation**: the [`GenerationLoop`] sweeps the chunks, asking the
//!    generator for the questions still missing
//! 3. **Filtering**: each candidate is normalized, deduplicated and judged by
//!    the verifier panel
//! 4. **Storage**: accepted questions are saved as blocks under one run id
//!
//! # Example
//!
//! ```rust,ignore
//! use lessonforge::pipeline::{PipelineConfig, Stage2Request, Stage2Service};
//! use lessonforge::storage::SqliteBlockStore;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::from_env()?;
//! let store = Arc::new(SqliteBlockStore::open("lessonforge.db").await?);
//! let service = Stage2Service::from_config(llm, &config, store);
//!
//! let result = service.run(&request).await?;
//! println!("{} questions, run {}", result.generated.len(), result.pipeline_run_id);
//! ```

pub mod config;
pub mod generation_loop;
pub mod stage2;
pub mod summary;
pub mod types;

pub use config::{ConfigError, PipelineConfig};
pub use generation_loop::GenerationLoop;
pub use stage2::{
    PipelineError, Stage2Mode, Stage2Request, Stage2Result, Stage2Service, Stage2Summary,
};
pub use summary::RunSummary;
pub use types::{
    max_attempts, AcceptedQuestion, GenerationOutcome, GenerationRequest, LoopState,
    FREE_PROMPT_CHUNK_ID,
};
