//! Block persistence.
//!
//! Accepted questions and edited paragraphs are saved as blocks keyed by
//! pipeline run, block type and identity text. Two stores implement
//! [`BlockStore`]:
//!
//! - [`SqliteBlockStore`]: a SQLite file, used by the CLI
//! - [`MemoryBlockStore`]: process memory, used by tests
//!
//! ```rust,ignore
//! use lessonforge::storage::{BlockStore, SqliteBlockStore};
//!
//! let store = SqliteBlockStore::open("lessonforge.db").await?;
//! let blocks = store.find_by_run("run_20260101_120000_ab12cd34").await?;
//! ```

pub mod blocks;
pub mod memory;
pub mod sqlite;

pub use crate::error::StorageError;
pub use blocks::{BlockScope, BlockStore, BlockType, NewBlock, StoredBlock, StoredBlockRef};
pub use memory::MemoryBlockStore;
pub use sqlite::SqliteBlockStore;
