//! Block records and the store abstraction.
//!
//! A block is one persisted piece of lesson content (a question or a
//! paragraph) tagged with the pipeline run that produced it and the
//! course/lesson/section/page it belongs to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;
use crate::utils::block_key;

/// Kind of a persisted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Question,
    Paragraph,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Question => "question",
            BlockType::Paragraph => "paragraph",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "question" => Some(BlockType::Question),
            "paragraph" => Some(BlockType::Paragraph),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a block lives in the course hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockScope {
    #[serde(alias = "courseOutlineId")]
    pub course_outline_id: Option<String>,
    #[serde(alias = "lessonId")]
    pub lesson_id: Option<String>,
    #[serde(alias = "sectionId")]
    pub section_id: Option<String>,
    #[serde(alias = "pageId")]
    pub page_id: Option<String>,
}

/// A block about to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlock {
    pub block_type: BlockType,
    pub content: Value,
    pub metadata: Value,
    pub scope: BlockScope,
    /// Text that identifies the block within its run: a question stem or a
    /// paragraph body.
    pub identity: String,
}

impl NewBlock {
    /// Deterministic upsert key within `run_id`.
    pub fn key(&self, run_id: &str) -> String {
        block_key(run_id, self.block_type.as_str(), &self.identity)
    }
}

/// A block as read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub id: String,
    pub block_key: String,
    pub pipeline_run_id: String,
    pub block_type: BlockType,
    pub content: Value,
    pub metadata: Value,
    pub scope: BlockScope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredBlock {
    pub fn to_ref(&self) -> StoredBlockRef {
        StoredBlockRef {
            id: self.id.clone(),
            block_type: self.block_type,
        }
    }
}

/// Identifier handed back for each upserted block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlockRef {
    pub id: String,
    pub block_type: BlockType,
}

/// Document store with upsert-by-key semantics.
///
/// Re-upserting a block with the same run, type and identity keeps its id
/// and `created_at` and replaces its content (last writer wins).
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Upserts `blocks` as one batch. Refs come back in input order.
    async fn bulk_upsert(
        &self,
        run_id: &str,
        blocks: Vec<NewBlock>,
    ) -> Result<Vec<StoredBlockRef>, StorageError>;

    /// Blocks of one run, in first-insert order.
    async fn find_by_run(&self, run_id: &str) -> Result<Vec<StoredBlock>, StorageError>;

    /// Blocks attached to one page, in first-insert order.
    async fn find_by_page(&self, page_id: &str) -> Result<Vec<StoredBlock>, StorageError>;

    async fn get(&self, id: &str) -> Result<Option<StoredBlock>, StorageError>;
}
