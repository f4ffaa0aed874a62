//! In-process block store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;

use super::blocks::{BlockStore, NewBlock, StoredBlock, StoredBlockRef};

#[derive(Debug, Default)]
struct Inner {
    /// Blocks in first-insert order.
    blocks: Vec<StoredBlock>,
    /// Block key to position in `blocks`.
    by_key: HashMap<String, usize>,
}

/// Block store held in memory. Used by tests and `--no-save` style runs.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    inner: RwLock<Inner>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.blocks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn bulk_upsert(
        &self,
        run_id: &str,
        blocks: Vec<NewBlock>,
    ) -> Result<Vec<StoredBlockRef>, StorageError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut refs = Vec::with_capacity(blocks.len());

        for block in blocks {
            let key = block.key(run_id);
            match inner.by_key.get(&key).copied() {
                Some(pos) => {
                    let existing = &mut inner.blocks[pos];
                    existing.content = block.content;
                    existing.metadata = block.metadata;
                    existing.scope = block.scope;
                    existing.updated_at = now;
                    refs.push(existing.to_ref());
                }
                None => {
                    let stored = StoredBlock {
                        id: Uuid::new_v4().to_string(),
                        block_key: key.clone(),
                        pipeline_run_id: run_id.to_string(),
                        block_type: block.block_type,
                        content: block.content,
                        metadata: block.metadata,
                        scope: block.scope,
                        created_at: now,
                        updated_at: now,
                    };
                    refs.push(stored.to_ref());
                    let pos = inner.blocks.len();
                    inner.blocks.push(stored);
                    inner.by_key.insert(key, pos);
                }
            }
        }

        Ok(refs)
    }

    async fn find_by_run(&self, run_id: &str) -> Result<Vec<StoredBlock>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .blocks
            .iter()
            .filter(|b| b.pipeline_run_id == run_id)
            .cloned()
            .collect())
    }

    async fn find_by_page(&self, page_id: &str) -> Result<Vec<StoredBlock>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .blocks
            .iter()
            .filter(|b| b.scope.page_id.as_deref() == Some(page_id))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredBlock>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.blocks.iter().find(|b| b.id == id).cloned())
    }
}
