//! SQLite-backed block store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::StorageError;

use super::blocks::{BlockScope, BlockStore, BlockType, NewBlock, StoredBlock, StoredBlockRef};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    id                  TEXT    NOT NULL PRIMARY KEY,
    block_key           TEXT    NOT NULL UNIQUE,
    pipeline_run_id     TEXT    NOT NULL,
    block_type          TEXT    NOT NULL,

    content             TEXT    NOT NULL,
    metadata            TEXT    NOT NULL,

    -- Course scoping
    course_outline_id   TEXT,
    lesson_id           TEXT,
    section_id          TEXT,
    page_id             TEXT,

    -- Timestamps
    created_at          TEXT    NOT NULL,
    updated_at          TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blocks_run ON blocks(pipeline_run_id);
CREATE INDEX IF NOT EXISTS idx_blocks_page ON blocks(page_id);
"#;

const SELECT_COLUMNS: &str = "id, block_key, pipeline_run_id, block_type, content, metadata, \
     course_outline_id, lesson_id, section_id, page_id, created_at, updated_at";

/// Block store persisted in a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteBlockStore {
    pool: SqlitePool,
}

impl SqliteBlockStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path = path, "Block store opened");
        Ok(Self { pool })
    }

    /// Number of stored blocks.
    pub async fn count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn fetch_where(&self, clause: &str, value: &str) -> Result<Vec<StoredBlock>, StorageError> {
        let sql = format!(
            "SELECT {} FROM blocks WHERE {} = ?1 ORDER BY rowid",
            SELECT_COLUMNS, clause
        );
        let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_block).collect()
    }
}

fn row_to_block(row: &SqliteRow) -> Result<StoredBlock, StorageError> {
    let id: String = row.get("id");
    let block_type_raw: String = row.get("block_type");
    let block_type = BlockType::parse(&block_type_raw).ok_or_else(|| StorageError::CorruptBlock {
        id: id.clone(),
        reason: format!("unknown block type '{}'", block_type_raw),
    })?;
    let content: String = row.get("content");
    let metadata: String = row.get("metadata");

    Ok(StoredBlock {
        block_key: row.get("block_key"),
        pipeline_run_id: row.get("pipeline_run_id"),
        block_type,
        content: serde_json::from_str(&content)?,
        metadata: serde_json::from_str(&metadata)?,
        scope: BlockScope {
            course_outline_id: row.get("course_outline_id"),
            lesson_id: row.get("lesson_id"),
            section_id: row.get("section_id"),
            page_id: row.get("page_id"),
        },
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        id,
    })
}

#[async_trait]
impl BlockStore for SqliteBlockStore {
    async fn bulk_upsert(
        &self,
        run_id: &str,
        blocks: Vec<NewBlock>,
    ) -> Result<Vec<StoredBlockRef>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut refs = Vec::with_capacity(blocks.len());

        for block in &blocks {
            let key = block.key(run_id);
            let content = serde_json::to_string(&block.content)?;
            let metadata = serde_json::to_string(&block.metadata)?;

            sqlx::query(
                "INSERT INTO blocks (
                    id, block_key, pipeline_run_id, block_type, content, metadata,
                    course_outline_id, lesson_id, section_id, page_id, created_at, updated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?11)
                ON CONFLICT(block_key) DO UPDATE SET
                    content = excluded.content,
                    metadata = excluded.metadata,
                    course_outline_id = excluded.course_outline_id,
                    lesson_id = excluded.lesson_id,
                    section_id = excluded.section_id,
                    page_id = excluded.page_id,
                    updated_at = excluded.updated_at",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&key)
            .bind(run_id)
            .bind(block.block_type.as_str())
            .bind(&content)
            .bind(&metadata)
            .bind(&block.scope.course_outline_id)
            .bind(&block.scope.lesson_id)
            .bind(&block.scope.section_id)
            .bind(&block.scope.page_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query("SELECT id FROM blocks WHERE block_key = ?1")
                .bind(&key)
                .fetch_one(&mut *tx)
                .await?;
            refs.push(StoredBlockRef {
                id: row.get("id"),
                block_type: block.block_type,
            });
        }

        tx.commit().await?;
        tracing::debug!(run_id, count = refs.len(), "Blocks upserted");
        Ok(refs)
    }

    async fn find_by_run(&self, run_id: &str) -> Result<Vec<StoredBlock>, StorageError> {
        self.fetch_where("pipeline_run_id", run_id).await
    }

    async fn find_by_page(&self, page_id: &str) -> Result<Vec<StoredBlock>, StorageError> {
        self.fetch_where("page_id", page_id).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredBlock>, StorageError> {
        let sql = format!("SELECT {} FROM blocks WHERE id = ?1", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_block).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteBlockStore {
        let path = dir.path().join("blocks.db");
        SqliteBlockStore::open(path.to_str().unwrap()).await.unwrap()
    }

    fn question(stem: &str) -> NewBlock {
        NewBlock {
            block_type: BlockType::Question,
            content: json!({"question": {"type": "mcq", "stem": stem}}),
            metadata: json!({"verification": {"grounded": true}}),
            scope: BlockScope {
                lesson_id: Some("l1".to_string()),
                page_id: Some("p1".to_string()),
                ..Default::default()
            },
            identity: stem.to_string(),
        }
    }

    #[tokio::test]
    async fn test_bulk_upsert_and_read_back() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let refs = store
            .bulk_upsert("run_a", vec![question("Q1"), question("Q2")])
            .await
            .unwrap();
        assert_eq!(refs.len(), 2);
        assert_ne!(refs[0].id, refs[1].id);
        assert_eq!(refs[0].block_type, BlockType::Question);

        let blocks = store.find_by_run("run_a").await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].content["question"]["stem"], "Q1");
        assert_eq!(blocks[1].scope.lesson_id.as_deref(), Some("l1"));

        let fetched = store.get(&refs[1].id).await.unwrap().unwrap();
        assert_eq!(fetched.metadata["verification"]["grounded"], true);
        assert_eq!(store.find_by_page("p1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reupsert_keeps_id_and_created_at() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let first = store.bulk_upsert("run_a", vec![question("Q1")]).await.unwrap();
        let before = store.get(&first[0].id).await.unwrap().unwrap();

        let mut changed = question("Q1");
        changed.content = json!({"question": {"type": "mcq", "stem": "Q1", "rev": 2}});
        let second = store.bulk_upsert("run_a", vec![changed]).await.unwrap();

        assert_eq!(second[0].id, first[0].id);
        assert_eq!(store.count().await.unwrap(), 1);

        let after = store.get(&first[0].id).await.unwrap().unwrap();
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.content["question"]["rev"], 2);
    }

    #[tokio::test]
    async fn test_same_stem_in_another_run_is_a_new_block() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.bulk_upsert("run_a", vec![question("Q1")]).await.unwrap();
        store.bulk_upsert("run_b", vec![question("Q1")]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.find_by_run("run_b").await.unwrap().len(), 1);
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_preserves_blocks() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir).await;
            store.bulk_upsert("run_a", vec![question("Q1")]).await.unwrap();
        }
        let store = open_store(&dir).await;
        assert_eq!(store.find_by_run("run_a").await.unwrap().len(), 1);
    }
}
