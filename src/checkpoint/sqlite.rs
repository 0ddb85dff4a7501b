//! Optional SQLite-backed checkpoint store, behind the `checkpoint-sqlite`
//! feature. Kept to the runtime (non-macro) `sqlx` API so the crate builds
//! without a live database at compile time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::{Checkpoint, CheckpointConfig, CheckpointStore, ListOptions, PendingInterrupt};
use crate::error::CheckpointError;
use crate::types::NodeId;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Connects to `database_url` (e.g. `sqlite://checkpoints.db`) and
    /// ensures the backing table exists.
    pub async fn connect(database_url: &str) -> Result<Self, CheckpointError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(CheckpointError::from)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT NOT NULL,
                checkpoint_id TEXT NOT NULL,
                parent_id TEXT,
                state TEXT NOT NULL,
                next_nodes TEXT NOT NULL,
                step INTEGER NOT NULL,
                metadata TEXT NOT NULL,
                pending_interrupts TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (thread_id, checkpoint_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(CheckpointError::from)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_checkpoints_thread_created ON checkpoints (thread_id, created_at)")
            .execute(&self.pool)
            .await
            .map_err(CheckpointError::from)?;
        Ok(())
    }

    fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<Checkpoint, CheckpointError> {
        let state_json: String = row.try_get("state").map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let next_nodes_json: String =
            row.try_get("next_nodes").map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let metadata_json: String =
            row.try_get("metadata").map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let pending_json: Option<String> = row
            .try_get("pending_interrupts")
            .map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let created_at_str: String =
            row.try_get("created_at").map_err(|e| CheckpointError::Backend(e.to_string()))?;

        Ok(Checkpoint {
            thread_id: row.try_get("thread_id").map_err(|e| CheckpointError::Backend(e.to_string()))?,
            checkpoint_id: row
                .try_get("checkpoint_id")
                .map_err(|e| CheckpointError::Backend(e.to_string()))?,
            parent_id: row.try_get("parent_id").map_err(|e| CheckpointError::Backend(e.to_string()))?,
            state: serde_json::from_str(&state_json).map_err(|e| CheckpointError::Backend(e.to_string()))?,
            next_nodes: serde_json::from_str::<Vec<NodeId>>(&next_nodes_json)
                .map_err(|e| CheckpointError::Backend(e.to_string()))?,
            step: {
                let step: i64 = row.try_get("step").map_err(|e| CheckpointError::Backend(e.to_string()))?;
                step as u64
            },
            metadata: serde_json::from_str(&metadata_json).map_err(|e| CheckpointError::Backend(e.to_string()))?,
            pending_interrupts: pending_json
                .map(|s| serde_json::from_str::<Vec<PendingInterrupt>>(&s))
                .transpose()
                .map_err(|e| CheckpointError::Backend(e.to_string()))?,
            created_at: created_at_str
                .parse::<DateTime<Utc>>()
                .map_err(|e| CheckpointError::Backend(e.to_string()))?,
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, config: &CheckpointConfig, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let _ = config.thread_id()?;
        let state_json = serde_json::to_string(&checkpoint.state).map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let next_nodes_json =
            serde_json::to_string(&checkpoint.next_nodes).map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let metadata_json =
            serde_json::to_string(&checkpoint.metadata).map_err(|e| CheckpointError::Backend(e.to_string()))?;
        let pending_json = checkpoint
            .pending_interrupts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CheckpointError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints
                (thread_id, checkpoint_id, parent_id, state, next_nodes, step, metadata, pending_interrupts, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(&checkpoint.checkpoint_id)
        .bind(&checkpoint.parent_id)
        .bind(state_json)
        .bind(next_nodes_json)
        .bind(checkpoint.step as i64)
        .bind(metadata_json)
        .bind(pending_json)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(CheckpointError::from)?;

        Ok(())
    }

    async fn load(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>, CheckpointError> {
        let thread_id = config.thread_id()?;
        let row = sqlx::query(
            "SELECT * FROM checkpoints WHERE thread_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CheckpointError::from)?;

        row.map(|r| Self::row_to_checkpoint(&r)).transpose()
    }

    async fn list(
        &self,
        config: &CheckpointConfig,
        options: ListOptions,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        let thread_id = config.thread_id()?;
        let rows = sqlx::query(
            "SELECT * FROM checkpoints WHERE thread_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(options.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(CheckpointError::from)?;

        rows.iter().map(Self::row_to_checkpoint).collect()
    }
}
