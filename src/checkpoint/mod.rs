//! The checkpoint store contract.

pub mod memory;
#[cfg(feature = "checkpoint-sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CheckpointError;
use crate::state::StateMap;
use crate::types::NodeId;

pub use memory::InMemoryCheckpointStore;
#[cfg(feature = "checkpoint-sqlite")]
pub use sqlite::SqliteCheckpointStore;

/// `{value, node}` — the node awaiting a resume value, and the payload it
/// surfaced when it interrupted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingInterrupt {
    pub value: Value,
    pub node: NodeId,
}

/// A durable snapshot of a single super-step boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_id: String,
    pub parent_id: Option<String>,
    pub state: StateMap,
    pub next_nodes: Vec<NodeId>,
    pub step: u64,
    pub metadata: FxHashMap<String, Value>,
    pub pending_interrupts: Option<Vec<PendingInterrupt>>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        parent_id: Option<String>,
        state: StateMap,
        next_nodes: Vec<NodeId>,
        step: u64,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: generate_checkpoint_id(),
            parent_id,
            state,
            next_nodes,
            step,
            metadata: FxHashMap::default(),
            pending_interrupts: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_pending_interrupts(mut self, pending: Vec<PendingInterrupt>) -> Self {
        self.pending_interrupts = Some(pending);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: FxHashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Unguessable identity: URL-safe base64 of 16 random bytes, no padding.
fn generate_checkpoint_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Extensible key/value bag identifying which thread's checkpoints to act
/// on. `thread_id` is required; backends may read additional keys (a
/// connection handle, TTL, schema prefix) from `extra`.
#[derive(Debug, Clone, Default)]
pub struct CheckpointConfig {
    pub thread_id: Option<String>,
    pub extra: FxHashMap<String, Value>,
}

impl CheckpointConfig {
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            extra: FxHashMap::default(),
        }
    }

    pub fn thread_id(&self) -> Result<&str, CheckpointError> {
        self.thread_id.as_deref().ok_or(CheckpointError::MissingThreadId)
    }
}

/// Options for [`CheckpointStore::list`].
#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub limit: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

/// A pluggable backend for durable checkpoint storage. The engine is
/// agnostic to which implementation is configured; see [`InMemoryCheckpointStore`]
/// (always available) and [`SqliteCheckpointStore`] (behind `checkpoint-sqlite`).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, config: &CheckpointConfig, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    /// Returns the latest checkpoint (by `created_at` desc) for the thread.
    async fn load(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Most-recent-first, bounded by `options.limit`.
    async fn list(
        &self,
        config: &CheckpointConfig,
        options: ListOptions,
    ) -> Result<Vec<Checkpoint>, CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_ids_are_url_safe_and_unpadded() {
        let id = generate_checkpoint_id();
        assert!(!id.contains('+'));
        assert!(!id.contains('/'));
        assert!(!id.contains('='));
        assert_eq!(id.len(), 22); // 16 bytes -> 22 base64 chars, no padding
    }
}
