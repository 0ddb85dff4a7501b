//! The default, always-available checkpoint backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{Checkpoint, CheckpointConfig, CheckpointStore, ListOptions};
use crate::error::CheckpointError;

/// Keeps the full checkpoint history per thread in memory, guarded by a
/// `parking_lot::RwLock`. Lost on process exit; intended for tests,
/// examples, and single-process use.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    by_thread: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, config: &CheckpointConfig, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let thread_id = config.thread_id()?.to_string();
        let mut guard = self.by_thread.write();
        guard.entry(thread_id).or_default().push(checkpoint);
        Ok(())
    }

    async fn load(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>, CheckpointError> {
        let thread_id = config.thread_id()?;
        let guard = self.by_thread.read();
        let latest = guard
            .get(thread_id)
            .and_then(|history| history.iter().max_by_key(|c| c.created_at).cloned());
        Ok(latest)
    }

    async fn list(
        &self,
        config: &CheckpointConfig,
        options: ListOptions,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        let thread_id = config.thread_id()?;
        let guard = self.by_thread.read();
        let mut history = guard.get(thread_id).cloned().unwrap_or_default();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(options.limit);
        Ok(history)
    }
}
