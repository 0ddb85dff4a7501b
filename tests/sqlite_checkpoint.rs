//! Exercises the optional SQLite checkpoint backend against a real,
//! temp-directory-backed database file.

#![cfg(feature = "checkpoint-sqlite")]

use loomgraph::checkpoint::{Checkpoint, CheckpointConfig, CheckpointStore, ListOptions, SqliteCheckpointStore};
use loomgraph::types::NodeId;
use rustc_hash::FxHashMap;
use serde_json::json;

#[tokio::test]
async fn round_trips_checkpoints_through_a_real_database_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("checkpoints.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqliteCheckpointStore::connect(&url).await.expect("connect");
    let config = CheckpointConfig::for_thread("thread-1");

    let mut state: FxHashMap<String, serde_json::Value> = FxHashMap::default();
    state.insert("value".to_string(), json!(42));

    let checkpoint = Checkpoint::new("thread-1", None, state.clone(), vec![NodeId::new("next")], 3);
    let checkpoint_id = checkpoint.checkpoint_id.clone();
    store.save(&config, checkpoint).await.expect("save");

    let loaded = store.load(&config).await.expect("load").expect("checkpoint present");
    assert_eq!(loaded.checkpoint_id, checkpoint_id);
    assert_eq!(loaded.state["value"], json!(42));
    assert_eq!(loaded.next_nodes, vec![NodeId::new("next")]);
    assert_eq!(loaded.step, 3);

    let second = Checkpoint::new("thread-1", Some(checkpoint_id.clone()), state, vec![NodeId::new("final")], 4);
    store.save(&config, second).await.expect("save second");

    let history = store.list(&config, ListOptions { limit: 10 }).await.expect("list");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].step, 4);
    assert_eq!(history[1].step, 3);

    let other = CheckpointConfig::for_thread("thread-2");
    assert!(store.load(&other).await.expect("load other").is_none());
}
