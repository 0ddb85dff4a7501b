//! Schema parsing: turns an ordered list of key/default/reducer entries into
//! an initial state map and a reducer table.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::reducers::Reducer;

/// One entry of an ordered schema: a key, its default value, and an optional
/// reducer. A later entry for the same key overwrites an earlier one when
/// the schema is parsed.
pub struct SchemaEntry {
    pub key: String,
    pub default: Value,
    pub reducer: Option<Arc<dyn Reducer>>,
}

impl SchemaEntry {
    /// A key with no reducer; updates to it are last-write-wins.
    pub fn plain(key: impl Into<String>, default: Value) -> Self {
        Self {
            key: key.into(),
            default,
            reducer: None,
        }
    }

    /// A key merged through `reducer` on every update.
    pub fn reduced(key: impl Into<String>, default: Value, reducer: Arc<dyn Reducer>) -> Self {
        Self {
            key: key.into(),
            default,
            reducer: Some(reducer),
        }
    }
}

/// An ordered sequence of [`SchemaEntry`] values, as the caller wrote them.
#[derive(Default)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
}

impl Schema {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>, default: Value) -> Self {
        self.entries.push(SchemaEntry::plain(key, default));
        self
    }

    #[must_use]
    pub fn with_reduced_key(
        mut self,
        key: impl Into<String>,
        default: Value,
        reducer: Arc<dyn Reducer>,
    ) -> Self {
        self.entries.push(SchemaEntry::reduced(key, default, reducer));
        self
    }

    /// Parses the schema, preserving iteration order and letting later
    /// entries for the same key overwrite earlier ones.
    pub fn parse(self) -> (FxHashMap<String, Value>, ReducerTable) {
        let mut initial = FxHashMap::default();
        let mut reducers = ReducerTable::default();
        for entry in self.entries {
            initial.insert(entry.key.clone(), entry.default);
            match entry.reducer {
                Some(reducer) => {
                    reducers.0.insert(entry.key, reducer);
                }
                None => {
                    reducers.0.remove(&entry.key);
                }
            }
        }
        (initial, reducers)
    }
}

/// Maps a subset of schema keys to their reducer. Keys absent here use
/// last-write-wins semantics in [`crate::state::apply_update`].
#[derive(Default, Clone)]
pub struct ReducerTable(pub(crate) FxHashMap<String, Arc<dyn Reducer>>);

impl ReducerTable {
    pub fn get(&self, key: &str) -> Option<&Arc<dyn Reducer>> {
        self.0.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducers::append;
    use serde_json::json;

    #[test]
    fn later_entry_for_same_key_wins() {
        let schema = Schema::new()
            .with_key("count", json!(0))
            .with_key("count", json!(1));
        let (initial, _) = schema.parse();
        assert_eq!(initial["count"], json!(1));
    }

    #[test]
    fn reducer_is_tracked_per_key() {
        let schema = Schema::new().with_reduced_key("log", json!([]), append());
        let (initial, reducers) = schema.parse();
        assert_eq!(initial["log"], json!([]));
        assert!(reducers.get("log").is_some());
    }
}
