//! State representation and the `apply_update` / managed-key operations that
//! fold node updates into the running state.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::schema::ReducerTable;
use crate::types::REMAINING_STEPS_KEY;

/// A mapping from symbolic keys to arbitrary JSON values. Used both as the
/// engine's running accumulator and as the read-only snapshot passed to node
/// bodies and routing functions.
pub type StateMap = FxHashMap<String, Value>;

/// A partial update produced by a node: only the keys it wants to change.
pub type StateUpdate = FxHashMap<String, Value>;

/// Read-only view of state handed to node bodies, routing functions, and
/// stream consumers. An alias today; kept distinct from [`StateMap`] so a
/// future copy-on-write representation would only touch one definition.
pub type StateSnapshot = StateMap;

/// Folds `update` into `current` through `reducers`, per key: if a reducer is
/// registered for `k`, the merged value is `reducer(current[k], update[k])`;
/// otherwise the update overwrites (`current[k] = update[k]`, last-write-wins).
/// Keys in `update` that are new relative to `current` take the reducer's
/// merge against `Value::Null` as "current", or are inserted directly when
/// unreduced.
pub fn apply_update(current: &StateMap, update: &StateUpdate, reducers: &ReducerTable) -> StateMap {
    let mut next = current.clone();
    for (key, value) in update {
        match reducers.get(key) {
            Some(reducer) => {
                let existing = next.get(key).cloned().unwrap_or(Value::Null);
                let merged = reducer.reduce(&existing, value);
                next.insert(key.clone(), merged);
            }
            None => {
                next.insert(key.clone(), value.clone());
            }
        }
    }
    next
}

/// Sets the managed `remaining_steps` key to `limit - step`, visible to node
/// bodies during execution of the current super-step only.
pub fn inject_managed(state: &mut StateMap, step: u64, limit: u64) {
    let remaining = limit.saturating_sub(step);
    state.insert(REMAINING_STEPS_KEY.to_string(), Value::from(remaining));
}

/// Removes the managed `remaining_steps` key before the state is persisted or
/// observed by the caller.
pub fn strip_managed(state: &mut StateMap) {
    state.remove(REMAINING_STEPS_KEY);
}
