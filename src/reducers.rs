//! Per-key merge functions usable as entries in a schema's reducer table.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// A pure, associative-per-key merge function `(old, new) -> merged`.
///
/// Reducers are assumed pure and side-effect-free; the engine relies on this
/// to fold concurrent node outputs in completion order without the result
/// depending on that order, as long as the reducer is commutative for keys
/// written by more than one node in the same super-step.
pub trait Reducer: Send + Sync + fmt::Debug {
    fn reduce(&self, current: &Value, update: &Value) -> Value;
}

impl<F> Reducer for F
where
    F: Fn(&Value, &Value) -> Value + Send + Sync,
{
    fn reduce(&self, current: &Value, update: &Value) -> Value {
        self(current, update)
    }
}

#[derive(Debug, Clone)]
struct NamedFn<F> {
    name: &'static str,
    f: F,
}

impl<F> Reducer for NamedFn<F>
where
    F: Fn(&Value, &Value) -> Value + Send + Sync,
{
    fn reduce(&self, current: &Value, update: &Value) -> Value {
        (self.f)(current, update)
    }
}

impl<F> fmt::Display for NamedFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Appends `update` to the end of the `current` array. Non-array operands are
/// wrapped in a single-element array before concatenation so callers can
/// return bare scalars from a node and still accumulate a log.
pub fn append() -> Arc<dyn Reducer> {
    fn as_vec(v: &Value) -> Vec<Value> {
        match v {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }

    Arc::new(NamedFn {
        name: "append",
        f: |current: &Value, update: &Value| {
            let mut merged = as_vec(current);
            merged.extend(as_vec(update));
            Value::Array(merged)
        },
    })
}

/// Shallow-merges two JSON objects, with `update`'s keys overwriting
/// `current`'s on conflict. Non-object operands fall back to last-write-wins.
pub fn map_merge() -> Arc<dyn Reducer> {
    Arc::new(NamedFn {
        name: "map_merge",
        f: |current: &Value, update: &Value| match (current, update) {
            (Value::Object(base), Value::Object(incoming)) => {
                let mut merged = base.clone();
                for (k, v) in incoming {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Object(merged)
            }
            _ => update.clone(),
        },
    })
}

/// Numeric addition; non-numeric operands fall back to last-write-wins.
pub fn sum() -> Arc<dyn Reducer> {
    Arc::new(NamedFn {
        name: "sum",
        f: |current: &Value, update: &Value| match (current.as_f64(), update.as_f64()) {
            (Some(a), Some(b)) => {
                let total = a + b;
                if total.fract() == 0.0 {
                    Value::from(total as i64)
                } else {
                    Value::from(total)
                }
            }
            _ => update.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_concatenates_arrays() {
        let r = append();
        let merged = r.reduce(&json!(["a"]), &json!(["b"]));
        assert_eq!(merged, json!(["a", "b"]));
    }

    #[test]
    fn append_wraps_scalars() {
        let r = append();
        let merged = r.reduce(&json!([]), &json!(10));
        assert_eq!(merged, json!([10]));
    }

    #[test]
    fn map_merge_overwrites_conflicting_keys() {
        let r = map_merge();
        let merged = r.reduce(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}));
        assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn sum_adds_numbers() {
        let r = sum();
        assert_eq!(r.reduce(&json!(1), &json!(2)), json!(3));
    }
}
