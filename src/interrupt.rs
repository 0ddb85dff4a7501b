//! The ambient interrupt channel: a per-invocation, single-slot resume-value
//! carrier implemented as a Tokio task-local cell. Each node invocation is
//! scoped with [`with_resume_scope`], which brackets exactly that call.
//! [`interrupt`] is the only operation node bodies see; it is a typed
//! suspension (an `Err` value propagated with `?`), not a thrown exception,
//! so there is nothing for a node to "catch" by accident.

use std::cell::RefCell;

use serde_json::Value;
use std::future::Future;

use crate::error::NodeError;

tokio::task_local! {
    static RESUME_SLOT: RefCell<Option<Value>>;
}

/// Runs `f` with the interrupt slot set to `resume` for the duration of the
/// returned future. Every node invocation — resuming or not — must be run
/// inside this scope; passing `None` is how the engine says "no resume value
/// is available for this node right now."
pub(crate) async fn with_resume_scope<F, Fut>(resume: Option<Value>, f: F) -> Fut::Output
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    RESUME_SLOT.scope(RefCell::new(resume), f()).await
}

/// Called from a node body. If the slot holds a resume value, it is returned
/// (and left in place — the engine clears it after the node returns, not
/// this call). Otherwise this signals a cooperative suspension carrying
/// `payload`, which the engine's node-invocation frame interprets as an
/// interrupt rather than a crash.
pub async fn interrupt(payload: Value) -> Result<Value, NodeError> {
    let resume = RESUME_SLOT.try_with(|slot| slot.borrow().clone()).unwrap_or(None);
    match resume {
        Some(value) => Ok(value),
        None => Err(NodeError::Interrupted(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn no_resume_value_suspends() {
        let result = with_resume_scope(None, || interrupt(json!("pause"))).await;
        assert!(matches!(result, Err(NodeError::Interrupted(v)) if v == json!("pause")));
    }

    #[tokio::test]
    async fn resume_value_is_returned_without_consuming() {
        let result = with_resume_scope(Some(json!(true)), || async {
            let first = interrupt(json!("pause")).await?;
            let second = interrupt(json!("pause again")).await?;
            Ok::<_, NodeError>((first, second))
        })
        .await
        .unwrap();
        assert_eq!(result, (json!(true), json!(true)));
    }
}
