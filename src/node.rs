//! The node contract: a single callable shape every graph participant
//! implements, regardless of whether it closes over a context value.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::control::NodePartial;
use crate::error::NodeError;
use crate::interrupt;
use crate::state::StateSnapshot;
use crate::types::NodeId;

/// Opaque per-invocation context passed alongside state, as `InvokeOptions`'s
/// `context` value. Node authors downcast it with [`NodeContext::context`]
/// when they know the concrete type their graph was invoked with.
pub type InvokeContext = Arc<dyn Any + Send + Sync>;

/// Everything a node body needs beyond the state snapshot: which node it is,
/// what super-step is running, the ambient invocation context, and the
/// interrupt operation.
#[derive(Clone)]
pub struct NodeContext {
    node: NodeId,
    step: u64,
    recursion_limit: u64,
    context: Option<InvokeContext>,
}

impl NodeContext {
    pub fn new(node: NodeId, step: u64, recursion_limit: u64, context: Option<InvokeContext>) -> Self {
        Self { node, step, recursion_limit, context }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn recursion_limit(&self) -> u64 {
        self.recursion_limit
    }

    /// Downcasts the ambient invocation context to `T`, if one was supplied
    /// and it matches.
    pub fn context<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.context.as_deref().and_then(|c| c.downcast_ref::<T>())
    }

    /// Either returns an already-available resume value, or suspends the
    /// node, surfacing `payload` to the caller as an interrupt.
    pub async fn interrupt(&self, payload: Value) -> Result<Value, NodeError> {
        interrupt::interrupt(payload).await
    }
}

/// The single callable contract every graph node implements.
///
/// A compiled subgraph used as a node also implements this trait via
/// [`crate::graph::compiled::SubgraphNode`].
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodePartial, NodeError>;
}

impl fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Node")
    }
}

/// Adapts a plain async closure `Fn(&StateSnapshot, &NodeContext) -> Result<NodePartial, NodeError>`
/// into a [`Node`], so callers are never forced to write a struct for a
/// one-line node.
pub struct FnNode<F> {
    f: F,
}

impl<F> FnNode<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(StateSnapshot, NodeContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<NodePartial, NodeError>> + Send,
{
    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodePartial, NodeError> {
        (self.f)(state.clone(), ctx.clone()).await
    }
}

/// Convenience wrapper for a node that ignores the context entirely.
pub struct StatelessFnNode<F> {
    f: F,
}

impl<F> StatelessFnNode<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Node for StatelessFnNode<F>
where
    F: Fn(StateSnapshot) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<NodePartial, NodeError>> + Send,
{
    async fn run(&self, state: &StateSnapshot, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
        (self.f)(state.clone()).await
    }
}
