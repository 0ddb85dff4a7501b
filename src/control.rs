//! Node return types: plain updates, commands, and dynamic `Send` fan-out.

use crate::state::{StateMap, StateUpdate};
use crate::types::NodeId;

/// What a node body returns: an update and, optionally, explicit `goto`
/// targets (a *command*). `goto` entries are added to the next frontier
/// ahead of any fixed/conditional edges from the same node.
#[derive(Debug, Clone, Default)]
pub struct NodePartial {
    pub update: StateUpdate,
    pub goto: Vec<NodeId>,
}

impl NodePartial {
    /// A plain update with no explicit routing.
    pub fn update(update: StateUpdate) -> Self {
        Self { update, goto: Vec::new() }
    }

    /// A command: an update plus explicit next-node targets.
    pub fn command(update: StateUpdate, goto: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            update,
            goto: goto.into_iter().collect(),
        }
    }

    /// An empty update with no routing; useful for nodes whose only purpose
    /// is a side effect.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A single `(node, state)` pair requested by a conditional routing function
/// for isolated fan-out execution. The result of running `node` on `state`
/// is discarded: it contributes nothing to the frontier and nothing to the
/// global state (see DESIGN.md's "Send fan-out semantics" note).
#[derive(Debug, Clone)]
pub struct SendOp {
    pub node: NodeId,
    pub state: StateMap,
}

impl SendOp {
    pub fn new(node: impl Into<NodeId>, state: StateMap) -> Self {
        Self { node: node.into(), state }
    }
}

/// What a conditional edge's routing function returns.
#[derive(Debug, Clone)]
pub enum RoutingOutcome {
    /// A single branch value. If the edge carries a `mapping`, this is
    /// looked up in it (a miss is a fatal routing error); otherwise it is
    /// used directly as a node name.
    Branch(String),
    /// A list of node names, used directly with no mapping lookup.
    Names(Vec<NodeId>),
    /// A sequence of isolated fan-out invocations; see [`SendOp`].
    Sends(Vec<SendOp>),
}

impl RoutingOutcome {
    pub fn branch(value: impl Into<String>) -> Self {
        Self::Branch(value.into())
    }

    pub fn names(names: impl IntoIterator<Item = NodeId>) -> Self {
        Self::Names(names.into_iter().collect())
    }

    pub fn send(sends: impl IntoIterator<Item = SendOp>) -> Self {
        Self::Sends(sends.into_iter().collect())
    }
}
