//! The immutable, freely shareable graph produced by [`super::builder::GraphBuilder::compile`].

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::edges::ConditionalEdge;
use crate::checkpoint::CheckpointStore;
use crate::control::NodePartial;
use crate::error::NodeError;
use crate::node::{Node, NodeContext};
use crate::schema::ReducerTable;
use crate::state::{StateMap, StateSnapshot};
use crate::types::NodeId;

/// Frozen graph: nodes, edges, conditional edges, the parsed schema, and an
/// optional checkpoint store. Cheap to clone (an `Arc` of this is what
/// invocations actually share).
pub struct CompiledGraph {
    pub(crate) initial_state: StateMap,
    pub(crate) reducers: ReducerTable,
    pub(crate) nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    pub(crate) edges: FxHashMap<NodeId, Vec<NodeId>>,
    pub(crate) conditional_edges: FxHashMap<NodeId, ConditionalEdge>,
    pub(crate) checkpointer: Option<Arc<dyn CheckpointStore>>,
}

impl CompiledGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        initial_state: StateMap,
        reducers: ReducerTable,
        nodes: FxHashMap<NodeId, Arc<dyn Node>>,
        edges: FxHashMap<NodeId, Vec<NodeId>>,
        conditional_edges: FxHashMap<NodeId, ConditionalEdge>,
        checkpointer: Option<Arc<dyn CheckpointStore>>,
    ) -> Self {
        Self { initial_state, reducers, nodes, edges, conditional_edges, checkpointer }
    }

    pub fn initial_state(&self) -> &StateMap {
        &self.initial_state
    }

    pub fn reducers(&self) -> &ReducerTable {
        &self.reducers
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    pub fn fixed_edges(&self, from: &NodeId) -> &[NodeId] {
        self.edges.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conditional_edge(&self, from: &NodeId) -> Option<&ConditionalEdge> {
        self.conditional_edges.get(from)
    }

    pub fn known_node(&self, id: &NodeId) -> bool {
        id.is_start() || id.is_end() || self.nodes.contains_key(id)
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpointer.as_ref()
    }
}

/// Wraps a compiled subgraph as a node: the child runs its own complete
/// invocation seeded from the parent's state, and its final state becomes
/// this node's update, later merged into the parent via the *parent's*
/// reducers. A child interrupt is not propagated as a parent interrupt —
/// preserved as documented in DESIGN.md.
pub struct SubgraphNode {
    subgraph: Arc<CompiledGraph>,
}

impl SubgraphNode {
    pub fn new(subgraph: Arc<CompiledGraph>) -> Self {
        Self { subgraph }
    }
}

#[async_trait]
impl Node for SubgraphNode {
    async fn run(&self, state: &StateSnapshot, ctx: &NodeContext) -> Result<NodePartial, NodeError> {
        use crate::invoke::{invoke, InvokeInput, InvokeOptions, Outcome};

        let options = InvokeOptions::default();
        match invoke(self.subgraph.clone(), InvokeInput::Update(state.clone()), options).await {
            Ok(Outcome::Done { state: final_state }) => Ok(NodePartial::update(final_state)),
            Ok(Outcome::Interrupted { .. }) => Err(NodeError::SubgraphInterruptSwallowed {
                node: ctx.node().clone(),
            }),
            Err(err) => Err(NodeError::Failed {
                node: ctx.node().clone(),
                message: err.to_string(),
            }),
        }
    }
}
